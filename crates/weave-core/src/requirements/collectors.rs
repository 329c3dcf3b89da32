use super::{
    internal, ImplementationSource, RequiredMethodCollector, RequiredMethodDefinition,
    RequirementScope, Requirer,
};
use crate::error::{CompositionError, ConfigurationError, InternalFault};
use crate::types::TypeRef;

/// The target class implements the interface; pairs come from its interface map
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplementedInterfaceCollector;

impl RequiredMethodCollector for ImplementedInterfaceCollector {
    fn name(&self) -> &'static str {
        "implemented"
    }

    fn applies(&self, scope: &RequirementScope<'_>, interface: TypeRef) -> bool {
        scope
            .universe
            .all_interfaces(scope.target_class)
            .contains(&interface)
    }

    fn collect(
        &self,
        scope: &RequirementScope<'_>,
        interface: TypeRef,
        _requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError> {
        let universe = scope.universe;
        let mapping = universe
            .interface_map(scope.target_class, interface)
            .ok_or_else(|| {
                internal(InternalFault::MissingInterfaceMap {
                    class: universe.name(scope.target_class).to_string(),
                    interface: universe.name(interface).to_string(),
                })
            })?;
        Ok(mapping
            .pairs
            .iter()
            .map(|(interface_method, implementing_method)| RequiredMethodDefinition {
                interface_method: *interface_method,
                implementing_method: *implementing_method,
                source: ImplementationSource::Implemented,
            })
            .collect())
    }
}

/// A participating mixin introduces the interface
#[derive(Debug, Clone, Copy, Default)]
pub struct IntroducedInterfaceCollector;

impl RequiredMethodCollector for IntroducedInterfaceCollector {
    fn name(&self) -> &'static str {
        "introduced"
    }

    fn applies(&self, scope: &RequirementScope<'_>, interface: TypeRef) -> bool {
        scope.introductions.contains_key(&interface)
    }

    fn collect(
        &self,
        scope: &RequirementScope<'_>,
        interface: TypeRef,
        _requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError> {
        let introduction = scope.introductions.get(&interface).ok_or_else(|| {
            internal(InternalFault::IncompleteIntroduction {
                interface: scope.universe.name(interface).to_string(),
                method: "<interface is not introduced>".to_string(),
            })
        })?;
        let source = ImplementationSource::Introduced {
            mixin: introduction.implementer,
        };
        let pair = |interface_method, implementing_method| RequiredMethodDefinition {
            interface_method,
            implementing_method,
            source,
        };

        let mut methods = Vec::new();
        for event in &introduction.events {
            methods.push(pair(event.add.0, event.add.1));
            methods.push(pair(event.remove.0, event.remove.1));
        }
        for property in &introduction.properties {
            methods.extend(property.getter.map(|(i, m)| pair(i, m)));
            methods.extend(property.setter.map(|(i, m)| pair(i, m)));
        }
        for method in &introduction.methods {
            methods.push(pair(method.interface_method, method.implementation));
        }
        Ok(methods)
    }
}

/// Structural match against the target's inheritance chain.
///
/// Same-name methods with an exactly equal signature are grouped by their
/// inheritance offset; the group closest to the target wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckTypingCollector;

impl RequiredMethodCollector for DuckTypingCollector {
    fn name(&self) -> &'static str {
        "duck typing"
    }

    fn applies(&self, _scope: &RequirementScope<'_>, _interface: TypeRef) -> bool {
        true
    }

    fn collect(
        &self,
        scope: &RequirementScope<'_>,
        interface: TypeRef,
        requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError> {
        let universe = scope.universe;
        let target = scope.target_class;
        let mut methods = Vec::new();

        for interface_method in &universe.descriptor(interface).methods {
            let wanted = universe.method(*interface_method);
            let candidates: Vec<(usize, _)> = universe
                .methods_named(target, &wanted.name)
                .into_iter()
                .filter(|(_, m)| universe.method(*m).signature == wanted.signature)
                .collect();

            let Some(offset) = candidates.iter().map(|(offset, _)| *offset).min() else {
                return Err(ConfigurationError::UnresolvedRequirement {
                    interface: universe.name(interface).to_string(),
                    requirer: requirer.describe(universe),
                    target: universe.name(target).to_string(),
                    method: universe.signature_display(&wanted.name, &wanted.signature),
                }
                .into());
            };
            let closest: Vec<_> = candidates
                .iter()
                .filter(|(o, _)| *o == offset)
                .map(|(_, m)| *m)
                .collect();
            if closest.len() > 1 {
                return Err(internal(InternalFault::AmbiguousDuckTypeMatch {
                    target: universe.name(target).to_string(),
                    interface: universe.name(interface).to_string(),
                    method: universe.signature_display(&wanted.name, &wanted.signature),
                    offset,
                    count: closest.len(),
                }));
            }

            methods.push(RequiredMethodDefinition {
                interface_method: *interface_method,
                implementing_method: closest[0],
                source: ImplementationSource::DuckTyped { offset },
            });
        }
        Ok(methods)
    }
}
