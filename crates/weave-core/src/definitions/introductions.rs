//! Interfaces a mixin adds to the composed type.

use serde::{Deserialize, Serialize};

use crate::context::MemberVisibility;
use crate::error::{CompositionError, InternalFault};
use crate::types::{EventRef, MethodRef, PropertyRef, TypeRef, TypeUniverse};

/// (interface accessor, implementing accessor)
pub type AccessorPair = (MethodRef, MethodRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIntroduction {
    pub interface_method: MethodRef,
    pub implementation: MethodRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyIntroduction {
    pub interface_property: PropertyRef,
    pub getter: Option<AccessorPair>,
    pub setter: Option<AccessorPair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIntroduction {
    pub interface_event: EventRef,
    pub add: AccessorPair,
    pub remove: AccessorPair,
}

/// One interface introduced by one mixin, with every member mapped to the
/// mixin member implementing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceIntroductionDefinition {
    pub interface: TypeRef,
    pub implementer: TypeRef,
    pub visibility: MemberVisibility,
    /// Plain methods; property and event accessors are listed with their member
    pub methods: Vec<MethodIntroduction>,
    pub properties: Vec<PropertyIntroduction>,
    pub events: Vec<EventIntroduction>,
}

impl InterfaceIntroductionDefinition {
    pub(crate) fn build(
        universe: &TypeUniverse,
        interface: TypeRef,
        implementer: TypeRef,
        visibility: MemberVisibility,
    ) -> Result<Self, CompositionError> {
        let mapping = universe.interface_map(implementer, interface).ok_or_else(|| {
            InternalFault::MissingInterfaceMap {
                class: universe.name(implementer).to_string(),
                interface: universe.name(interface).to_string(),
            }
        })?;
        let implementation_of = |interface_method: MethodRef| {
            mapping.target_of(interface_method).ok_or_else(|| {
                CompositionError::from(InternalFault::IncompleteIntroduction {
                    interface: universe.name(interface).to_string(),
                    method: universe.method_display(interface_method),
                })
            })
        };

        let descriptor = universe.descriptor(interface);
        let mut accessors = Vec::new();

        let mut events = Vec::new();
        for event in &descriptor.events {
            let e = universe.event(*event);
            accessors.extend([e.add_method, e.remove_method]);
            events.push(EventIntroduction {
                interface_event: *event,
                add: (e.add_method, implementation_of(e.add_method)?),
                remove: (e.remove_method, implementation_of(e.remove_method)?),
            });
        }

        let mut properties = Vec::new();
        for property in &descriptor.properties {
            let p = universe.property(*property);
            accessors.extend(p.getter);
            accessors.extend(p.setter);
            let getter = match p.getter {
                Some(get) => Some((get, implementation_of(get)?)),
                None => None,
            };
            let setter = match p.setter {
                Some(set) => Some((set, implementation_of(set)?)),
                None => None,
            };
            properties.push(PropertyIntroduction {
                interface_property: *property,
                getter,
                setter,
            });
        }

        let methods = descriptor
            .methods
            .iter()
            .filter(|m| !accessors.contains(m))
            .map(|m| {
                Ok(MethodIntroduction {
                    interface_method: *m,
                    implementation: implementation_of(*m)?,
                })
            })
            .collect::<Result<Vec<_>, CompositionError>>()?;

        Ok(Self {
            interface,
            implementer,
            visibility,
            methods,
            properties,
            events,
        })
    }

    /// Number of interface methods covered, accessors included
    pub fn method_count(&self) -> usize {
        self.methods.len()
            + self.events.len() * 2
            + self
                .properties
                .iter()
                .map(|p| usize::from(p.getter.is_some()) + usize::from(p.setter.is_some()))
                .sum::<usize>()
    }
}
