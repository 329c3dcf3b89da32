//! Requirement collection.
//!
//! A requirement is a dependency of the target class or of a mixin on an
//! interface the composed object has to provide. Collecting it means
//! finding, for every method of that interface, the one concrete method
//! that implements it. Three strategies are tried in order: the target
//! implements the interface itself, a mixin introduces it, or the target
//! matches it structurally.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::definitions::InterfaceIntroductionDefinition;
use crate::error::{CompositionError, ConfigurationError, InternalFault};
use crate::types::{MethodRef, TypeRef, TypeUniverse};

mod collectors;

pub use collectors::{DuckTypingCollector, ImplementedInterfaceCollector, IntroducedInterfaceCollector};

/// Which side of the composed object a requirement points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequirementKind {
    /// An interface the composed type must expose to its callers
    ComposedInterface,
    /// An interface required on `This`
    TargetCall,
    /// An interface required on `Next`, the following override chain element
    NextCall,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComposedInterface => write!(f, "composed interface"),
            Self::TargetCall => write!(f, "target call"),
            Self::NextCall => write!(f, "next call"),
        }
    }
}

/// The entity that declared a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirer {
    TargetClass(TypeRef),
    Mixin(TypeRef),
}

impl Requirer {
    pub fn type_ref(self) -> TypeRef {
        match self {
            Self::TargetClass(ty) | Self::Mixin(ty) => ty,
        }
    }

    pub fn describe(self, universe: &TypeUniverse) -> String {
        match self {
            Self::TargetClass(ty) => format!("class '{}'", universe.name(ty)),
            Self::Mixin(ty) => format!("mixin '{}'", universe.name(ty)),
        }
    }
}

/// How an interface method was bound to its implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementationSource {
    /// The target class implements the interface
    Implemented,
    /// A mixin introduces the interface
    Introduced { mixin: TypeRef },
    /// Structural match at the given inheritance offset
    DuckTyped { offset: usize },
}

/// One interface method and the method fulfilling it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredMethodDefinition {
    pub interface_method: MethodRef,
    pub implementing_method: MethodRef,
    pub source: ImplementationSource,
}

/// A resolved requirement on one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredInterface {
    pub interface: TypeRef,
    pub kind: RequirementKind,
    pub requirers: Vec<Requirer>,
    pub methods: Vec<RequiredMethodDefinition>,
}

impl RequiredInterface {
    pub fn implementation_of(&self, interface_method: MethodRef) -> Option<MethodRef> {
        self.methods
            .iter()
            .find(|m| m.interface_method == interface_method)
            .map(|m| m.implementing_method)
    }

    pub fn is_required_by(&self, requirer: Requirer) -> bool {
        self.requirers.contains(&requirer)
    }
}

/// What a collector sees while resolving requirements of one target class
pub struct RequirementScope<'a> {
    pub universe: &'a TypeUniverse,
    pub target_class: TypeRef,
    pub introductions: &'a IndexMap<TypeRef, InterfaceIntroductionDefinition>,
}

impl<'a> RequirementScope<'a> {
    pub fn new(
        universe: &'a TypeUniverse,
        target_class: TypeRef,
        introductions: &'a IndexMap<TypeRef, InterfaceIntroductionDefinition>,
    ) -> Self {
        Self {
            universe,
            target_class,
            introductions,
        }
    }
}

/// A strategy binding interface methods to implementations
pub trait RequiredMethodCollector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy is responsible for `interface` in `scope`
    fn applies(&self, scope: &RequirementScope<'_>, interface: TypeRef) -> bool;

    fn collect(
        &self,
        scope: &RequirementScope<'_>,
        interface: TypeRef,
        requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError>;
}

/// Dispatches each requirement to the first applicable collector
pub struct RequirementResolver {
    collectors: Vec<Box<dyn RequiredMethodCollector>>,
}

impl Default for RequirementResolver {
    fn default() -> Self {
        Self {
            collectors: vec![
                Box::new(ImplementedInterfaceCollector),
                Box::new(IntroducedInterfaceCollector),
                Box::new(DuckTypingCollector),
            ],
        }
    }
}

impl fmt::Debug for RequirementResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.collectors.iter().map(|c| c.name()).collect();
        f.debug_struct("RequirementResolver")
            .field("collectors", &names)
            .finish()
    }
}

impl RequirementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collectors(collectors: Vec<Box<dyn RequiredMethodCollector>>) -> Self {
        Self { collectors }
    }

    pub fn collect(
        &self,
        scope: &RequirementScope<'_>,
        interface: TypeRef,
        requirer: Requirer,
    ) -> Result<Vec<RequiredMethodDefinition>, CompositionError> {
        let collector = self
            .collectors
            .iter()
            .find(|c| c.applies(scope, interface))
            .ok_or_else(|| {
                ConfigurationError::UnresolvedRequirement {
                    interface: scope.universe.name(interface).to_string(),
                    requirer: requirer.describe(scope.universe),
                    target: scope.universe.name(scope.target_class).to_string(),
                    method: "<no applicable strategy>".to_string(),
                }
            })?;
        tracing::debug!(
            interface = scope.universe.name(interface),
            collector = collector.name(),
            "collecting required methods"
        );
        collector.collect(scope, interface, requirer)
    }

    /// Resolves a requirement on `interface` and on every interface it extends
    pub fn resolve(
        &self,
        scope: &RequirementScope<'_>,
        kind: RequirementKind,
        interface: TypeRef,
        requirer: Requirer,
    ) -> Result<Vec<RequiredInterface>, CompositionError> {
        let mut interfaces = vec![interface];
        interfaces.extend(scope.universe.all_interfaces(interface));

        interfaces
            .into_iter()
            .map(|iface| {
                Ok(RequiredInterface {
                    interface: iface,
                    kind,
                    requirers: vec![requirer],
                    methods: self.collect(scope, iface, requirer)?,
                })
            })
            .collect()
    }
}

/// Accumulates requirements, merging requirers of the same (kind, interface)
#[derive(Debug, Default)]
pub struct RequirementSet {
    requirements: IndexMap<(RequirementKind, TypeRef), RequiredInterface>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(
        &mut self,
        resolver: &RequirementResolver,
        scope: &RequirementScope<'_>,
        kind: RequirementKind,
        interface: TypeRef,
        requirer: Requirer,
    ) -> Result<(), CompositionError> {
        if let Some(existing) = self.requirements.get_mut(&(kind, interface)) {
            if !existing.requirers.contains(&requirer) {
                existing.requirers.push(requirer);
            }
            let extended = scope.universe.all_interfaces(interface);
            for iface in extended {
                if let Some(entry) = self.requirements.get_mut(&(kind, iface)) {
                    if !entry.requirers.contains(&requirer) {
                        entry.requirers.push(requirer);
                    }
                }
            }
            return Ok(());
        }
        for resolved in resolver.resolve(scope, kind, interface, requirer)? {
            match self.requirements.get_mut(&(kind, resolved.interface)) {
                Some(entry) => {
                    if !entry.requirers.contains(&requirer) {
                        entry.requirers.push(requirer);
                    }
                }
                None => {
                    self.requirements.insert((kind, resolved.interface), resolved);
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn into_vec(self) -> Vec<RequiredInterface> {
        self.requirements.into_values().collect()
    }
}

fn internal(fault: InternalFault) -> CompositionError {
    tracing::error!(%fault, "internal fault while collecting requirements");
    CompositionError::Internal(fault)
}

#[cfg(test)]
mod tests;
