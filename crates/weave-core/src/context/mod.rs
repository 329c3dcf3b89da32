//! Immutable mixin configuration of a single class.
//!
//! A [`ClassContext`] lists the mixins applied to one target class and the
//! interfaces the composed object must expose. Contexts are built once by
//! the configuration layer and then shared read-only.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::suppression::{self, SuppressionRule};
use crate::types::{TypeRef, TypeUniverse};

pub mod serialization;

/// Whether a mixin may override members of its target class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixinKind {
    /// The mixin extends the target and may override its members
    Extending,
    /// The target uses the mixin; the mixin adds behavior only
    Used,
}

/// Visibility of members a mixin introduces on the composed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberVisibility {
    Private,
    Public,
}

/// Where a mixin association was declared, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MixinContextOrigin {
    pub kind: String,
    pub module: String,
    pub location: String,
}

impl MixinContextOrigin {
    pub fn new(kind: impl Into<String>, module: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            module: module.into(),
            location: location.into(),
        }
    }

    /// Origin of an association registered through the builder API
    pub fn imperative(location: impl Into<String>) -> Self {
        Self::new("Imperative configuration", env!("CARGO_PKG_NAME"), location)
    }
}

impl fmt::Display for MixinContextOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Location: '{}' (Module: {})", self.kind, self.location, self.module)
    }
}

/// One mixin's participation in a class context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinContext {
    mixin_type: TypeRef,
    kind: MixinKind,
    introduced_member_visibility: MemberVisibility,
    explicit_dependencies: Vec<TypeRef>,
    origin: MixinContextOrigin,
}

impl MixinContext {
    pub fn new(mixin_type: TypeRef, origin: MixinContextOrigin) -> Self {
        Self {
            mixin_type,
            kind: MixinKind::Extending,
            introduced_member_visibility: MemberVisibility::Private,
            explicit_dependencies: Vec::new(),
            origin,
        }
    }

    pub fn with_kind(mut self, kind: MixinKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_visibility(mut self, visibility: MemberVisibility) -> Self {
        self.introduced_member_visibility = visibility;
        self
    }

    /// Adds an ordering dependency; duplicates are ignored
    pub fn with_dependency(mut self, dependency: TypeRef) -> Self {
        if !self.explicit_dependencies.contains(&dependency) {
            self.explicit_dependencies.push(dependency);
        }
        self
    }

    pub fn with_dependencies(self, dependencies: impl IntoIterator<Item = TypeRef>) -> Self {
        dependencies
            .into_iter()
            .fold(self, |ctx, dep| ctx.with_dependency(dep))
    }

    pub fn mixin_type(&self) -> TypeRef {
        self.mixin_type
    }

    pub fn kind(&self) -> MixinKind {
        self.kind
    }

    pub fn introduced_member_visibility(&self) -> MemberVisibility {
        self.introduced_member_visibility
    }

    pub fn explicit_dependencies(&self) -> &[TypeRef] {
        &self.explicit_dependencies
    }

    pub fn origin(&self) -> &MixinContextOrigin {
        &self.origin
    }
}

/// The mixin configuration of one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassContext {
    class_type: TypeRef,
    mixins: IndexMap<TypeRef, MixinContext>,
    composed_interfaces: Vec<TypeRef>,
}

impl ClassContext {
    pub fn empty(class_type: TypeRef) -> Self {
        Self {
            class_type,
            mixins: IndexMap::new(),
            composed_interfaces: Vec::new(),
        }
    }

    /// Creates a context, rejecting a mixin type or composed interface that
    /// appears more than once.
    pub fn new(
        universe: &TypeUniverse,
        class_type: TypeRef,
        mixins: impl IntoIterator<Item = MixinContext>,
        composed_interfaces: impl IntoIterator<Item = TypeRef>,
    ) -> Result<Self, ConfigurationError> {
        let mut context = Self::empty(class_type);
        for mixin in mixins {
            if context.mixins.contains_key(&mixin.mixin_type) {
                return Err(ConfigurationError::DuplicateMixin {
                    target: universe.name(class_type).to_string(),
                    mixin: universe.name(mixin.mixin_type).to_string(),
                });
            }
            context.mixins.insert(mixin.mixin_type, mixin);
        }
        for interface in composed_interfaces {
            if context.composed_interfaces.contains(&interface) {
                return Err(ConfigurationError::DuplicateComposedInterface {
                    target: universe.name(class_type).to_string(),
                    interface: universe.name(interface).to_string(),
                });
            }
            context.composed_interfaces.push(interface);
        }
        Ok(context)
    }

    pub fn class_type(&self) -> TypeRef {
        self.class_type
    }

    /// A context is empty when it neither has mixins nor composed interfaces
    pub fn is_empty(&self) -> bool {
        self.mixins.is_empty() && self.composed_interfaces.is_empty()
    }

    /// Mixins in declaration order
    pub fn mixins(&self) -> impl ExactSizeIterator<Item = &MixinContext> + '_ {
        self.mixins.values()
    }

    pub fn mixin_count(&self) -> usize {
        self.mixins.len()
    }

    pub fn mixin(&self, mixin_type: TypeRef) -> Option<&MixinContext> {
        self.mixins.get(&mixin_type)
    }

    pub fn contains_mixin(&self, mixin_type: TypeRef) -> bool {
        self.mixins.contains_key(&mixin_type)
    }

    /// Whether any configured mixin can be assigned to `base`
    pub fn contains_assignable_mixin(&self, universe: &TypeUniverse, base: TypeRef) -> bool {
        self.mixins
            .keys()
            .any(|mixin| universe.is_assignable_from(base, *mixin))
    }

    pub fn composed_interfaces(&self) -> &[TypeRef] {
        &self.composed_interfaces
    }

    /// Returns a copy without the mixins removed by `rules`
    pub fn suppress_mixins(&self, universe: &TypeUniverse, rules: &[SuppressionRule]) -> Self {
        if rules.is_empty() {
            return self.clone();
        }
        Self {
            class_type: self.class_type,
            mixins: suppression::remove_affected_mixins(universe, rules, self.mixins.clone()),
            composed_interfaces: self.composed_interfaces.clone(),
        }
    }

    /// Merges mixins and composed interfaces of base-class contexts into this
    /// one. An inherited mixin is skipped when this context already has a
    /// mixin of the same type, a subtype, or a specialization of the
    /// inherited generic definition. Inherited entries come first.
    pub fn inherit_from<'a>(
        &self,
        universe: &TypeUniverse,
        base_contexts: impl IntoIterator<Item = &'a ClassContext>,
    ) -> Self {
        let mut mixins: IndexMap<TypeRef, MixinContext> = IndexMap::new();
        let mut composed_interfaces = Vec::new();

        for base in base_contexts {
            for inherited in base.mixins.values() {
                let overridden = self
                    .mixins
                    .keys()
                    .any(|own| universe.can_ascribe_to(*own, inherited.mixin_type));
                if !overridden && !mixins.contains_key(&inherited.mixin_type) {
                    mixins.insert(inherited.mixin_type, inherited.clone());
                }
            }
            for interface in &base.composed_interfaces {
                if !composed_interfaces.contains(interface) {
                    composed_interfaces.push(*interface);
                }
            }
        }

        for (ty, own) in &self.mixins {
            mixins.insert(*ty, own.clone());
        }
        for interface in &self.composed_interfaces {
            if !composed_interfaces.contains(interface) {
                composed_interfaces.push(*interface);
            }
        }

        Self {
            class_type: self.class_type,
            mixins,
            composed_interfaces,
        }
    }

    /// The same configuration applied to another (derived) class
    pub fn specialize_to(&self, class_type: TypeRef) -> Self {
        Self {
            class_type,
            ..self.clone()
        }
    }
}

impl PartialEq for ClassContext {
    fn eq(&self, other: &Self) -> bool {
        self.class_type == other.class_type
            && self.mixins == other.mixins
            && self.composed_interfaces.len() == other.composed_interfaces.len()
            && self
                .composed_interfaces
                .iter()
                .all(|iface| other.composed_interfaces.contains(iface))
    }
}

impl Eq for ClassContext {}

#[cfg(test)]
mod tests;
