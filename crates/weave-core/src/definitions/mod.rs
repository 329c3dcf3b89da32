//! Target class definitions: the validated composition model of one class.
//!
//! A [`TargetClassDefinition`] is what a code generator consumes. It lists
//! the mixins in application order, the flattened members of the target,
//! the override chain of every overridden member, the interfaces mixins
//! introduce and the resolved requirement bindings. Definitions are built
//! by [`TargetClassDefinitionBuilder`] and never mutated afterwards.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::context::{MemberVisibility, MixinContextOrigin, MixinKind};
use crate::requirements::{RequiredInterface, RequirementKind};
use crate::types::{EventRef, MethodRef, PropertyRef, Signature, TypeRef, TypeUniverse};

mod builder;
mod introductions;
mod ordering;

pub use builder::TargetClassDefinitionBuilder;
pub use introductions::{
    AccessorPair, EventIntroduction, InterfaceIntroductionDefinition, MethodIntroduction,
    PropertyIntroduction,
};

/// Stages of a definition build, strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildStage {
    Unbuilt,
    CollectingMembers,
    ResolvingRequirements,
    Validated,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbuilt => "unbuilt",
            Self::CollectingMembers => "collecting members",
            Self::ResolvingRequirements => "resolving requirements",
            Self::Validated => "validated",
        };
        f.write_str(name)
    }
}

/// Members visible on a type, flattened over its base chain.
///
/// The most-derived declaration wins per method name and signature, and per
/// property or event name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberIndex {
    methods: IndexMap<(String, Signature), MethodRef>,
    properties: IndexMap<String, PropertyRef>,
    events: IndexMap<String, EventRef>,
}

impl MemberIndex {
    pub fn collect(universe: &TypeUniverse, ty: TypeRef) -> Self {
        let mut index = Self::default();
        for t in universe.base_chain(ty) {
            let descriptor = universe.descriptor(t);
            for method in &descriptor.methods {
                let m = universe.method(*method);
                index
                    .methods
                    .entry((m.name.clone(), m.signature.clone()))
                    .or_insert(*method);
            }
            for property in &descriptor.properties {
                index
                    .properties
                    .entry(universe.property(*property).name.clone())
                    .or_insert(*property);
            }
            for event in &descriptor.events {
                index
                    .events
                    .entry(universe.event(*event).name.clone())
                    .or_insert(*event);
            }
        }
        index
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodRef> + '_ {
        self.methods.values().copied()
    }

    pub fn properties(&self) -> impl Iterator<Item = PropertyRef> + '_ {
        self.properties.values().copied()
    }

    pub fn events(&self) -> impl Iterator<Item = EventRef> + '_ {
        self.events.values().copied()
    }

    pub fn find_method(&self, name: &str, signature: &Signature) -> Option<MethodRef> {
        self.methods
            .get(&(name.to_string(), signature.clone()))
            .copied()
    }

    pub fn find_property(&self, name: &str) -> Option<PropertyRef> {
        self.properties.get(name).copied()
    }

    pub fn find_event(&self, name: &str) -> Option<EventRef> {
        self.events.get(name).copied()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

/// One mixin as applied to a target class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinDefinition {
    pub mixin_type: TypeRef,
    pub kind: MixinKind,
    pub introduced_member_visibility: MemberVisibility,
    pub origin: MixinContextOrigin,
    /// Position in the class context, before ordering
    pub declaration_index: usize,
    pub members: MemberIndex,
    pub target_call_requirements: Vec<TypeRef>,
    pub next_call_requirements: Vec<TypeRef>,
    pub introduced_interfaces: Vec<TypeRef>,
    /// Mixin methods overriding target members
    pub overrides: Vec<MethodRef>,
    /// Participating mixins this one is applied after
    pub dependencies: Vec<TypeRef>,
}

/// One overridden target member and the mixin overrides stacked on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDefinition {
    pub target_member: MethodRef,
    /// (mixin, overriding method) in application order
    pub overrides: Vec<(TypeRef, MethodRef)>,
}

impl OverrideDefinition {
    /// The override called first on the composed object
    pub fn entry_point(&self) -> Option<MethodRef> {
        self.overrides.last().map(|(_, method)| *method)
    }

    /// What the override of `mixin` reaches through `Next`: the previously
    /// applied override, or the target member itself.
    pub fn next_after(&self, mixin: TypeRef) -> Option<MethodRef> {
        let position = self.overrides.iter().position(|(m, _)| *m == mixin)?;
        Some(match position {
            0 => self.target_member,
            p => self.overrides[p - 1].1,
        })
    }
}

/// Validated composition model of one target class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetClassDefinition {
    pub(crate) target_type: TypeRef,
    pub(crate) mixins: Vec<MixinDefinition>,
    pub(crate) members: MemberIndex,
    pub(crate) overrides: Vec<OverrideDefinition>,
    pub(crate) required_interfaces: Vec<RequiredInterface>,
    pub(crate) introductions: IndexMap<TypeRef, InterfaceIntroductionDefinition>,
    pub(crate) composed_interfaces: Vec<TypeRef>,
}

impl TargetClassDefinition {
    pub fn target_type(&self) -> TypeRef {
        self.target_type
    }

    /// Mixins in application order
    pub fn mixins(&self) -> &[MixinDefinition] {
        &self.mixins
    }

    pub fn mixin_order(&self) -> Vec<TypeRef> {
        self.mixins.iter().map(|m| m.mixin_type).collect()
    }

    pub fn mixin(&self, mixin_type: TypeRef) -> Option<&MixinDefinition> {
        self.mixins.iter().find(|m| m.mixin_type == mixin_type)
    }

    pub fn has_mixins(&self) -> bool {
        !self.mixins.is_empty()
    }

    pub fn members(&self) -> &MemberIndex {
        &self.members
    }

    pub fn overrides(&self) -> &[OverrideDefinition] {
        &self.overrides
    }

    pub fn override_of(&self, target_member: MethodRef) -> Option<&OverrideDefinition> {
        self.overrides
            .iter()
            .find(|o| o.target_member == target_member)
    }

    pub fn required_interfaces(&self) -> &[RequiredInterface] {
        &self.required_interfaces
    }

    pub fn required_interface(&self, kind: RequirementKind, interface: TypeRef) -> Option<&RequiredInterface> {
        self.required_interfaces
            .iter()
            .find(|r| r.kind == kind && r.interface == interface)
    }

    pub fn introductions(&self) -> impl Iterator<Item = &InterfaceIntroductionDefinition> + '_ {
        self.introductions.values()
    }

    pub fn introduction(&self, interface: TypeRef) -> Option<&InterfaceIntroductionDefinition> {
        self.introductions.get(&interface)
    }

    pub fn composed_interfaces(&self) -> &[TypeRef] {
        &self.composed_interfaces
    }

    /// Multi-line human readable summary
    pub fn describe(&self, universe: &TypeUniverse) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", universe.name(self.target_type));

        let _ = writeln!(out, "  mixins:");
        for mixin in &self.mixins {
            let kind = match mixin.kind {
                MixinKind::Extending => "extends",
                MixinKind::Used => "used",
            };
            let _ = writeln!(out, "    {} ({kind})", universe.name(mixin.mixin_type));
        }

        if !self.overrides.is_empty() {
            let _ = writeln!(out, "  overrides:");
            for chain in &self.overrides {
                let mixins: Vec<&str> = chain
                    .overrides
                    .iter()
                    .map(|(mixin, _)| universe.name(*mixin))
                    .collect();
                let _ = writeln!(
                    out,
                    "    {} <- {}",
                    universe.method_display(chain.target_member),
                    mixins.join(" <- ")
                );
            }
        }

        if !self.introductions.is_empty() {
            let _ = writeln!(out, "  introduced interfaces:");
            for introduction in self.introductions.values() {
                let _ = writeln!(
                    out,
                    "    {} by {}",
                    universe.name(introduction.interface),
                    universe.name(introduction.implementer)
                );
            }
        }

        if !self.required_interfaces.is_empty() {
            let _ = writeln!(out, "  requirements:");
            for requirement in &self.required_interfaces {
                let _ = writeln!(
                    out,
                    "    {} ({}, {} methods)",
                    universe.name(requirement.interface),
                    requirement.kind,
                    requirement.methods.len()
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests;
