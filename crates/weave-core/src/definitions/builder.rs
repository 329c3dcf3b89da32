use indexmap::IndexMap;

use super::introductions::InterfaceIntroductionDefinition;
use super::ordering::DependencyGraph;
use super::{BuildStage, MemberIndex, MixinDefinition, OverrideDefinition, TargetClassDefinition};
use crate::context::{ClassContext, MemberVisibility, MixinContext, MixinKind};
use crate::error::{CompositionError, ConfigurationError, Result};
use crate::requirements::{
    RequirementKind, RequirementResolver, RequirementScope, RequirementSet, Requirer,
};
use crate::types::{MethodRef, TypeRef, TypeUniverse};
use crate::WeaveConfig;

/// Builds a [`TargetClassDefinition`] from a class context.
///
/// The build walks through [`BuildStage`]s in order. A failure in any stage
/// drops everything collected so far and leaves the builder `Unbuilt`.
#[derive(Debug)]
pub struct TargetClassDefinitionBuilder<'u> {
    universe: &'u TypeUniverse,
    resolver: RequirementResolver,
    max_mixins: Option<usize>,
    max_inheritance_depth: Option<usize>,
    stage: BuildStage,
}

impl<'u> TargetClassDefinitionBuilder<'u> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self {
            universe,
            resolver: RequirementResolver::default(),
            max_mixins: None,
            max_inheritance_depth: None,
            stage: BuildStage::Unbuilt,
        }
    }

    pub fn with_config(mut self, config: &WeaveConfig) -> Self {
        self.max_mixins = Some(config.max_mixins_per_class);
        self.max_inheritance_depth = Some(config.max_inheritance_depth);
        self
    }

    pub fn with_resolver(mut self, resolver: RequirementResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    fn advance(&mut self, target: TypeRef, stage: BuildStage) {
        debug_assert!(stage > self.stage);
        self.stage = stage;
        tracing::debug!(class = self.universe.name(target), %stage, "definition build stage");
    }

    pub fn build(&mut self, context: &ClassContext) -> Result<TargetClassDefinition> {
        self.stage = BuildStage::Unbuilt;
        let result = self.build_stages(context);
        match &result {
            Ok(definition) => tracing::info!(
                class = self.universe.name(definition.target_type),
                mixins = definition.mixins.len(),
                requirements = definition.required_interfaces.len(),
                "target class definition built"
            ),
            Err(error) => {
                self.stage = BuildStage::Unbuilt;
                tracing::warn!(
                    class = self.universe.name(context.class_type()),
                    %error,
                    "target class definition failed"
                );
            }
        }
        result
    }

    fn target_name(&self, context: &ClassContext) -> String {
        self.universe.name(context.class_type()).to_string()
    }

    fn check_limits(&self, context: &ClassContext) -> Result<()> {
        let universe = self.universe;
        let target = context.class_type();
        if universe.is_interface(target) {
            return Err(ConfigurationError::TargetIsInterface {
                name: self.target_name(context),
            }
            .into());
        }
        if let Some(limit) = self.max_mixins {
            if context.mixin_count() > limit {
                return Err(ConfigurationError::LimitExceeded {
                    target: self.target_name(context),
                    what: "mixins",
                    limit,
                }
                .into());
            }
        }
        if let Some(limit) = self.max_inheritance_depth {
            if universe.base_chain(target).len() - 1 > limit {
                return Err(ConfigurationError::LimitExceeded {
                    target: self.target_name(context),
                    what: "inheritance levels",
                    limit,
                }
                .into());
            }
        }
        Ok(())
    }

    fn build_stages(&mut self, context: &ClassContext) -> Result<TargetClassDefinition> {
        let universe = self.universe;
        let target = context.class_type();
        self.check_limits(context)?;

        self.advance(target, BuildStage::CollectingMembers);
        let members = MemberIndex::collect(universe, target);
        let target_interfaces = universe.all_interfaces(target);

        let mut introduced_by: IndexMap<TypeRef, TypeRef> = IndexMap::new();
        let mut mixins = Vec::with_capacity(context.mixin_count());
        for (index, mixin) in context.mixins().enumerate() {
            let definition =
                self.mixin_definition(context, mixin, index, &members, &target_interfaces)?;
            for interface in &definition.introduced_interfaces {
                if let Some(first) = introduced_by.insert(*interface, definition.mixin_type) {
                    return Err(ConfigurationError::DuplicateIntroduction {
                        target: self.target_name(context),
                        interface: universe.name(*interface).to_string(),
                        first: universe.name(first).to_string(),
                        second: universe.name(definition.mixin_type).to_string(),
                    }
                    .into());
                }
            }
            mixins.push(definition);
        }

        let mut introductions = IndexMap::new();
        for (interface, implementer) in &introduced_by {
            let visibility = context
                .mixin(*implementer)
                .map_or(MemberVisibility::Private, MixinContext::introduced_member_visibility);
            introductions.insert(
                *interface,
                InterfaceIntroductionDefinition::build(universe, *interface, *implementer, visibility)?,
            );
        }

        let mixins = self.order_mixins(context, mixins, &introduced_by)?;
        let overrides = self.override_chains(&mixins, &members);

        self.advance(target, BuildStage::ResolvingRequirements);
        let scope = RequirementScope::new(universe, target, &introductions);
        let mut requirements = RequirementSet::new();
        let class = Requirer::TargetClass(target);
        for interface in context.composed_interfaces() {
            requirements.require(&self.resolver, &scope, RequirementKind::ComposedInterface, *interface, class)?;
        }
        for interface in &universe.descriptor(target).requirements.target_call {
            requirements.require(&self.resolver, &scope, RequirementKind::TargetCall, *interface, class)?;
        }
        for mixin in &mixins {
            let requirer = Requirer::Mixin(mixin.mixin_type);
            for interface in &mixin.target_call_requirements {
                requirements.require(&self.resolver, &scope, RequirementKind::TargetCall, *interface, requirer)?;
            }
            for interface in &mixin.next_call_requirements {
                requirements.require(&self.resolver, &scope, RequirementKind::NextCall, *interface, requirer)?;
            }
        }

        self.advance(target, BuildStage::Validated);
        Ok(TargetClassDefinition {
            target_type: target,
            mixins,
            members,
            overrides,
            required_interfaces: requirements.into_vec(),
            introductions,
            composed_interfaces: context.composed_interfaces().to_vec(),
        })
    }

    fn mixin_definition(
        &self,
        context: &ClassContext,
        mixin: &MixinContext,
        declaration_index: usize,
        target_members: &MemberIndex,
        target_interfaces: &[TypeRef],
    ) -> Result<MixinDefinition> {
        let universe = self.universe;
        let mixin_type = mixin.mixin_type();
        let members = MemberIndex::collect(universe, mixin_type);

        let mut target_call_requirements = Vec::new();
        let mut next_call_requirements = Vec::new();
        for t in universe.base_chain(mixin_type) {
            let requirements = &universe.descriptor(t).requirements;
            for interface in &requirements.target_call {
                if !target_call_requirements.contains(interface) {
                    target_call_requirements.push(*interface);
                }
            }
            for interface in &requirements.next_call {
                if !next_call_requirements.contains(interface) {
                    next_call_requirements.push(*interface);
                }
            }
        }

        let introduced_interfaces: Vec<TypeRef> = universe
            .all_interfaces(mixin_type)
            .into_iter()
            .filter(|iface| !target_interfaces.contains(iface))
            .collect();

        let overriding: Vec<MethodRef> = members
            .methods()
            .filter(|m| universe.method(*m).overrides_target)
            .collect();
        if let (MixinKind::Used, Some(first)) = (mixin.kind(), overriding.first()) {
            return Err(ConfigurationError::OverrideNotAllowed {
                target: self.target_name(context),
                mixin: universe.name(mixin_type).to_string(),
                member: universe.method_display(*first),
            }
            .into());
        }
        for method in &overriding {
            let descriptor = universe.method(*method);
            let overridable = target_members
                .find_method(&descriptor.name, &descriptor.signature)
                .map_or(false, |m| universe.method(m).is_virtual);
            if !overridable {
                return Err(ConfigurationError::OverrideTargetNotFound {
                    target: self.target_name(context),
                    member: universe.method_display(*method),
                }
                .into());
            }
        }

        Ok(MixinDefinition {
            mixin_type,
            kind: mixin.kind(),
            introduced_member_visibility: mixin.introduced_member_visibility(),
            origin: mixin.origin().clone(),
            declaration_index,
            members,
            target_call_requirements,
            next_call_requirements,
            introduced_interfaces,
            overrides: overriding,
            dependencies: Vec::new(),
        })
    }

    /// Applies explicit dependencies and next-call requirements as precedence
    /// edges, then sorts stably by declaration order.
    fn order_mixins(
        &self,
        context: &ClassContext,
        mut mixins: Vec<MixinDefinition>,
        introduced_by: &IndexMap<TypeRef, TypeRef>,
    ) -> Result<Vec<MixinDefinition>> {
        let universe = self.universe;
        let mut graph = DependencyGraph::new(mixins.len());
        let participants: Vec<TypeRef> = mixins.iter().map(|m| m.mixin_type).collect();

        for (index, mixin) in context.mixins().enumerate() {
            let mut resolved = Vec::new();
            for dependency in mixin.explicit_dependencies() {
                let introducer = introduced_by.get(dependency).copied();
                let matches: Vec<usize> = participants
                    .iter()
                    .enumerate()
                    .filter(|(other, ty)| {
                        *other != index
                            && (introducer == Some(**ty) || universe.can_ascribe_to(**ty, *dependency))
                    })
                    .map(|(other, _)| other)
                    .collect();
                if matches.is_empty() {
                    tracing::debug!(
                        mixin = universe.name(mixin.mixin_type()),
                        dependency = universe.name(*dependency),
                        "dependency is not a participating mixin"
                    );
                }
                for other in matches {
                    graph.add_edge(other, index);
                    if !resolved.contains(&participants[other]) {
                        resolved.push(participants[other]);
                    }
                }
            }
            for interface in &mixins[index].next_call_requirements {
                if let Some(introducer) = introduced_by.get(interface) {
                    if let Some(other) = participants.iter().position(|p| p == introducer) {
                        if other != index {
                            graph.add_edge(other, index);
                            if !resolved.contains(introducer) {
                                resolved.push(*introducer);
                            }
                        }
                    }
                }
            }
            mixins[index].dependencies = resolved;
        }

        tracing::debug!(edges = graph.edge_count(), "mixin precedence graph");
        let order = graph.sort().map_err(|cycle| {
            CompositionError::from(ConfigurationError::DependencyCycle {
                target: self.target_name(context),
                cycle: cycle
                    .into_iter()
                    .map(|idx| universe.name(participants[idx]).to_string())
                    .collect(),
            })
        })?;

        let mut slots: Vec<Option<MixinDefinition>> = mixins.into_iter().map(Some).collect();
        Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
    }

    fn override_chains(&self, mixins: &[MixinDefinition], target_members: &MemberIndex) -> Vec<OverrideDefinition> {
        let mut chains: IndexMap<MethodRef, Vec<(TypeRef, MethodRef)>> = IndexMap::new();
        for mixin in mixins {
            for method in &mixin.overrides {
                let descriptor = self.universe.method(*method);
                if let Some(target_member) =
                    target_members.find_method(&descriptor.name, &descriptor.signature)
                {
                    chains
                        .entry(target_member)
                        .or_default()
                        .push((mixin.mixin_type, *method));
                }
            }
        }
        chains
            .into_iter()
            .map(|(target_member, overrides)| OverrideDefinition {
                target_member,
                overrides,
            })
            .collect()
    }
}

impl TargetClassDefinition {
    /// Builds the definition of `context` with default settings
    pub fn build(universe: &TypeUniverse, context: &ClassContext) -> Result<Self> {
        TargetClassDefinitionBuilder::new(universe).build(context)
    }
}
