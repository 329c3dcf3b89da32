//! Mixin configuration: the registration API and the resolved set of class
//! contexts it produces.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::{ClassContext, MixinContext, MixinContextOrigin};
use crate::error::ConfigurationError;
use crate::suppression::SuppressionRule;
use crate::types::{TypeRef, TypeUniverse};

pub mod declarations;

pub use declarations::{
    AttributeDeclarationScanner, ComposedInterfaceDeclaration, Declarations, MarkerAttributes,
    MixinDeclaration, SuppressionDeclaration,
};

/// Collects the configuration of one target class
#[derive(Debug, Clone)]
pub struct ClassContextBuilder {
    class_type: TypeRef,
    mixins: Vec<MixinContext>,
    composed_interfaces: Vec<TypeRef>,
    suppressions: Vec<(TypeRef, TypeRef)>,
}

impl ClassContextBuilder {
    fn new(class_type: TypeRef) -> Self {
        Self {
            class_type,
            mixins: Vec::new(),
            composed_interfaces: Vec::new(),
            suppressions: Vec::new(),
        }
    }

    pub fn class_type(&self) -> TypeRef {
        self.class_type
    }

    pub fn add_mixin(&mut self, mixin: TypeRef) -> &mut Self {
        self.add_mixin_with(MixinContext::new(
            mixin,
            MixinContextOrigin::imperative("MixinConfigurationBuilder::for_class"),
        ))
    }

    pub fn add_mixin_with(&mut self, mixin: MixinContext) -> &mut Self {
        self.mixins.push(mixin);
        self
    }

    pub fn add_composed_interface(&mut self, interface: TypeRef) -> &mut Self {
        self.composed_interfaces.push(interface);
        self
    }

    /// `replacing` suppresses `suppressed` and its derivatives on this class
    pub fn suppress_mixin(&mut self, replacing: TypeRef, suppressed: TypeRef) -> &mut Self {
        self.suppressions.push((replacing, suppressed));
        self
    }

    /// Adds `replacing` as a mixin and suppresses `suppressed` in its favour
    pub fn replace_mixin(&mut self, replacing: TypeRef, suppressed: TypeRef) -> &mut Self {
        self.add_mixin(replacing).suppress_mixin(replacing, suppressed)
    }

    fn validate(&self, universe: &TypeUniverse) -> Result<Vec<SuppressionRule>, ConfigurationError> {
        if universe.is_interface(self.class_type) {
            return Err(ConfigurationError::TargetIsInterface {
                name: universe.name(self.class_type).to_string(),
            });
        }
        for mixin in &self.mixins {
            if universe.is_interface(mixin.mixin_type()) {
                return Err(ConfigurationError::MixinIsInterface {
                    name: universe.name(mixin.mixin_type()).to_string(),
                });
            }
        }
        for interface in &self.composed_interfaces {
            if !universe.is_interface(*interface) {
                return Err(ConfigurationError::NotAnInterface {
                    name: universe.name(*interface).to_string(),
                });
            }
        }
        self.suppressions
            .iter()
            .map(|(replacing, suppressed)| SuppressionRule::new(universe, *replacing, *suppressed))
            .collect()
    }
}

/// Registration API producing a [`MixinConfiguration`]
#[derive(Debug, Clone, Default)]
pub struct MixinConfigurationBuilder {
    classes: IndexMap<TypeRef, ClassContextBuilder>,
}

impl MixinConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_class(&mut self, class_type: TypeRef) -> &mut ClassContextBuilder {
        self.classes
            .entry(class_type)
            .or_insert_with(|| ClassContextBuilder::new(class_type))
    }

    /// Feeds declaration tuples from any discovery front-end
    pub fn apply_declarations(&mut self, declarations: &Declarations) -> &mut Self {
        for declaration in &declarations.mixins {
            let mixin = MixinContext::new(declaration.mixin, declaration.origin.clone())
                .with_kind(declaration.kind)
                .with_visibility(declaration.visibility)
                .with_dependencies(declaration.dependencies.iter().copied());
            self.for_class(declaration.target).add_mixin_with(mixin);
        }
        for declaration in &declarations.composed_interfaces {
            self.for_class(declaration.target)
                .add_composed_interface(declaration.interface);
        }
        for declaration in &declarations.suppressions {
            self.for_class(declaration.target)
                .suppress_mixin(declaration.replacing, declaration.suppressed);
        }
        self
    }

    /// Validates every class, then resolves inheritance and suppression.
    ///
    /// Validation of all classes runs before any context is combined so
    /// that cheap, local errors (self-suppression, duplicates) surface first.
    pub fn build(self, universe: &TypeUniverse) -> Result<MixinConfiguration, ConfigurationError> {
        let mut pending: HashMap<TypeRef, (ClassContext, Vec<SuppressionRule>)> = HashMap::new();
        let order: Vec<TypeRef> = self.classes.keys().copied().collect();

        for (class_type, builder) in self.classes {
            let rules = builder.validate(universe)?;
            let own = ClassContext::new(
                universe,
                class_type,
                builder.mixins,
                builder.composed_interfaces,
            )?;
            pending.insert(class_type, (own, rules));
        }

        let mut resolved: HashMap<TypeRef, Arc<ClassContext>> = HashMap::new();
        for class_type in &order {
            resolve(universe, *class_type, &pending, &mut resolved);
        }

        let contexts: IndexMap<TypeRef, Arc<ClassContext>> = order
            .iter()
            .filter_map(|ty| resolved.remove(ty).map(|ctx| (*ty, ctx)))
            .collect();

        tracing::info!(classes = contexts.len(), "mixin configuration built");
        Ok(MixinConfiguration { contexts })
    }
}

/// Nearest configured ancestors of `ty`: its generic definition (for a
/// specialization) and the closest configured base class.
fn configured_ancestors<T>(universe: &TypeUniverse, ty: TypeRef, configured: &HashMap<TypeRef, T>) -> Vec<TypeRef> {
    let mut ancestors = Vec::new();
    if let Some(definition) = universe.generic_definition(ty) {
        if configured.contains_key(&definition) {
            ancestors.push(definition);
        }
    }
    if let Some(base) = universe
        .base_chain(ty)
        .into_iter()
        .skip(1)
        .find(|base| configured.contains_key(base))
    {
        ancestors.push(base);
    }
    ancestors
}

fn resolve(
    universe: &TypeUniverse,
    class_type: TypeRef,
    pending: &HashMap<TypeRef, (ClassContext, Vec<SuppressionRule>)>,
    resolved: &mut HashMap<TypeRef, Arc<ClassContext>>,
) -> Arc<ClassContext> {
    if let Some(done) = resolved.get(&class_type) {
        return done.clone();
    }
    let (own, rules) = &pending[&class_type];
    let bases: Vec<Arc<ClassContext>> = configured_ancestors(universe, class_type, pending)
        .into_iter()
        .map(|ancestor| resolve(universe, ancestor, pending, resolved))
        .collect();

    let combined = own
        .inherit_from(universe, bases.iter().map(|b| b.as_ref()))
        .suppress_mixins(universe, rules);
    let combined = Arc::new(combined);
    resolved.insert(class_type, combined.clone());
    combined
}

/// Resolved class contexts, keyed by target class in configuration order
#[derive(Debug, Clone, Default)]
pub struct MixinConfiguration {
    contexts: IndexMap<TypeRef, Arc<ClassContext>>,
}

impl MixinConfiguration {
    pub fn builder() -> MixinConfigurationBuilder {
        MixinConfigurationBuilder::new()
    }

    pub fn configured_classes(&self) -> impl Iterator<Item = TypeRef> + '_ {
        self.contexts.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn exact_context(&self, class_type: TypeRef) -> Option<&Arc<ClassContext>> {
        self.contexts.get(&class_type)
    }

    /// The context of `class_type`: its own resolved context, or the one
    /// inherited from its nearest configured ancestor re-keyed to it.
    pub fn class_context(&self, universe: &TypeUniverse, class_type: TypeRef) -> Option<Arc<ClassContext>> {
        if let Some(exact) = self.contexts.get(&class_type) {
            return Some(exact.clone());
        }
        let ancestor = universe
            .generic_definition(class_type)
            .filter(|def| self.contexts.contains_key(def))
            .or_else(|| {
                universe
                    .base_chain(class_type)
                    .into_iter()
                    .skip(1)
                    .find(|base| self.contexts.contains_key(base))
            })?;
        Some(Arc::new(self.contexts[&ancestor].specialize_to(class_type)))
    }
}
