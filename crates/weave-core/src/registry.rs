//! Shared composition registry.
//!
//! The registry owns the type universe and the current mixin configuration
//! and caches what is derived from them: resolved class contexts and built
//! target class definitions. Published entries are read without taking the
//! configuration lock; concurrent requests for the same unbuilt class wait on
//! a per-class build lock so that every definition is built once.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::configuration::MixinConfiguration;
use crate::context::ClassContext;
use crate::definitions::{TargetClassDefinition, TargetClassDefinitionBuilder};
use crate::error::Result;
use crate::types::{TypeRef, TypeUniverse};
use crate::WeaveConfig;

type CacheKey = (TypeRef, u64);

#[derive(Debug)]
struct Snapshot {
    configuration: Arc<MixinConfiguration>,
    generation: u64,
}

/// Outcome of building one configured class
pub type ValidationOutcome = (TypeRef, Result<Arc<TargetClassDefinition>>);

#[derive(Debug)]
pub struct CompositionRegistry {
    universe: Arc<TypeUniverse>,
    config: WeaveConfig,
    snapshot: RwLock<Snapshot>,
    contexts: DashMap<CacheKey, Option<Arc<ClassContext>>>,
    definitions: DashMap<CacheKey, Arc<TargetClassDefinition>>,
    build_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl CompositionRegistry {
    pub fn new(universe: Arc<TypeUniverse>, configuration: MixinConfiguration) -> Self {
        Self::with_config(universe, configuration, WeaveConfig::default())
    }

    pub fn with_config(
        universe: Arc<TypeUniverse>,
        configuration: MixinConfiguration,
        config: WeaveConfig,
    ) -> Self {
        Self {
            universe,
            config,
            snapshot: RwLock::new(Snapshot {
                configuration: Arc::new(configuration),
                generation: 0,
            }),
            contexts: DashMap::new(),
            definitions: DashMap::new(),
            build_locks: DashMap::new(),
        }
    }

    pub fn universe(&self) -> &Arc<TypeUniverse> {
        &self.universe
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn configuration(&self) -> Arc<MixinConfiguration> {
        self.snapshot.read().configuration.clone()
    }

    /// Incremented on every configuration change
    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation
    }

    fn current(&self) -> (Arc<MixinConfiguration>, u64) {
        let snapshot = self.snapshot.read();
        (snapshot.configuration.clone(), snapshot.generation)
    }

    /// Resolved context of `class_type` under the current configuration
    pub fn class_context(&self, class_type: TypeRef) -> Option<Arc<ClassContext>> {
        let (configuration, generation) = self.current();
        self.context_for(&configuration, class_type, generation)
    }

    fn context_for(
        &self,
        configuration: &MixinConfiguration,
        class_type: TypeRef,
        generation: u64,
    ) -> Option<Arc<ClassContext>> {
        let key = (class_type, generation);
        if let Some(cached) = self.contexts.get(&key) {
            return cached.clone();
        }
        let context = configuration.class_context(&self.universe, class_type);
        self.publish(&self.contexts, key, context.clone());
        context
    }

    /// Inserts `value` only while `key`'s generation is still current. The
    /// snapshot read guard keeps a replacement from clearing the caches
    /// between the check and the insert.
    fn publish<V>(&self, cache: &DashMap<CacheKey, V>, key: CacheKey, value: V) {
        let snapshot = self.snapshot.read();
        if snapshot.generation == key.1 {
            cache.insert(key, value);
        }
    }

    /// The definition of `class_type`, built on first request.
    ///
    /// A class without configuration gets a definition without mixins.
    /// Failed builds are not cached; the next request builds again.
    pub fn target_class_definition(&self, class_type: TypeRef) -> Result<Arc<TargetClassDefinition>> {
        let (configuration, generation) = self.current();
        let key = (class_type, generation);
        if let Some(published) = self.definitions.get(&key) {
            return Ok(published.clone());
        }

        let lock = self.build_locks.entry(key).or_default().clone();
        let _guard = lock.lock();
        if let Some(published) = self.definitions.get(&key) {
            return Ok(published.clone());
        }

        let context = self
            .context_for(&configuration, class_type, generation)
            .unwrap_or_else(|| Arc::new(ClassContext::empty(class_type)));
        let built = TargetClassDefinitionBuilder::new(&self.universe)
            .with_config(&self.config)
            .build(&context)
            .map(Arc::new);

        if let Ok(definition) = &built {
            if self.config.cache_definitions {
                self.publish(&self.definitions, key, definition.clone());
            }
        }
        // published before the lock goes away, so late arrivals hit the cache
        self.build_locks.remove(&key);
        built
    }

    /// Swaps the configuration and drops everything derived from the old one
    pub fn replace_configuration(&self, configuration: MixinConfiguration) -> u64 {
        let generation = {
            let mut snapshot = self.snapshot.write();
            snapshot.configuration = Arc::new(configuration);
            snapshot.generation += 1;
            self.contexts.clear();
            self.definitions.clear();
            self.build_locks.clear();
            snapshot.generation
        };
        tracing::info!(generation, "mixin configuration replaced");
        generation
    }

    /// Builds every configured class, continuing past failures
    pub fn validate_all(&self) -> Vec<ValidationOutcome> {
        let configuration = self.configuration();
        let outcomes: Vec<ValidationOutcome> = configuration
            .configured_classes()
            .map(|class_type| (class_type, self.target_class_definition(class_type)))
            .collect();
        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        tracing::info!(classes = outcomes.len(), failed, "validated configured classes");
        outcomes
    }

    pub fn cached_definition_count(&self) -> usize {
        self.definitions.len()
    }
}
