//! # Weave Core
//!
//! Mixin composition engine, including:
//! - An explicit type model standing in for runtime reflection
//! - Class and mixin contexts with array serialization
//! - Configuration builders and attribute-based discovery
//! - Suppression rules and requirement collection
//! - Target class definitions with deterministic mixin ordering
//! - Inherited attribute retrieval and a shared composition registry
//!
//! The output of this crate is a validated composition model. Emitting the
//! composed type is left to a code generator consuming
//! [`TargetClassDefinition`].

#![warn(clippy::all)]

pub mod attributes;
pub mod configuration;
pub mod context;
pub mod definitions;
pub mod error;
pub mod registry;
pub mod requirements;
pub mod suppression;
pub mod types;

// Re-export commonly used types
pub use attributes::{AttributeError, AttributeRetriever};
pub use configuration::{
    AttributeDeclarationScanner, ClassContextBuilder, Declarations, MixinConfiguration,
    MixinConfigurationBuilder, MixinDeclaration, SuppressionDeclaration,
};
pub use context::{
    serialization::{ArrayClassContextDeserializer, ArrayClassContextSerializer, ContextValue},
    ClassContext, MemberVisibility, MixinContext, MixinContextOrigin, MixinKind,
};
pub use definitions::{
    BuildStage, MixinDefinition, TargetClassDefinition, TargetClassDefinitionBuilder,
};
pub use error::{CompositionError, ConfigurationError, InternalFault, Result};
pub use registry::CompositionRegistry;
pub use requirements::{RequiredInterface, RequiredMethodDefinition, RequirementKind};
pub use suppression::SuppressionRule;
pub use types::{
    MemberRef, MethodRef, OverrideChainResolver, Signature, TypeRef, TypeUniverse,
    TypeUniverseBuilder,
};

/// Weave version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for weave components
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "weave_core=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Composition engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaveConfig {
    /// Enable debug mode
    pub debug: bool,
    /// Maximum number of mixins applied to one class
    pub max_mixins_per_class: usize,
    /// Maximum number of base classes above a target class
    pub max_inheritance_depth: usize,
    /// Keep built definitions in the registry cache
    pub cache_definitions: bool,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_mixins_per_class: 64,
            max_inheritance_depth: 32,
            cache_definitions: true,
        }
    }
}
