use thiserror::Error;

/// Errors in the declarative mixin configuration. The affected class
/// cannot be composed until the configuration is fixed; these are never
/// retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Mixin '{mixin}' suppresses itself")]
    SelfSuppression { mixin: String },

    #[error("Mixin '{mixin}' is configured twice for class '{target}'")]
    DuplicateMixin { target: String, mixin: String },

    #[error("Composed interface '{interface}' is configured twice for class '{target}'")]
    DuplicateComposedInterface { target: String, interface: String },

    #[error("'{name}' cannot be used as a composed interface because it is not an interface")]
    NotAnInterface { name: String },

    #[error("'{name}' is an interface and cannot be used as a mixin")]
    MixinIsInterface { name: String },

    #[error("'{name}' is an interface and cannot be a mixin target")]
    TargetIsInterface { name: String },

    #[error("Circular mixin dependencies on class '{target}': {}", .cycle.join(" -> "))]
    DependencyCycle { target: String, cycle: Vec<String> },

    #[error(
        "The dependency '{interface}' (required by {requirer} on class '{target}') is not fulfilled: \
         no public or protected method matching '{method}' was found"
    )]
    UnresolvedRequirement {
        interface: String,
        requirer: String,
        target: String,
        method: String,
    },

    #[error("Interface '{interface}' is introduced by both '{first}' and '{second}' on class '{target}'")]
    DuplicateIntroduction {
        target: String,
        interface: String,
        first: String,
        second: String,
    },

    #[error("Mixin '{mixin}' is a used mixin and may not override '{member}' of class '{target}'")]
    OverrideNotAllowed {
        target: String,
        mixin: String,
        member: String,
    },

    #[error("Mixin member '{member}' overrides a target member, but class '{target}' has no virtual member matching it")]
    OverrideTargetNotFound { target: String, member: String },

    #[error("Class '{target}' exceeds the configured limit of {limit} {what}")]
    LimitExceeded {
        target: String,
        what: &'static str,
        limit: usize,
    },
}

/// Broken invariants inside the engine. A silent wrong choice here would
/// produce a subtly broken generated type, so these abort the composition
/// request instead of falling back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalFault {
    #[error(
        "Duck typing for '{method}' of interface '{interface}' on class '{target}' found {count} \
         equally close candidates at inheritance offset {offset}"
    )]
    AmbiguousDuckTypeMatch {
        target: String,
        interface: String,
        method: String,
        offset: usize,
        count: usize,
    },

    #[error("Class '{class}' is expected to implement '{interface}' but has no interface map for it")]
    MissingInterfaceMap { class: String, interface: String },

    #[error("Introduction of '{interface}' has no implementation for '{method}'")]
    IncompleteIntroduction { interface: String, method: String },
}

/// Failure to compose one target class
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Internal fault: {0}")]
    Internal(#[from] InternalFault),

    #[error("Serialization error: {0}")]
    Serialization(#[from] crate::context::serialization::SerializationError),

    #[error("Type model error: {0}")]
    TypeModel(#[from] crate::types::TypeModelError),
}

impl CompositionError {
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, CompositionError>;
