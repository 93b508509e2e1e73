use crate::{
    key::{ComponentId, DependencyKey},
    plan::ProviderKind,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextErrorKind {
    #[error("Context is already initialized")]
    AlreadyInitialized,
    #[error("Context is not initialized. Initialize it once at startup before injecting")]
    NotInitialized,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BlueprintErrorKind {
    #[error("No constructor registered for `{key}` hosted by `{component}`")]
    MissingConstructor { key: DependencyKey, component: ComponentId },
    #[error("Constructor registered for `{key}`, which is not part of the graph")]
    UnknownKey { key: DependencyKey },
    #[error("Constructor registered for `{key}` doesn't match its node, expected a {expected} provider")]
    KindMismatch { key: DependencyKey, expected: ProviderKind },
}
