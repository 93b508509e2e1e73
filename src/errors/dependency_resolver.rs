use super::{container::ContextErrorKind, instantiate::InstantiateErrorKind};
use crate::key::{ComponentId, DependencyKey};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No provider found for `{key}`. Ensure it is injectable or provided and contributed to a component")]
    NoProviderFound { key: DependencyKey },
    #[error("Incorrect provider type for `{key}`, expected a provider of `{expected}`")]
    IncorrectType { key: DependencyKey, expected: &'static str },
    #[error("Cannot construct `{key}` directly, it has assisted parameters. Inject its factory instead")]
    AssistedConstruction { key: DependencyKey },
    #[error("`{key}` requires a runtime context value of type `{expected}`, supply it at the injection site")]
    MissingRuntimeContext { key: DependencyKey, expected: &'static str },
    #[error("Component `{component}` was dropped while one of its providers was still in use")]
    ComponentDropped { component: ComponentId },
    #[error("Component `{component}` is not part of the graph")]
    UnknownComponent { component: ComponentId },
    #[error(transparent)]
    Context(#[from] ContextErrorKind),
    #[error("Constructor of `{key}` failed: {source}")]
    Instantiate {
        key: DependencyKey,
        #[source]
        source: InstantiateErrorKind,
    },
}
