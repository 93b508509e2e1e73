mod blueprint;
mod component;
mod context;
mod factory;
mod provider;
mod resolver;
mod scope_context;

pub use blueprint::Blueprint;
pub use component::{Component, Injector};
pub use context::Context;
pub use factory::AssistedFactory;
pub use provider::{Provider, ScopedProvider, SharedProvider, UnscopedProvider};
pub use resolver::Resolver;
pub use scope_context::ScopeContext;

use alloc::sync::Arc;
use core::fmt::{self, Debug, Formatter};
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::{
    errors::{ContextErrorKind, ResolveErrorKind},
    key::{ComponentId, DependencyKey},
};
use blueprint::Wiring;

/// Live object graph: the scope context holding component instances and the root dispatch.
pub struct Runtime {
    scopes: Arc<ScopeContext>,
    resolver: Resolver,
}

impl Runtime {
    pub(crate) fn new(wiring: Wiring) -> Self {
        let resolver = Resolver::new(wiring.plan.dispatch().clone());
        Self {
            scopes: Arc::new(ScopeContext::new(Arc::new(wiring))),
            resolver,
        }
    }

    #[inline]
    #[must_use]
    pub fn scopes(&self) -> &Arc<ScopeContext> {
        &self.scopes
    }

    #[inline]
    #[must_use]
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Component {
        self.scopes.root()
    }

    /// Gets an instance of `key` from its host component, activating the host if needed.
    ///
    /// # Errors
    /// See [`Resolver::get_with_context`].
    #[inline]
    pub fn get<T: 'static>(&self, key: &DependencyKey) -> Result<T, ResolveErrorKind> {
        self.resolver.get(&self.scopes, key)
    }

    /// # Errors
    /// See [`Resolver::get_with_context`].
    #[inline]
    pub fn get_with_context<T: 'static>(&self, key: &DependencyKey, context: &Context) -> Result<T, ResolveErrorKind> {
        self.resolver.get_with_context(&self.scopes, key, context)
    }

    /// # Errors
    /// See [`Resolver::provider`].
    #[inline]
    pub fn provider<T: 'static>(&self, key: &DependencyKey) -> Result<SharedProvider<T>, ResolveErrorKind> {
        self.resolver.provider(&self.scopes, key)
    }

    /// Active instance of component `id`, see [`ScopeContext::get_or_create`].
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::UnknownComponent`] if `id` isn't part of the hierarchy.
    #[inline]
    pub fn component(&self, id: &ComponentId) -> Result<Component, ResolveErrorKind> {
        self.scopes.get_or_create(id)
    }

    /// See [`ScopeContext::destroy`].
    #[inline]
    pub fn destroy(&self, id: &ComponentId) -> bool {
        self.scopes.destroy(id)
    }
}

impl Debug for Runtime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("root", self.root().id())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Process-wide holder of the runtime: initialized once at startup, read by every injection site
/// it is passed to.
///
/// ```rust
/// use staticwire::{ContextSlot, ContextErrorKind};
///
/// static CONTEXT: ContextSlot = ContextSlot::new();
///
/// assert!(!CONTEXT.is_initialized());
/// assert_eq!(CONTEXT.get().err(), Some(ContextErrorKind::NotInitialized));
/// ```
pub struct ContextSlot {
    runtime: RwLock<Option<Arc<Runtime>>>,
}

impl ContextSlot {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            runtime: RwLock::new(None),
        }
    }

    /// # Errors
    /// Returns [`ContextErrorKind::AlreadyInitialized`] if called more than once.
    pub fn initialize(&self, runtime: Runtime) -> Result<(), ContextErrorKind> {
        let mut slot = self.runtime.write();
        if slot.is_some() {
            let err = ContextErrorKind::AlreadyInitialized;
            error!("{}", err);
            return Err(err);
        }
        *slot = Some(Arc::new(runtime));
        debug!("Context initialized");
        Ok(())
    }

    /// # Errors
    /// Returns [`ContextErrorKind::NotInitialized`] before [`Self::initialize`].
    pub fn get(&self) -> Result<Arc<Runtime>, ContextErrorKind> {
        match self.runtime.read().as_ref() {
            Some(runtime) => Ok(runtime.clone()),
            None => {
                let err = ContextErrorKind::NotInitialized;
                error!("{}", err);
                Err(err)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.runtime.read().is_some()
    }
}

impl Default for ContextSlot {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Injection site entry point: resolves `key` through the runtime held by `slot`.
///
/// # Errors
/// - Returns [`ResolveErrorKind::Context`] if `slot` isn't initialized
/// - See [`Runtime::get`]
#[inline]
pub fn inject<T: 'static>(slot: &ContextSlot, key: &DependencyKey) -> Result<T, ResolveErrorKind> {
    inject_with(slot, key, &Context::new())
}

/// Same as [`inject`], supplying runtime context values from the injection site.
///
/// # Errors
/// - Returns [`ResolveErrorKind::Context`] if `slot` isn't initialized
/// - See [`Runtime::get_with_context`]
pub fn inject_with<T: 'static>(slot: &ContextSlot, key: &DependencyKey, context: &Context) -> Result<T, ResolveErrorKind> {
    slot.get()?.get_with_context(key, context)
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use tracing_test::traced_test;

    use super::{inject, Blueprint, ContextSlot};
    use crate::{
        compiler::compile,
        config::Config,
        declaration::{ComponentDecl, Injectable, Manifest},
        errors::{ContextErrorKind, ResolveErrorKind},
        key::{DependencyKey, TypeName},
    };

    struct Clock;

    #[test]
    #[traced_test]
    fn test_context_slot() {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .declaration(Injectable::new(TypeName::of::<Arc<Clock>>()).contributes_to("App"));
        let compilation = compile(&manifest, &Config::default()).unwrap();
        let build = || {
            Blueprint::new()
                .provide(DependencyKey::of::<Arc<Clock>>(), |_| Ok(Arc::new(Clock)))
                .build(&compilation)
                .unwrap()
        };

        let slot = ContextSlot::new();
        let err = inject::<Arc<Clock>>(&slot, &DependencyKey::of::<Arc<Clock>>()).err().unwrap();
        assert!(matches!(err, ResolveErrorKind::Context(ContextErrorKind::NotInitialized)));

        slot.initialize(build()).unwrap();
        assert_eq!(slot.initialize(build()), Err(ContextErrorKind::AlreadyInitialized));

        let first = inject::<Arc<Clock>>(&slot, &DependencyKey::of::<Arc<Clock>>()).unwrap();
        let second = inject::<Arc<Clock>>(&slot, &DependencyKey::of::<Arc<Clock>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
