use alloc::collections::BTreeMap;
use tracing::{debug, error};

use super::{context::Context, provider::SharedProvider, scope_context::ScopeContext};
use crate::{
    errors::ResolveErrorKind,
    key::{ComponentId, DependencyKey},
};

/// Root-level entry point: finds the host of a key and asks the host's active instance for it.
#[derive(Debug, Clone)]
pub struct Resolver {
    dispatch: BTreeMap<DependencyKey, ComponentId>,
}

impl Resolver {
    #[inline]
    #[must_use]
    pub(crate) const fn new(dispatch: BTreeMap<DependencyKey, ComponentId>) -> Self {
        Self { dispatch }
    }

    /// Component hosting `key`. A key hosted at several levels resolves to the level nearest the root.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NoProviderFound`] if no component hosts `key`.
    pub fn host(&self, key: &DependencyKey) -> Result<&ComponentId, ResolveErrorKind> {
        match self.dispatch.get(key) {
            Some(host) => Ok(host),
            None => {
                let err = ResolveErrorKind::NoProviderFound { key: key.clone() };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Provider of `key` from its host's active instance, creating the instance if needed.
    ///
    /// # Errors
    /// See [`Self::host`] and [`super::Component::provider`].
    pub fn provider<T: 'static>(&self, scopes: &ScopeContext, key: &DependencyKey) -> Result<SharedProvider<T>, ResolveErrorKind> {
        let host = self.host(key)?;
        debug!(dependency = %key, component = %host, "Dispatched");
        scopes.get_or_create(host)?.provider(key)
    }

    /// # Errors
    /// See [`Self::get_with_context`].
    #[inline]
    pub fn get<T: 'static>(&self, scopes: &ScopeContext, key: &DependencyKey) -> Result<T, ResolveErrorKind> {
        self.get_with_context(scopes, key, &Context::new())
    }

    /// # Errors
    /// See [`Self::host`] and [`super::Component::get_with_context`].
    pub fn get_with_context<T: 'static>(
        &self,
        scopes: &ScopeContext,
        key: &DependencyKey,
        context: &Context,
    ) -> Result<T, ResolveErrorKind> {
        let host = self.host(key)?;
        debug!(dependency = %key, component = %host, "Dispatched");
        scopes.get_or_create(host)?.get_with_context(key, context)
    }
}
