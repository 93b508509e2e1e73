use alloc::{boxed::Box, sync::Arc};
use parking_lot::Mutex;
use tracing::debug;

use super::context::Context;
use crate::errors::ResolveErrorKind;

/// Capability to produce an instance of `T` on demand.
pub trait Provider<T> {
    /// Produces an instance, sourcing runtime context parameters from `context`.
    ///
    /// # Errors
    /// Returns the error of the construction path, see [`ResolveErrorKind`].
    fn get_with_context(&self, context: &Context) -> Result<T, ResolveErrorKind>;

    /// Produces an instance without any runtime context.
    ///
    /// # Errors
    /// Returns the error of the construction path, see [`ResolveErrorKind`].
    #[inline]
    fn get(&self) -> Result<T, ResolveErrorKind> {
        self.get_with_context(&Context::new())
    }
}

pub type SharedProvider<T> = Arc<dyn Provider<T> + Send + Sync>;

type Construct<T> = Box<dyn Fn(&Context) -> Result<T, ResolveErrorKind> + Send + Sync>;

/// Invokes its construction closure on every call.
pub struct UnscopedProvider<T> {
    construct: Construct<T>,
}

impl<T> UnscopedProvider<T> {
    #[inline]
    #[must_use]
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn(&Context) -> Result<T, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self {
            construct: Box::new(construct),
        }
    }
}

impl<T> Provider<T> for UnscopedProvider<T> {
    #[inline]
    fn get_with_context(&self, context: &Context) -> Result<T, ResolveErrorKind> {
        (self.construct)(context)
    }
}

/// Invokes the wrapped provider at most once and hands out clones of the result.
///
/// The check and the construction happen under one lock, so concurrent first calls
/// construct a single instance. A failed construction isn't cached, the next call retries.
pub struct ScopedProvider<T> {
    inner: SharedProvider<T>,
    value: Mutex<Option<T>>,
}

impl<T> ScopedProvider<T> {
    #[inline]
    #[must_use]
    pub fn new(inner: SharedProvider<T>) -> Self {
        Self {
            inner,
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> Provider<T> for ScopedProvider<T> {
    fn get_with_context(&self, context: &Context) -> Result<T, ResolveErrorKind> {
        let mut guard = self.value.lock();
        if let Some(value) = guard.as_ref() {
            debug!("Found in cache");
            return Ok(value.clone());
        }
        debug!("Not found in cache");

        let value = self.inner.get_with_context(context)?;
        *guard = Some(value.clone());
        debug!("Cached");
        Ok(value)
    }
}

/// Provider of an interface type backed by the provider of its implementation.
pub(crate) struct CastProvider<U, T> {
    pub(crate) inner: SharedProvider<U>,
    pub(crate) cast: fn(U) -> T,
}

impl<U, T> Provider<T> for CastProvider<U, T> {
    #[inline]
    fn get_with_context(&self, context: &Context) -> Result<T, ResolveErrorKind> {
        self.inner.get_with_context(context).map(self.cast)
    }
}
