use alloc::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use core::any::{type_name, Any};
use tracing::{debug, error, info_span};

use super::{
    blueprint::Wiring,
    context::Context,
    provider::{Provider as _, SharedProvider},
};
use crate::{
    errors::{InstantiateErrorKind, ResolveErrorKind},
    key::{ComponentId, DependencyKey},
};

/// A `SharedProvider<T>` with its `T` erased.
pub(crate) type ErasedProvider = Arc<dyn Any + Send + Sync>;

/// Builds the provider of an interface out of its target's provider, looked up from the given component.
pub(crate) type CastFn = Arc<dyn Fn(&Component, &DependencyKey) -> Result<ErasedProvider, ResolveErrorKind> + Send + Sync>;

pub(crate) enum Entry {
    Provider(ErasedProvider),
    Alias { target: DependencyKey, cast: Option<CastFn> },
    AssistedOnly,
    /// No constructor was registered, only reachable with an unchecked blueprint.
    Missing,
}

pub(crate) struct ComponentInner {
    id: ComponentId,
    parent: Option<Component>,
    entries: BTreeMap<DependencyKey, Entry>,
}

/// A live component instance: one provider per hosted key and a handle to its parent instance.
///
/// Cloning is cheap and yields a handle to the same instance.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl Component {
    pub(crate) fn new(wiring: &Wiring, id: &ComponentId, parent: Option<Component>) -> Self {
        let providers = wiring
            .plan
            .component(id)
            .map_or(&[][..], |plan| plan.providers.as_slice());

        let inner = Arc::new_cyclic(|weak| ComponentInner {
            id: id.clone(),
            parent,
            entries: providers
                .iter()
                .map(|entry| (entry.key.clone(), wiring.entry(entry, weak, id)))
                .collect(),
        });

        debug!(component = %id, providers = providers.len(), "Component created");
        Self { inner }
    }

    pub(crate) fn upgrade(weak: &Weak<ComponentInner>, id: &ComponentId) -> Result<Self, ResolveErrorKind> {
        match weak.upgrade() {
            Some(inner) => Ok(Self { inner }),
            None => {
                let err = ResolveErrorKind::ComponentDropped { component: id.clone() };
                error!("{}", err);
                Err(err)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Component> {
        self.inner.parent.as_ref()
    }

    /// Whether both handles point to the same instance.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `key` is hosted by this instance or one of its ancestors.
    #[must_use]
    pub fn contains(&self, key: &DependencyKey) -> bool {
        let mut component = Some(self);
        while let Some(current) = component {
            if current.inner.entries.contains_key(key) {
                return true;
            }
            component = current.parent();
        }
        false
    }

    /// Provider of `key`, looked up locally first and then up the parent chain.
    /// An alias yields its target's provider.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoProviderFound`] if neither this instance nor an ancestor hosts `key`
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the hosted provider isn't a provider of `T`
    /// - Returns [`ResolveErrorKind::AssistedConstruction`] if `key` can only be built through its factory
    pub fn provider<T: 'static>(&self, key: &DependencyKey) -> Result<SharedProvider<T>, ResolveErrorKind> {
        let mut component = self;
        loop {
            if let Some(entry) = component.inner.entries.get(key) {
                return component.entry_provider(key, entry);
            }
            match component.parent() {
                Some(parent) => component = parent,
                None => {
                    let err = ResolveErrorKind::NoProviderFound { key: key.clone() };
                    error!("{}", err);
                    return Err(err);
                }
            }
        }
    }

    fn entry_provider<T: 'static>(&self, key: &DependencyKey, entry: &Entry) -> Result<SharedProvider<T>, ResolveErrorKind> {
        let err = match entry {
            Entry::Provider(provider) => return downcast(key, provider),
            Entry::Alias { target, cast: None } => return self.provider(target),
            Entry::Alias { target, cast: Some(cast) } => return downcast(key, &cast(self, target)?),
            Entry::AssistedOnly => ResolveErrorKind::AssistedConstruction { key: key.clone() },
            Entry::Missing => ResolveErrorKind::NoProviderFound { key: key.clone() },
        };
        error!("{}", err);
        Err(err)
    }

    /// Gets an instance of `key` with an empty runtime context.
    ///
    /// # Errors
    /// See [`Self::provider`], plus any error of the construction path.
    #[inline]
    pub fn get<T: 'static>(&self, key: &DependencyKey) -> Result<T, ResolveErrorKind> {
        self.get_with_context(key, &Context::new())
    }

    /// Gets an instance of `key`, sourcing runtime context parameters from `context`.
    ///
    /// # Errors
    /// See [`Self::provider`], plus any error of the construction path.
    pub fn get_with_context<T: 'static>(&self, key: &DependencyKey, context: &Context) -> Result<T, ResolveErrorKind> {
        let span = info_span!("get", dependency = %key, component = %self.inner.id);
        let _guard = span.enter();

        self.provider::<T>(key)?.get_with_context(context)
    }
}

fn downcast<T: 'static>(key: &DependencyKey, provider: &ErasedProvider) -> Result<SharedProvider<T>, ResolveErrorKind> {
    match (**provider).downcast_ref::<SharedProvider<T>>() {
        Some(provider) => Ok(provider.clone()),
        None => {
            let err = ResolveErrorKind::IncorrectType {
                key: key.clone(),
                expected: type_name::<T>(),
            };
            error!("{}", err);
            Err(err)
        }
    }
}

/// Maps a constructor failure onto the key being constructed. Failures of the constructor's
/// own dependencies are passed through as they are.
pub(crate) fn instantiate_error(key: &DependencyKey, err: InstantiateErrorKind) -> ResolveErrorKind {
    match err {
        InstantiateErrorKind::Dependency(err) => *err,
        source @ InstantiateErrorKind::Custom(_) => {
            let err = ResolveErrorKind::Instantiate { key: key.clone(), source };
            error!("{}", err);
            err
        }
    }
}

/// What a constructor sees: the instance hosting the node being built and the injection site's context.
pub struct Injector<'a> {
    component: &'a Component,
    key: &'a DependencyKey,
    context: &'a Context,
}

impl<'a> Injector<'a> {
    #[inline]
    pub(crate) const fn new(component: &'a Component, key: &'a DependencyKey, context: &'a Context) -> Self {
        Self { component, key, context }
    }

    /// Key of the node being constructed.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &DependencyKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub const fn component(&self) -> &Component {
        self.component
    }

    #[inline]
    #[must_use]
    pub const fn context(&self) -> &Context {
        self.context
    }

    /// Resolves a dependency, passing the context on.
    ///
    /// # Errors
    /// See [`Component::get_with_context`].
    #[inline]
    pub fn get<T: 'static>(&self, key: &DependencyKey) -> Result<T, ResolveErrorKind> {
        self.component.get_with_context(key, self.context)
    }

    /// Resolves the unqualified dependency of type `T`.
    ///
    /// # Errors
    /// See [`Component::get_with_context`].
    #[inline]
    pub fn inject<T: 'static>(&self) -> Result<T, ResolveErrorKind> {
        self.get(&DependencyKey::of::<T>())
    }

    /// Provider of a dependency requested as a provider, to be called later.
    ///
    /// # Errors
    /// See [`Component::provider`].
    #[inline]
    pub fn provider<T: 'static>(&self, key: &DependencyKey) -> Result<SharedProvider<T>, ResolveErrorKind> {
        self.component.provider(key)
    }

    /// The runtime context value of type `C` supplied at the injection site.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::MissingRuntimeContext`] if the caller didn't supply one.
    pub fn runtime_context<C: Send + Sync + 'static>(&self) -> Result<Arc<C>, ResolveErrorKind> {
        match self.context.get::<C>() {
            Some(value) => Ok(value),
            None => {
                let err = ResolveErrorKind::MissingRuntimeContext {
                    key: self.key.clone(),
                    expected: type_name::<C>(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}
