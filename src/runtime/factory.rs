use alloc::sync::{Arc, Weak};
use core::fmt::{self, Debug, Formatter};

use super::{
    component::{instantiate_error, Component, ComponentInner, Injector},
    context::Context,
};
use crate::{
    errors::{InstantiateErrorKind, ResolveErrorKind},
    key::{ComponentId, DependencyKey},
};

pub(crate) type Create<Args, T> = Arc<dyn Fn(&Injector<'_>, Args) -> Result<T, InstantiateErrorKind> + Send + Sync>;

/// Value of a factory node: builds its assisted type out of caller arguments
/// and the dependencies resolved from the factory's host component.
///
/// Holds only a weak handle to the host, so a factory kept past the host's
/// `destroy` fails with [`ResolveErrorKind::ComponentDropped`] instead of keeping it alive.
pub struct AssistedFactory<Args, T> {
    component: Weak<ComponentInner>,
    component_id: ComponentId,
    key: DependencyKey,
    context: Context,
    create: Create<Args, T>,
}

impl<Args, T> AssistedFactory<Args, T> {
    pub(crate) fn new(
        component: Weak<ComponentInner>,
        component_id: ComponentId,
        key: DependencyKey,
        context: Context,
        create: Create<Args, T>,
    ) -> Self {
        Self {
            component,
            component_id,
            key,
            context,
            create,
        }
    }

    /// Key of the factory node.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    /// Builds a new instance with the caller-supplied `args`.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::ComponentDropped`] if the host component was destroyed
    /// - Returns an error if a graph dependency can't be resolved or the constructor fails
    pub fn create(&self, args: Args) -> Result<T, ResolveErrorKind> {
        let component = Component::upgrade(&self.component, &self.component_id)?;
        let injector = Injector::new(&component, &self.key, &self.context);
        (self.create)(&injector, args).map_err(|err| instantiate_error(&self.key, err))
    }
}

impl<Args, T> Clone for AssistedFactory<Args, T> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            component_id: self.component_id.clone(),
            key: self.key.clone(),
            context: self.context.clone(),
            create: self.create.clone(),
        }
    }
}

impl<Args, T> Debug for AssistedFactory<Args, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistedFactory")
            .field("key", &self.key)
            .field("component", &self.component_id)
            .finish_non_exhaustive()
    }
}
