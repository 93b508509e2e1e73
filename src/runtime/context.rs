use alloc::{boxed::Box, collections::BTreeMap, sync::Arc};
use core::any::{Any, TypeId};

type Map = BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Runtime context values supplied at an injection site, one per type.
///
/// A node with a runtime context parameter reads it from here instead of the graph.
#[derive(Clone, Default)]
pub struct Context {
    map: Option<Box<Map>>,
}

impl Context {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { map: None }
    }

    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<Arc<T>> {
        self.insert_rc(Arc::new(value))
    }

    #[inline]
    pub fn insert_rc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.map
            .get_or_insert_with(Box::default)
            .insert(TypeId::of::<T>(), value)
            .and_then(|boxed| boxed.downcast().ok())
    }

    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    #[inline]
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .as_ref()?
            .get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.as_ref().map_or(true, |map| map.is_empty())
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.map.as_ref().map_or(0, |map| map.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::Context;

    struct Handle(u8);

    #[test]
    fn test_insert_and_get() {
        let mut context = Context::new();
        assert!(context.is_empty());
        assert!(context.get::<Handle>().is_none());

        assert!(context.insert(Handle(1)).is_none());
        let previous = context.insert(Handle(2)).unwrap();
        assert_eq!(previous.0, 1);

        let handle: Arc<Handle> = context.get().unwrap();
        assert_eq!(handle.0, 2);
        assert_eq!(Context::new().with(Handle(3)).get::<Handle>().unwrap().0, 3);
    }
}
