use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::{blueprint::Wiring, component::Component};
use crate::{errors::ResolveErrorKind, key::ComponentId};

/// Live component instances of a runtime, at most one per component.
///
/// The root instance lives as long as the runtime. Subcomponent instances are created on
/// first use, parents first, and live until they are destroyed.
pub struct ScopeContext {
    wiring: Arc<Wiring>,
    root: Component,
    active: Mutex<BTreeMap<ComponentId, Component>>,
}

impl ScopeContext {
    pub(crate) fn new(wiring: Arc<Wiring>) -> Self {
        let root = Component::new(&wiring, wiring.plan.root(), None);
        Self {
            wiring,
            root,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Component {
        &self.root
    }

    /// Active instance of `id`, creating it and its missing ancestors if needed.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::UnknownComponent`] if `id` isn't part of the hierarchy.
    pub fn get_or_create(&self, id: &ComponentId) -> Result<Component, ResolveErrorKind> {
        let mut active = self.active.lock();
        self.get_or_create_locked(&mut active, id)
    }

    /// Walks the ancestors under the caller's guard, so no ancestor can be destroyed
    /// between its lookup and the activation of `id`.
    fn get_or_create_locked(
        &self,
        active: &mut BTreeMap<ComponentId, Component>,
        id: &ComponentId,
    ) -> Result<Component, ResolveErrorKind> {
        if id == self.root.id() {
            return Ok(self.root.clone());
        }

        let Some(plan) = self.wiring.plan.component(id) else {
            let err = ResolveErrorKind::UnknownComponent { component: id.clone() };
            error!("{}", err);
            return Err(err);
        };
        let parent = match &plan.parent {
            Some(parent) => self.get_or_create_locked(active, parent)?,
            None => self.root.clone(),
        };

        if let Some(component) = active.get(id) {
            if component.parent().is_some_and(|current| current.ptr_eq(&parent)) {
                return Ok(component.clone());
            }
        }

        let component = Component::new(&self.wiring, id, Some(parent));
        active.insert(id.clone(), component.clone());
        debug!(component = %id, "Component activated");
        Ok(component)
    }

    /// Destroys the active instance of `id` along with every active instance below it.
    /// Scoped instances are dropped once no handle to them is left.
    ///
    /// Returns `false` if `id` wasn't active. The root can't be destroyed.
    pub fn destroy(&self, id: &ComponentId) -> bool {
        let removed: Vec<Component> = {
            let mut active = self.active.lock();
            let Some(component) = active.remove(id) else {
                return false;
            };
            let mut removed = Vec::from([component]);
            removed.extend(
                self.wiring
                    .plan
                    .descendants(id)
                    .iter()
                    .filter_map(|descendant| active.remove(descendant)),
            );
            removed
        };

        debug!(component = %id, destroyed = removed.len(), "Components destroyed");
        drop(removed);
        true
    }

    #[must_use]
    pub fn is_active(&self, id: &ComponentId) -> bool {
        id == self.root.id() || self.active.lock().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{sync::Arc, vec::Vec};
    use std::{sync::Barrier, thread};
    use tracing_test::traced_test;

    use super::ScopeContext;
    use crate::{
        compiler::compile,
        config::Config,
        declaration::{ComponentDecl, Manifest},
        errors::ResolveErrorKind,
        key::ComponentId,
        runtime::Blueprint,
    };

    fn scopes() -> Arc<ScopeContext> {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .component(ComponentDecl::subcomponent("Session", "App").scope("SessionScope"))
            .component(ComponentDecl::subcomponent("Screen", "Session").scope("ScreenScope"));
        let compilation = compile(&manifest, &Config::default()).unwrap();
        Blueprint::new().build(&compilation).unwrap().scopes().clone()
    }

    #[test]
    #[traced_test]
    fn test_get_or_create_reuses_active() {
        let scopes = scopes();
        let screen = ComponentId::from("Screen");

        let first = scopes.get_or_create(&screen).unwrap();
        let second = scopes.get_or_create(&screen).unwrap();
        assert!(first.ptr_eq(&second));
        assert!(scopes.is_active(&ComponentId::from("Session")));

        let session = first.parent().unwrap();
        assert!(session.parent().unwrap().ptr_eq(scopes.root()));
        assert!(scopes.get_or_create(&ComponentId::from("App")).unwrap().ptr_eq(scopes.root()));
    }

    #[test]
    #[traced_test]
    fn test_destroy_cascades() {
        let scopes = scopes();
        let session = ComponentId::from("Session");
        let screen = ComponentId::from("Screen");

        let old = scopes.get_or_create(&screen).unwrap();
        assert!(scopes.destroy(&session));
        assert!(!scopes.is_active(&session));
        assert!(!scopes.is_active(&screen));
        assert!(!scopes.destroy(&session));
        assert!(!scopes.destroy(&ComponentId::from("App")));

        let new = scopes.get_or_create(&screen).unwrap();
        assert!(!new.ptr_eq(&old));
        assert!(!new.parent().unwrap().ptr_eq(old.parent().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_unknown_component() {
        let err = scopes().get_or_create(&ComponentId::from("Missing")).err().unwrap();
        assert!(matches!(err, ResolveErrorKind::UnknownComponent { component } if component.as_str() == "Missing"));
    }

    #[test]
    fn test_destroy_racing_activation_leaves_no_orphans() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 200;

        let scopes = scopes();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|thread| {
                let scopes = scopes.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        if thread % 2 == 0 {
                            let screen = scopes.get_or_create(&ComponentId::from("Screen")).unwrap();
                            assert_eq!(screen.parent().unwrap().id().as_str(), "Session");
                        } else {
                            scopes.destroy(&ComponentId::from("Session"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let active = scopes.active.lock();
        if let Some(screen) = active.get(&ComponentId::from("Screen")) {
            let session = active.get(&ComponentId::from("Session")).unwrap();
            assert!(screen.parent().unwrap().ptr_eq(session));
        }
    }
}
