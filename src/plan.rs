use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::fmt::{self, Display, Formatter};

use crate::{
    graph::{DependencyNode, Graph},
    key::{ComponentId, DependencyKey, ScopeId, TypeName},
};

/// How the provider entry of a node is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderKind {
    /// Constructed at most once per component instance.
    Scoped,
    /// Constructed on every request.
    Unscoped,
    /// The provider of another key.
    Alias,
    /// Synthesized factory of an assisted type.
    Factory,
    /// Assisted type, only constructible through its factory.
    AssistedOnly,
}

impl ProviderKind {
    #[must_use]
    pub fn of(graph: &Graph, node: &DependencyNode) -> Self {
        if node.is_alias {
            ProviderKind::Alias
        } else if node.is_factory {
            ProviderKind::Factory
        } else if node.is_assisted() {
            ProviderKind::AssistedOnly
        } else if graph.is_scoped(node) {
            ProviderKind::Scoped
        } else {
            ProviderKind::Unscoped
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Scoped => "scoped",
            ProviderKind::Unscoped => "unscoped",
            ProviderKind::Alias => "alias",
            ProviderKind::Factory => "factory",
            ProviderKind::AssistedOnly => "assisted-only",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub key: DependencyKey,
    /// Property name of the provider, e.g. `repoPremiumProvider`.
    pub name: String,
    pub kind: ProviderKind,
    pub dependencies: Vec<DependencyKey>,
    pub deferred: Vec<DependencyKey>,
    pub runtime_context: Option<TypeName>,
}

impl ProviderEntry {
    /// Key an alias entry forwards to.
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&DependencyKey> {
        match self.kind {
            ProviderKind::Alias => self.dependencies.first(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPlan {
    pub id: ComponentId,
    pub parent: Option<ComponentId>,
    pub scope: Option<ScopeId>,
    /// One entry per hosted key, in construction order.
    pub providers: Vec<ProviderEntry>,
    /// Components a creation hook is emitted for.
    pub children: Vec<ComponentId>,
}

impl ComponentPlan {
    #[must_use]
    pub fn provider(&self, key: &DependencyKey) -> Option<&ProviderEntry> {
        self.providers.iter().find(|entry| &entry.key == key)
    }
}

/// Everything code emission needs from a frozen graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionPlan {
    root: ComponentId,
    components: BTreeMap<ComponentId, ComponentPlan>,
    dispatch: BTreeMap<DependencyKey, ComponentId>,
}

impl EmissionPlan {
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        let hierarchy = graph.hierarchy();
        let components = hierarchy
            .components()
            .map(|id| {
                let providers = graph
                    .topological_order(id)
                    .into_iter()
                    .filter_map(|key| graph.local(id, key))
                    .map(|node| ProviderEntry {
                        key: node.key.clone(),
                        name: node.key.provider_name(),
                        kind: ProviderKind::of(graph, node),
                        dependencies: node.dependencies.clone(),
                        deferred: node.deferred.clone(),
                        runtime_context: node.runtime_context.as_ref().map(|(_, ty)| ty.clone()),
                    })
                    .collect();
                let plan = ComponentPlan {
                    id: id.clone(),
                    parent: hierarchy.parent(id).cloned(),
                    scope: hierarchy.scope(id).cloned(),
                    providers,
                    children: hierarchy.children(id).to_vec(),
                };
                (id.clone(), plan)
            })
            .collect();

        Self {
            root: hierarchy.root().clone(),
            components,
            dispatch: graph.dispatch(),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &ComponentId {
        &self.root
    }

    #[inline]
    #[must_use]
    pub fn component(&self, id: &ComponentId) -> Option<&ComponentPlan> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentPlan> {
        self.components.values()
    }

    /// Global `(type, qualifier) -> host component` dispatch of the root.
    #[inline]
    #[must_use]
    pub fn dispatch(&self) -> &BTreeMap<DependencyKey, ComponentId> {
        &self.dispatch
    }

    /// Every component below `id`, parents before their children.
    #[must_use]
    pub fn descendants(&self, id: &ComponentId) -> Vec<ComponentId> {
        let mut descendants = Vec::new();
        let mut pending: Vec<&ComponentId> = self.component(id).map(|plan| plan.children.iter().collect()).unwrap_or_default();
        pending.reverse();
        while let Some(child) = pending.pop() {
            descendants.push(child.clone());
            if let Some(plan) = self.component(child) {
                pending.extend(plan.children.iter().rev());
            }
        }
        descendants
    }
}
