mod builder;
mod cycle;

pub(crate) use builder::build;
pub(crate) use cycle::detect_cycles;

use alloc::{
    collections::{BTreeMap, BTreeSet},
    string::String,
    vec::Vec,
};

use crate::{
    declaration::TypeRef,
    hierarchy::Hierarchy,
    key::{ComponentId, DependencyKey, ScopeId, TypeName},
};

/// The resolved unit for one [`DependencyKey`] hosted by one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub key: DependencyKey,
    /// Index of the declaration this node was derived from in [`crate::Manifest::declarations`].
    pub source: usize,
    /// Keys required to construct the node, in parameter order.
    pub dependencies: Vec<DependencyKey>,
    /// Keys requested as providers. They must be satisfiable but aren't construction edges.
    pub deferred: Vec<DependencyKey>,
    /// Parameters supplied by the caller at construction time.
    pub assisted_parameters: Vec<(String, TypeRef)>,
    /// Interfaces aliasing to this node.
    pub binding_targets: Vec<DependencyKey>,
    pub scope: Option<ScopeId>,
    pub host_component: ComponentId,
    /// Parameter sourced from the injection site rather than the graph.
    pub runtime_context: Option<(String, TypeName)>,
    pub is_alias: bool,
    pub is_factory: bool,
    pub is_runtime_scoped: bool,
}

impl DependencyNode {
    #[must_use]
    pub fn new(key: DependencyKey, source: usize, host_component: ComponentId) -> Self {
        Self {
            key,
            source,
            dependencies: Vec::new(),
            deferred: Vec::new(),
            assisted_parameters: Vec::new(),
            binding_targets: Vec::new(),
            scope: None,
            host_component,
            runtime_context: None,
            is_alias: false,
            is_factory: false,
            is_runtime_scoped: false,
        }
    }

    /// Whether the node needs caller-supplied arguments, so can only be built through its factory.
    #[inline]
    #[must_use]
    pub fn is_assisted(&self) -> bool {
        !self.is_factory && !self.assisted_parameters.is_empty()
    }

    /// Target of an alias node.
    #[inline]
    #[must_use]
    pub fn alias_target(&self) -> Option<&DependencyKey> {
        if self.is_alias {
            self.dependencies.first()
        } else {
            None
        }
    }
}

/// Frozen dependency graph: one local graph per component of the hierarchy.
///
/// A key may be hosted by several components of different lineages, but the view of any one
/// component (its local nodes, then its ancestors') holds at most one node per key.
#[derive(Debug, Clone)]
pub struct Graph {
    hierarchy: Hierarchy,
    components: BTreeMap<ComponentId, BTreeMap<DependencyKey, DependencyNode>>,
}

impl Graph {
    pub(crate) fn new(hierarchy: Hierarchy) -> Self {
        let components = hierarchy.components().map(|id| (id.clone(), BTreeMap::new())).collect();
        Self { hierarchy, components }
    }

    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Node hosted by `component` itself.
    #[inline]
    #[must_use]
    pub fn local(&self, component: &ComponentId, key: &DependencyKey) -> Option<&DependencyNode> {
        self.components.get(component)?.get(key)
    }

    /// Node visible from `component`: its own, else the nearest ancestor's.
    #[must_use]
    pub fn resolve(&self, component: &ComponentId, key: &DependencyKey) -> Option<&DependencyNode> {
        self.hierarchy.lineage(component).find_map(|id| self.local(id, key))
    }

    /// Nodes hosted by `component`, in key order.
    pub fn nodes<'a>(&'a self, component: &ComponentId) -> impl Iterator<Item = &'a DependencyNode> + 'a {
        self.components.get(component).into_iter().flat_map(BTreeMap::values)
    }

    /// Every node of every component.
    pub fn iter(&self) -> impl Iterator<Item = &DependencyNode> {
        self.components.values().flat_map(BTreeMap::values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Everything `component` can see, with its own nodes shadowing its ancestors'.
    #[must_use]
    pub fn flattened(&self, component: &ComponentId) -> BTreeMap<&DependencyKey, &DependencyNode> {
        let mut view = BTreeMap::new();
        for id in self.hierarchy.lineage(component) {
            for node in self.nodes(id) {
                view.entry(&node.key).or_insert(node);
            }
        }
        view
    }

    /// `host component -> hosted keys`, the index emission walks.
    #[must_use]
    pub fn hosted_keys(&self) -> BTreeMap<&ComponentId, BTreeSet<&DependencyKey>> {
        self.components
            .iter()
            .map(|(component, nodes)| (component, nodes.keys().collect()))
            .collect()
    }

    /// Root dispatch table: every key to the component hosting it.
    ///
    /// A key hosted by several components resolves to the one nearest the root (ties broken by id),
    /// since only that one is reachable without entering a particular subtree.
    #[must_use]
    pub fn dispatch(&self) -> BTreeMap<DependencyKey, ComponentId> {
        let mut components: Vec<_> = self.components.keys().collect();
        components.sort_by_key(|id| (self.hierarchy.depth(id), *id));

        let mut dispatch = BTreeMap::new();
        for component in components {
            for key in self.components[component].keys() {
                dispatch.entry(key.clone()).or_insert_with(|| component.clone());
            }
        }
        dispatch
    }

    /// Whether the node is cached for the lifetime of its host component instance:
    /// it has a scope, that scope is its host's scope, and it isn't runtime scoped.
    #[must_use]
    pub fn is_scoped(&self, node: &DependencyNode) -> bool {
        match &node.scope {
            Some(scope) => {
                !node.is_runtime_scoped && self.hierarchy.scope(&node.host_component) == Some(scope)
            }
            None => false,
        }
    }

    /// Construction order of the nodes hosted by `component`: every node comes after the local
    /// nodes it depends on. Dependencies hosted by ancestors are already built and not listed.
    #[must_use]
    pub fn topological_order(&self, component: &ComponentId) -> Vec<&DependencyKey> {
        let Some(nodes) = self.components.get(component) else {
            return Vec::new();
        };

        let mut visited = BTreeSet::new();
        let mut order = Vec::with_capacity(nodes.len());
        for key in nodes.keys() {
            visit(nodes, key, &mut visited, &mut order);
        }
        order
    }

    pub(crate) fn insert(&mut self, node: DependencyNode) -> Result<(), DependencyNode> {
        let Some(nodes) = self.components.get_mut(&node.host_component) else {
            return Err(node);
        };
        if nodes.contains_key(&node.key) {
            return Err(node);
        }
        nodes.insert(node.key.clone(), node);
        Ok(())
    }
}

fn visit<'a>(
    nodes: &'a BTreeMap<DependencyKey, DependencyNode>,
    key: &'a DependencyKey,
    visited: &mut BTreeSet<&'a DependencyKey>,
    order: &mut Vec<&'a DependencyKey>,
) {
    if !visited.insert(key) {
        return;
    }
    if let Some(node) = nodes.get(key) {
        for dependency in &node.dependencies {
            if let Some((dependency, _)) = nodes.get_key_value(dependency) {
                visit(nodes, dependency, visited, order);
            }
        }
    }
    order.push(key);
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use tracing_test::traced_test;

    use super::{DependencyNode, Graph};
    use crate::{
        config::Config,
        contribution::ContributionIndex,
        declaration::{ComponentDecl, Manifest},
        hierarchy::Hierarchy,
        key::{ComponentId, DependencyKey},
    };

    fn graph() -> Graph {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .component(ComponentDecl::subcomponent("User", "App").scope("UserScope"));
        let mut errors = Vec::new();
        let index = ContributionIndex::index(&manifest, &mut errors);
        Graph::new(Hierarchy::resolve(&index, &Config::default(), &mut errors).unwrap())
    }

    fn node(key: &str, host: &str, dependencies: &[&str]) -> DependencyNode {
        let mut node = DependencyNode::new(DependencyKey::unqualified(key), 0, ComponentId::from(host));
        node.dependencies = dependencies.iter().map(|&dep| DependencyKey::unqualified(dep)).collect();
        node
    }

    #[test]
    #[traced_test]
    fn test_local_node_shadows_ancestor() {
        let mut graph = graph();
        graph.insert(node("Repo", "App", &[])).unwrap();
        graph.insert(node("Repo", "User", &["Api"])).unwrap();
        graph.insert(node("Api", "App", &[])).unwrap();
        assert!(graph.insert(node("Api", "App", &[])).is_err());

        let user = ComponentId::from("User");
        let view = graph.flattened(&user);
        assert_eq!(view.len(), 2);
        assert_eq!(view[&DependencyKey::unqualified("Repo")].host_component, user);
        assert_eq!(
            graph.resolve(&user, &DependencyKey::unqualified("Api")).unwrap().host_component,
            ComponentId::from("App")
        );

        let dispatch = graph.dispatch();
        assert_eq!(dispatch[&DependencyKey::unqualified("Repo")], ComponentId::from("App"));
    }

    #[test]
    #[traced_test]
    fn test_topological_order() {
        let mut graph = graph();
        graph.insert(node("A", "App", &["C", "B"])).unwrap();
        graph.insert(node("B", "App", &["C"])).unwrap();
        graph.insert(node("C", "App", &[])).unwrap();

        let order: Vec<_> = graph
            .topological_order(&ComponentId::from("App"))
            .into_iter()
            .map(|key| key.type_name.as_str())
            .collect();
        assert_eq!(order, ["C", "B", "A"]);
    }

    #[test]
    #[traced_test]
    fn test_is_scoped() {
        let graph = graph();

        let mut singleton = node("Db", "App", &[]);
        singleton.scope = Some("Singleton".into());
        assert!(graph.is_scoped(&singleton));

        singleton.is_runtime_scoped = true;
        assert!(!graph.is_scoped(&singleton));

        let mut foreign = node("Session", "App", &[]);
        foreign.scope = Some("UserScope".into());
        assert!(!graph.is_scoped(&foreign));
        assert!(!graph.is_scoped(&node("Plain", "App", &[])));
    }
}
