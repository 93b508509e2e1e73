use alloc::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    vec::Vec,
};
use core::iter;
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    contribution::{ContributionIndex, ContributionUnit},
    errors::GraphErrorKind,
    key::{ComponentId, ScopeId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct HierarchyNode {
    parent: Option<ComponentId>,
    scope: Option<ScopeId>,
    children: Vec<ComponentId>,
    depth: usize,
}

/// Parent/child relation of the components reachable from the entry point.
///
/// Only the tree hanging from the single root is kept, components of unrelated trees
/// are not part of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    root: ComponentId,
    nodes: BTreeMap<ComponentId, HierarchyNode>,
}

impl Hierarchy {
    /// Derives each component's parent from the contribution index.
    ///
    /// A subcomponent contributed to `A` has parent `A`, every other component has none.
    /// Returns `None` if no unique root could be found, the reasons are pushed onto `errors`.
    pub fn resolve(index: &ContributionIndex<'_>, config: &Config, errors: &mut Vec<GraphErrorKind>) -> Option<Self> {
        let entry_point = &index.manifest().entry_point;
        if index.component(entry_point).is_none() {
            let err = GraphErrorKind::UnknownEntryPoint {
                entry_point: entry_point.clone(),
            };
            error!("{}", err);
            errors.push(err);
            return None;
        }

        let mut parents = BTreeMap::new();
        for component in index.components() {
            let parent = if component.is_subcomponent() {
                let targets = index.targets_of(ContributionUnit::Component(&component.id));
                if targets.len() > 1 {
                    let err = GraphErrorKind::MultipleParents {
                        component: component.id.clone(),
                        parents: targets.iter().map(|&target| target.clone()).collect(),
                    };
                    error!("{}", err);
                    errors.push(err);
                }
                targets.first().copied()
            } else {
                None
            };
            parents.insert(&component.id, parent);
        }

        let reachable = reachable_from(index, entry_point);
        let roots: Vec<_> = reachable
            .iter()
            .filter(|id| parents.get(*id).is_some_and(Option::is_none))
            .copied()
            .collect();
        let root = match roots.as_slice() {
            [root] => *root,
            [] => {
                let err = GraphErrorKind::NoRoot {
                    entry_point: entry_point.clone(),
                };
                error!("{}", err);
                errors.push(err);
                return None;
            }
            _ => {
                let err = GraphErrorKind::MultipleRoots {
                    roots: roots.iter().map(|&root| root.clone()).collect(),
                };
                error!("{}", err);
                errors.push(err);
                return None;
            }
        };

        let mut children: BTreeMap<&ComponentId, Vec<ComponentId>> = BTreeMap::new();
        for (&component, parent) in &parents {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(component.clone());
            }
        }

        let mut nodes = BTreeMap::new();
        let mut queue = VecDeque::from([(root, None::<&ComponentId>, 0)]);
        while let Some((component, parent, depth)) = queue.pop_front() {
            let component_children = children.remove(component).unwrap_or_default();
            for child in &component_children {
                if let Some((child, _)) = parents.get_key_value(child) {
                    queue.push_back((*child, Some(component), depth + 1));
                }
            }
            nodes.insert(
                component.clone(),
                HierarchyNode {
                    parent: parent.cloned(),
                    scope: index.component(component).and_then(|decl| decl.scope.clone()),
                    children: component_children,
                    depth,
                },
            );
        }

        let detached: Vec<_> = reachable
            .into_iter()
            .filter(|id| !nodes.contains_key(*id))
            .cloned()
            .collect();
        if !detached.is_empty() {
            let err = GraphErrorKind::CyclicHierarchy { components: detached };
            error!("{}", err);
            errors.push(err);
        }

        let hierarchy = Self {
            root: root.clone(),
            nodes,
        };
        hierarchy.check_scopes(config, errors);

        debug!(root = %hierarchy.root, components = hierarchy.nodes.len(), "Hierarchy resolved");
        Some(hierarchy)
    }

    fn check_scopes(&self, config: &Config, errors: &mut Vec<GraphErrorKind>) {
        for (component, node) in &self.nodes {
            let Some(scope) = &node.scope else {
                continue;
            };
            let Some(ancestor) = self.ancestors(component).find(|ancestor| self.scope(ancestor) == Some(scope)) else {
                continue;
            };

            let err = GraphErrorKind::AmbiguousScope {
                scope: scope.clone(),
                component: component.clone(),
                ancestor: ancestor.clone(),
            };
            if config.reject_ambiguous_scopes {
                error!("{}", err);
                errors.push(err);
            } else {
                warn!("{}", err);
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &ComponentId {
        &self.root
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, component: &ComponentId) -> bool {
        self.nodes.contains_key(component)
    }

    #[inline]
    #[must_use]
    pub fn parent(&self, component: &ComponentId) -> Option<&ComponentId> {
        self.nodes.get(component)?.parent.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn scope(&self, component: &ComponentId) -> Option<&ScopeId> {
        self.nodes.get(component)?.scope.as_ref()
    }

    #[must_use]
    pub fn children(&self, component: &ComponentId) -> &[ComponentId] {
        self.nodes.get(component).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    /// Distance from the root, `0` for the root itself.
    #[inline]
    #[must_use]
    pub fn depth(&self, component: &ComponentId) -> Option<usize> {
        self.nodes.get(component).map(|node| node.depth)
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors<'a>(&'a self, component: &ComponentId) -> impl Iterator<Item = &'a ComponentId> + 'a {
        iter::successors(self.parent(component), |id| self.parent(id))
    }

    /// The component itself followed by its ancestors.
    pub fn lineage<'a>(&'a self, component: &ComponentId) -> impl Iterator<Item = &'a ComponentId> + 'a {
        iter::successors(self.nodes.get_key_value(component).map(|(id, _)| id), |id| self.parent(id))
    }

    /// Every component below `component`, parents before their children.
    #[must_use]
    pub fn descendants(&self, component: &ComponentId) -> Vec<ComponentId> {
        let mut descendants = Vec::new();
        let mut queue: VecDeque<_> = self.children(component).iter().collect();
        while let Some(child) = queue.pop_front() {
            queue.extend(self.children(child));
            descendants.push(child.clone());
        }
        descendants
    }

    /// Components of the tree in id order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentId> {
        self.nodes.keys()
    }
}

/// Components connected to `entry_point` through contribution edges, followed in either direction.
fn reachable_from<'a>(index: &ContributionIndex<'a>, entry_point: &ComponentId) -> BTreeSet<&'a ComponentId> {
    let mut edges: BTreeMap<&ComponentId, Vec<&ComponentId>> = BTreeMap::new();
    for (component, contributions) in index.iter() {
        for unit in contributions {
            if let ContributionUnit::Component(child) = *unit {
                edges.entry(component).or_default().push(child);
                edges.entry(child).or_default().push(component);
            }
        }
    }

    let mut reachable = BTreeSet::new();
    let Some(entry_point) = index.component(entry_point).map(|decl| &decl.id) else {
        return reachable;
    };
    let mut queue = VecDeque::from([entry_point]);
    while let Some(component) = queue.pop_front() {
        if !reachable.insert(component) {
            continue;
        }
        if let Some(neighbours) = edges.get(component) {
            queue.extend(neighbours.iter().copied());
        }
    }
    reachable
}
