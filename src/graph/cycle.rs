use alloc::{collections::BTreeMap, vec::Vec};
use tracing::{debug, error};

use super::{DependencyNode, Graph};
use crate::{
    errors::GraphErrorKind,
    key::{ComponentId, DependencyKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    InProgress,
    Done,
}

type NodeId<'g> = (&'g ComponentId, &'g DependencyKey);

/// Depth-first search over the construction edges of every node.
///
/// A dependency is followed to the node visible from the dependent's host, so edges may cross
/// into ancestors. Provider requests and assisted parameters aren't edges. Every cycle found
/// is pushed onto `errors` as the path slice from the revisited node, in discovery order.
pub(crate) fn detect_cycles(graph: &Graph, errors: &mut Vec<GraphErrorKind>) {
    let mut colors = BTreeMap::new();
    let mut path = Vec::new();
    let before = errors.len();

    for node in graph.iter() {
        visit(graph, node, &mut colors, &mut path, errors);
    }

    debug!(nodes = colors.len(), cycles = errors.len() - before, "Cycle detection finished");
}

fn visit<'g>(
    graph: &'g Graph,
    node: &'g DependencyNode,
    colors: &mut BTreeMap<NodeId<'g>, Color>,
    path: &mut Vec<&'g DependencyNode>,
    errors: &mut Vec<GraphErrorKind>,
) {
    let id = (&node.host_component, &node.key);
    match colors.get(&id) {
        Some(Color::Done) => return,
        Some(Color::InProgress) => {
            if let Some(start) = path
                .iter()
                .rposition(|visited| (&visited.host_component, &visited.key) == id)
            {
                let err = GraphErrorKind::CyclicDependency {
                    cycle: path[start..].iter().map(|visited| visited.key.clone()).collect(),
                };
                error!("{}", err);
                errors.push(err);
            }
            return;
        }
        None => {}
    }

    colors.insert(id, Color::InProgress);
    path.push(node);

    for dependency in &node.dependencies {
        if let Some(target) = graph.resolve(&node.host_component, dependency) {
            visit(graph, target, colors, path, errors);
        }
    }

    path.pop();
    colors.insert(id, Color::Done);
}
