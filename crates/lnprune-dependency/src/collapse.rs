//! Removal of IGNORE nodes.

use crate::node::{DependencyGraph, NodeType};

/// Splices every [`NodeType::Ignore`] node out of `graph`, wiring its
/// parents directly to its children. Returns the number of nodes removed.
pub fn collapse<H>(graph: &mut DependencyGraph<H>) -> usize {
    let ignored: Vec<_> = graph
        .iter()
        .filter(|(_, node)| node.node_type == NodeType::Ignore)
        .map(|(h, _)| h)
        .collect();

    let mut removed = 0;
    for h in ignored {
        if let Some(node) = graph.splice(h) {
            log::trace!("collapsed {node}");
            removed += 1;
        }
    }
    log::debug!("collapse removed {removed} ignored node(s)");
    removed
}
