//! Depth-first traversal of dependency entries.
//!
//! The walk is a pre-order over parent→child edges starting at an entry
//! root. Nodes reachable along several paths are visited once per path.
//! WEIGHT (and GROUPED) nodes below the root are yielded as leaves: their
//! own children belong to their own entries.

use crate::node::{DependencyGraph, DependencyNode, NodeHandle, NodeType};

/// One step of a depth-first walk.
#[derive(Debug, PartialEq, Eq)]
pub struct Visit<H> {
    /// Distance from the entry root along the current path.
    pub depth: usize,
    pub node: NodeHandle<H>,
    /// Whether this node is the final child of the parent it was reached
    /// from. Always `true` for the root.
    pub last: bool,
}

impl<H> Clone for Visit<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for Visit<H> {}

/// Lazy pre-order iterator, see [`DepthFirst::new`].
pub struct DepthFirst<'a, H> {
    graph: &'a DependencyGraph<H>,
    stack: Vec<Visit<H>>,
}

impl<'a, H> DepthFirst<'a, H> {
    pub fn new(graph: &'a DependencyGraph<H>, root: NodeHandle<H>) -> Self {
        let stack = if graph.contains(root) {
            vec![Visit {
                depth: 0,
                node: root,
                last: true,
            }]
        } else {
            Vec::new()
        };
        Self { graph, stack }
    }
}

fn descends<H>(node: &DependencyNode<H>, depth: usize) -> bool {
    depth == 0 || !matches!(node.node_type, NodeType::Weight | NodeType::Grouped)
}

impl<H> Iterator for DepthFirst<'_, H> {
    type Item = Visit<H>;

    fn next(&mut self) -> Option<Visit<H>> {
        let visit = self.stack.pop()?;
        let node = &self.graph[visit.node];
        if descends(node, visit.depth) {
            let children = node.children();
            for (i, &child) in children.iter().enumerate().rev() {
                self.stack.push(Visit {
                    depth: visit.depth + 1,
                    node: child,
                    last: i + 1 == children.len(),
                });
            }
        }
        Some(visit)
    }
}

/// `(depth, node)` pairs of a depth-first walk from `root`.
pub fn traverse_depth_first<H>(
    graph: &DependencyGraph<H>,
    root: NodeHandle<H>,
) -> impl Iterator<Item = (usize, NodeHandle<H>)> + '_ {
    DepthFirst::new(graph, root).map(|v| (v.depth, v.node))
}
