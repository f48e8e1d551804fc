//! The finished dependency map.

use std::collections::HashMap;
use std::ops::Range;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::node::{DependencyGraph, DependencyNode, NodeHandle, NodeType};
use crate::traverse::DepthFirst;

/// Prunable weight name → root node, over one shared [`DependencyGraph`].
///
/// Entries keep the order in which their convolutions appear in the
/// exported graph.
#[derive(Clone, Debug)]
pub struct DependencyMap<H> {
    entries: Vec<(String, NodeHandle<H>)>,
    graph: DependencyGraph<H>,
    diagnostics: Vec<Diagnostic>,
}

impl<H> DependencyMap<H> {
    pub(crate) fn new(
        entries: Vec<(String, NodeHandle<H>)>,
        graph: DependencyGraph<H>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            entries,
            graph,
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Root node of the entry for weight `name`.
    pub fn get(&self, name: &str) -> Option<NodeHandle<H>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|&(_, root)| root)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Entry names in map order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// `(name, root)` pairs in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeHandle<H>)> {
        self.entries.iter().map(|(key, root)| (key.as_str(), *root))
    }

    /// The graph every entry lives in.
    pub fn graph(&self) -> &DependencyGraph<H> {
        &self.graph
    }

    pub fn node(&self, node: NodeHandle<H>) -> &DependencyNode<H> {
        &self.graph[node]
    }

    /// Diagnostics recorded while building, in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics of one kind.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// Depth-first walk of entry `name`.
    pub fn traverse(&self, name: &str) -> Option<DepthFirst<'_, H>> {
        self.get(name).map(|root| DepthFirst::new(&self.graph, root))
    }

    /// Channel count flowing out of `node`, when it can be derived: a
    /// weight's output channels, the sum of a concat's inputs, or the count
    /// of the first resolvable parent for channel-preserving nodes.
    pub fn channels(&self, node: NodeHandle<H>) -> Option<u64> {
        self.channels_memo(node, &mut HashMap::new())
    }

    fn channels_memo(
        &self,
        node: NodeHandle<H>,
        memo: &mut HashMap<NodeHandle<H>, Option<u64>>,
    ) -> Option<u64> {
        if let Some(&known) = memo.get(&node) {
            return known;
        }
        // provisional entry, so a cycle in a hand-built graph ends here
        memo.insert(node, None);
        let n = self.graph.get(node)?;
        let channels = match n.node_type {
            NodeType::Weight | NodeType::Grouped => n.out_channels,
            NodeType::Concat if inputs_complete(n) => n
                .parents()
                .iter()
                .map(|&p| self.channels_memo(p, memo))
                .sum::<Option<u64>>(),
            NodeType::Passthrough | NodeType::Combine => n
                .parents()
                .iter()
                .find_map(|&p| self.channels_memo(p, memo)),
            NodeType::Concat | NodeType::Split | NodeType::Ignore => None,
        };
        memo.insert(node, channels);
        channels
    }

    /// Channel range each parent of a CONCAT node occupies in its output,
    /// in input order. A parent feeding several inputs appears once per
    /// input. `None` for other node types, unknown widths, or inputs that
    /// lost their producer (constants collapsed away).
    pub fn concat_ranges(&self, node: NodeHandle<H>) -> Option<Vec<(NodeHandle<H>, Range<u64>)>> {
        let n = self.graph.get(node)?;
        if n.node_type != NodeType::Concat || !inputs_complete(n) {
            return None;
        }
        let mut memo = HashMap::new();
        let mut offset = 0;
        let mut ranges = Vec::with_capacity(n.parents().len());
        for &p in n.parents() {
            let width = self.channels_memo(p, &mut memo)?;
            ranges.push((p, offset..offset + width));
            offset += width;
        }
        Some(ranges)
    }
}

/// Whether every input of a CONCAT still has exactly one parent.
fn inputs_complete<H>(node: &DependencyNode<H>) -> bool {
    node.input_slots
        .is_none_or(|slots| slots == node.parents().len())
}
