//! Dependency nodes and the arena that owns them.
//!
//! Parent/child relations are stored as handle lists on both ends. Every
//! mutation goes through [`DependencyGraph`] so the two lists stay mirror
//! images of each other: `c ∈ p.children ⇔ p ∈ c.parents`.

use std::fmt;
use std::str::FromStr;

use lnprune_ir::{Arena, Handle, NodeId};

/// How a node propagates a change in channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Owns a prunable weight tensor.
    Weight,
    /// Output channels equal input channels.
    Passthrough,
    /// Partitions input channels across several outputs.
    Split,
    /// Concatenates the channels of several inputs.
    Concat,
    /// Element-wise combination of same-shaped inputs.
    Combine,
    /// No channel semantics; removed by the collapse pass.
    Ignore,
    /// Convolution with more than one channel group.
    Grouped,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        Self::Weight,
        Self::Passthrough,
        Self::Split,
        Self::Concat,
        Self::Combine,
        Self::Ignore,
        Self::Grouped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weight => "WEIGHT",
            Self::Passthrough => "PASSTHROUGH",
            Self::Split => "SPLIT",
            Self::Concat => "CONCAT",
            Self::Combine => "COMBINE",
            Self::Ignore => "IGNORE",
            Self::Grouped => "GROUPED",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown node type names.
#[derive(Debug, thiserror::Error)]
#[error("unknown node type '{0}' (expected weight, passthrough, split, concat, combine, ignore or grouped)")]
pub struct ParseNodeTypeError(pub String);

impl FromStr for NodeType {
    type Err = ParseNodeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNodeTypeError(s.to_string()))
    }
}

/// Handle of a [`DependencyNode`] inside a [`DependencyGraph`].
pub type NodeHandle<H> = Handle<DependencyNode<H>>;

/// One exported operation retained in the dependency graph.
#[derive(Clone, Debug)]
pub struct DependencyNode<H> {
    pub node_type: NodeType,
    /// Owning trainable module, once bound.
    pub module: Option<H>,
    /// Dot-path of the owning module, when the operation reads a named weight.
    pub name: Option<String>,
    /// The exported operation this node stands for.
    pub source: NodeId,
    /// Exported node label.
    pub label: String,
    /// Operator kind, as displayed.
    pub op: String,
    /// Output channel count of a bound weight.
    pub out_channels: Option<u64>,
    /// Number of data inputs of a CONCAT operation. Channel ranges are only
    /// derived while every input is still matched by a parent.
    pub input_slots: Option<usize>,
    parents: Vec<NodeHandle<H>>,
    children: Vec<NodeHandle<H>>,
}

impl<H> DependencyNode<H> {
    pub fn new(node_type: NodeType, source: NodeId, label: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            node_type,
            module: None,
            name: None,
            source,
            label: label.into(),
            op: op.into(),
            out_channels: None,
            input_slots: None,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn parents(&self) -> &[NodeHandle<H>] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeHandle<H>] {
        &self.children
    }
}

impl<H> fmt::Display for DependencyNode<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {name}", self.node_type),
            None => write!(f, "{} {} ({})", self.node_type, self.label, self.op),
        }
    }
}

/// Arena owning every dependency node of one build.
#[derive(Clone, Debug)]
pub struct DependencyGraph<H> {
    nodes: Arena<DependencyNode<H>>,
}

impl<H> Default for DependencyGraph<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> DependencyGraph<H> {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, node: DependencyNode<H>) -> NodeHandle<H> {
        self.nodes.append(node)
    }

    pub fn contains(&self, node: NodeHandle<H>) -> bool {
        self.nodes.contains(node)
    }

    pub fn get(&self, node: NodeHandle<H>) -> Option<&DependencyNode<H>> {
        self.nodes.try_get(node)
    }

    /// Live nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle<H>, &DependencyNode<H>)> {
        self.nodes.iter()
    }

    pub fn handles(&self) -> Vec<NodeHandle<H>> {
        self.nodes.handles().collect()
    }

    /// Adds the edge `parent → child` on both ends. Returns `false` if it
    /// already existed.
    pub fn link(&mut self, parent: NodeHandle<H>, child: NodeHandle<H>) -> bool {
        assert_ne!(parent, child, "self-edge on dependency node {parent:?}");
        if self.nodes[parent].children.contains(&child) {
            return false;
        }
        self.nodes[parent].children.push(child);
        self.nodes[child].parents.push(parent);
        true
    }

    /// Removes the edge `parent → child` on both ends.
    pub fn unlink(&mut self, parent: NodeHandle<H>, child: NodeHandle<H>) {
        self.nodes[parent].children.retain(|&c| c != child);
        self.nodes[child].parents.retain(|&p| p != parent);
    }

    /// Replaces the parent list of `node` with `parents`, in order. A parent
    /// may be listed more than once (a CONCAT reading one tensor twice);
    /// its child list then holds `node` as many times, where the first
    /// occurrence was.
    pub fn relink_parents(&mut self, node: NodeHandle<H>, parents: Vec<NodeHandle<H>>) {
        let mut affected = std::mem::take(&mut self.nodes[node].parents);
        affected.extend_from_slice(&parents);
        affected.sort();
        affected.dedup();
        for p in affected {
            assert_ne!(p, node, "self-edge on dependency node {node:?}");
            let count = parents.iter().filter(|&&x| x == p).count();
            let children = &mut self.nodes[p].children;
            let pos = children
                .iter()
                .position(|&c| c == node)
                .unwrap_or(children.len());
            children.retain(|&c| c != node);
            children.splice(pos..pos, std::iter::repeat_n(node, count));
        }
        self.nodes[node].parents = parents;
    }

    /// Removes `node`, wiring each of its parents directly to each of its
    /// children. In every parent's child list the node is replaced in place
    /// by its own children (in order), and symmetrically in every child's
    /// parent list. Edges that already exist are not duplicated, except
    /// into a CONCAT: each of its inputs keeps its own parent.
    pub fn splice(&mut self, node: NodeHandle<H>) -> Option<DependencyNode<H>> {
        let removed = self.nodes.remove(node)?;

        let concats: Vec<_> = removed
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].node_type == NodeType::Concat)
            .collect();
        for &p in &removed.parents {
            let list = &mut self.nodes[p].children;
            replace_in_place(list, node, &removed.children, |c| concats.contains(&c));
        }
        for &c in &removed.children {
            let repeatable = self.nodes[c].node_type == NodeType::Concat;
            let list = &mut self.nodes[c].parents;
            replace_in_place(list, node, &removed.parents, |_| repeatable);
        }
        Some(removed)
    }

    /// Sorts every parent list by `parent_key` and every child list by
    /// `child_key`; both keys receive `(node, neighbour)`.
    pub fn sort_edges<K: Ord>(
        &mut self,
        mut parent_key: impl FnMut(&DependencyNode<H>, &DependencyNode<H>) -> K,
        mut child_key: impl FnMut(&DependencyNode<H>, &DependencyNode<H>) -> K,
    ) {
        for h in self.handles() {
            let mut parents = std::mem::take(&mut self.nodes[h].parents);
            parents.sort_by_cached_key(|&p| parent_key(&self.nodes[h], &self.nodes[p]));
            self.nodes[h].parents = parents;

            let mut children = std::mem::take(&mut self.nodes[h].children);
            children.sort_by_cached_key(|&c| child_key(&self.nodes[h], &self.nodes[c]));
            self.nodes[h].children = children;
        }
    }

    /// Finds the first edge not listed equally often on both ends, if any.
    pub fn asymmetric_edge(&self) -> Option<(NodeHandle<H>, NodeHandle<H>)> {
        for (h, node) in self.nodes.iter() {
            for &c in &node.children {
                let mirrored = self.nodes.try_get(c).map(|child| occurrences(&child.parents, h));
                if mirrored != Some(occurrences(&node.children, c)) {
                    return Some((h, c));
                }
            }
            for &p in &node.parents {
                let mirrored = self.nodes.try_get(p).map(|parent| occurrences(&parent.children, h));
                if mirrored != Some(occurrences(&node.parents, p)) {
                    return Some((p, h));
                }
            }
        }
        None
    }
}

impl<H> std::ops::Index<NodeHandle<H>> for DependencyGraph<H> {
    type Output = DependencyNode<H>;

    fn index(&self, node: NodeHandle<H>) -> &DependencyNode<H> {
        &self.nodes[node]
    }
}

impl<H> std::ops::IndexMut<NodeHandle<H>> for DependencyGraph<H> {
    fn index_mut(&mut self, node: NodeHandle<H>) -> &mut DependencyNode<H> {
        &mut self.nodes[node]
    }
}

/// Replaces the first `target` in `list` with the members of `with` that are
/// not already present or are `repeatable`.
fn replace_in_place<T: Copy + PartialEq>(
    list: &mut Vec<T>,
    target: T,
    with: &[T],
    repeatable: impl Fn(T) -> bool,
) {
    let Some(pos) = list.iter().position(|&x| x == target) else {
        return;
    };
    let fresh: Vec<T> = with
        .iter()
        .copied()
        .filter(|&x| repeatable(x) || !list.contains(&x))
        .collect();
    list.splice(pos..=pos, fresh);
}

fn occurrences<T: PartialEq>(list: &[T], item: T) -> usize {
    list.iter().filter(|&x| *x == item).count()
}
