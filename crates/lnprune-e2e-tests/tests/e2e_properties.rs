//! Property tests over randomly shaped graphs.

mod common;

use std::collections::HashSet;

use common::{OnnxBuilder, build_map};
use lnprune_dependency::{
    BuildOptions, DependencyGraph, DependencyNode, NodeHandle, NodeType, collapse,
};
use lnprune_ir::NodeId;
use proptest::prelude::*;
use proptest::sample::Index;

type Graph = DependencyGraph<()>;

/// Random DAG: node `i` takes edges only from nodes `< i`.
fn dependency_graph(types: &[usize], edges: &[(Index, Index)]) -> (Graph, Vec<NodeHandle<()>>) {
    let mut graph = Graph::new();
    let nodes: Vec<_> = types
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let ty = NodeType::ALL[t % NodeType::ALL.len()];
            graph.add(DependencyNode::new(ty, NodeId(i as u32), format!("n{i}"), "Op"))
        })
        .collect();
    for (a, b) in edges {
        let child = 1 + b.index(nodes.len() - 1);
        let parent = a.index(child);
        graph.link(nodes[parent], nodes[child]);
    }
    (graph, nodes)
}

fn reachable(graph: &Graph, from: NodeHandle<()>) -> HashSet<NodeHandle<()>> {
    let mut seen = HashSet::new();
    let mut stack = graph[from].children().to_vec();
    while let Some(h) = stack.pop() {
        if seen.insert(h) {
            stack.extend_from_slice(graph[h].children());
        }
    }
    seen
}

proptest! {
    #[test]
    fn collapse_keeps_reachability(
        types in prop::collection::vec(0usize..7, 2..24),
        edges in prop::collection::vec(any::<(Index, Index)>(), 0..48),
    ) {
        let (mut graph, nodes) = dependency_graph(&types, &edges);
        let kept: Vec<_> = nodes
            .iter()
            .copied()
            .filter(|&h| graph[h].node_type != NodeType::Ignore)
            .collect();
        let before: Vec<HashSet<_>> = kept
            .iter()
            .map(|&h| {
                reachable(&graph, h)
                    .into_iter()
                    .filter(|&r| graph[r].node_type != NodeType::Ignore)
                    .collect()
            })
            .collect();

        let removed = collapse(&mut graph);

        prop_assert_eq!(removed, nodes.len() - kept.len());
        prop_assert_eq!(graph.len(), kept.len());
        prop_assert!(graph.iter().all(|(_, n)| n.node_type != NodeType::Ignore));
        prop_assert!(graph.asymmetric_edge().is_none());
        for (h, expected) in kept.iter().zip(&before) {
            prop_assert_eq!(&reachable(&graph, *h), expected);
        }
    }

    #[test]
    fn random_networks_build_well_formed_maps(
        ops in prop::collection::vec((0usize..8, any::<Index>(), any::<Index>()), 1..24),
    ) {
        let mut fixture = OnnxBuilder::new("random").input("x");
        let mut tensors = vec!["x".to_string()];
        for (i, (op, a, b)) in ops.iter().enumerate() {
            let lhs = tensors[a.index(tensors.len())].clone();
            let rhs = tensors[b.index(tensors.len())].clone();
            let out = format!("t{i}");
            let module = format!("m{i}");
            fixture = match op {
                0 | 1 => fixture.conv(&module, &lhs, &out, (4, 4), 1),
                2 => fixture.conv(&module, &lhs, &out, (4, 4), 2),
                3 => fixture.node("Relu", &[&lhs], &[&out]),
                4 => fixture.node("MaxPool", &[&lhs], &[&out]),
                5 => fixture.node("Add", &[&lhs, &rhs], &[&out]),
                6 => fixture.node("Concat", &[&lhs, &rhs], &[&out]),
                _ => fixture.node("Unsqueeze", &[&lhs], &[&out]),
            };
            tensors.push(out);
        }
        let last = tensors.last().cloned().unwrap_or_default();
        let graph = fixture.output(&last).graph();

        let map = build_map(&graph, &BuildOptions::default());

        prop_assert!(map.graph().asymmetric_edge().is_none());
        prop_assert!(map.graph().iter().all(|(_, n)| n.node_type != NodeType::Ignore));
        for (name, root) in map.iter() {
            let node = map.node(root);
            prop_assert_eq!(node.node_type, NodeType::Weight);
            prop_assert_eq!(node.name.as_deref(), Some(name));
            let first = map.traverse(name).and_then(|mut walk| walk.next());
            prop_assert_eq!(first.map(|v| (v.depth, v.node)), Some((0, root)));
        }
    }
}
