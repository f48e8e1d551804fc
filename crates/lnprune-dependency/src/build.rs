//! Dependency-map construction.
//!
//! A build runs in sequential passes over one exported graph:
//!
//! 1. root discovery: every convolution reading an un-produced `*.weight`
//!    tensor becomes a candidate entry, keyed by the weight's module path;
//! 2. growth: for each root, the exported graph is walked forward through
//!    channel-preserving operators and backward from CONCAT/COMBINE nodes.
//!    Growth is planned first and committed only when nothing forced the
//!    root to be abandoned;
//! 3. edge ordering (one CONCAT parent per input), module binding,
//!    collapse of IGNORE nodes;
//! 4. dropping entries whose weight nodes could not be bound.
//!
//! Every exported node is materialized at most once; entries share nodes
//! by reference.

use std::collections::{HashMap, HashSet, VecDeque};

use lnprune_ir::{ExportedGraph, ExportedNode, Exporter, NodeId, TensorIndex};
use lnprune_model::ModelTree;

use crate::classify::{Classification, Classifier, is_shape_query, op_key};
use crate::collapse::collapse;
use crate::diagnostic::{DiagnosticKind, DiagnosticLevel, Diagnostics};
use crate::error::BuildError;
use crate::map::DependencyMap;
use crate::node::{DependencyGraph, DependencyNode, NodeHandle, NodeType};
use crate::traverse::DepthFirst;

const WEIGHT_SUFFIX: &str = ".weight";

/// Configuration of a build.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub classifier: Classifier,
}

impl BuildOptions {
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Exports `model` for `input_shape` and builds its dependency map.
///
/// Export failures and structurally broken graphs (cycles, tensors with two
/// producers) are fatal. Problems local to one root only remove that entry
/// and are reported through [`DependencyMap::diagnostics`].
pub fn build<M, E>(
    model: &M,
    exporter: &E,
    input_shape: &[usize],
    options: &BuildOptions,
) -> Result<DependencyMap<M::Handle>, BuildError>
where
    M: ModelTree,
    E: Exporter + ?Sized,
{
    log::info!("exporting model for input shape {input_shape:?}");
    let graph = exporter.export_graph(input_shape)?;
    build_from_graph(model, &graph, options)
}

/// Builds the dependency map of an already exported graph.
pub fn build_from_graph<M: ModelTree>(
    model: &M,
    graph: &ExportedGraph,
    options: &BuildOptions,
) -> Result<DependencyMap<M::Handle>, BuildError> {
    let index = graph.index()?;
    log::debug!(
        "graph '{}': {} nodes, {} initializers",
        graph.name,
        graph.nodes.len(),
        graph.initializers.len()
    );

    let mut builder = Builder::new(model, graph, &index, &options.classifier);
    let mut entries = Vec::new();
    for (name, root) in builder.roots() {
        if let Some(handle) = builder.grow(&name, root) {
            entries.push((name, handle));
        }
    }
    builder.sort_edges();
    builder.repeat_concat_inputs();
    builder.bind();
    collapse(&mut builder.deps);
    builder.retain_bound(&mut entries);

    log::info!(
        "dependency map: {} entries over {} nodes",
        entries.len(),
        builder.deps.len()
    );
    Ok(DependencyMap::new(
        entries,
        builder.deps,
        builder.diagnostics.into_vec(),
    ))
}

/// The first input of `node` holding a `.weight` tensor.
fn weight_input(node: &ExportedNode) -> Option<&str> {
    node.data_inputs()
        .find(|i| i.len() > WEIGHT_SUFFIX.len() && i.ends_with(WEIGHT_SUFFIX))
}

/// Module path of the weight `node` reads: `layers.0.conv` for an input
/// named `layers.0.conv.weight`.
pub fn weight_name(node: &ExportedNode) -> Option<&str> {
    weight_input(node)?.strip_suffix(WEIGHT_SUFFIX)
}

/// Position of the first input of `consumer` produced by `producer`.
fn input_position(consumer: &ExportedNode, producer: &ExportedNode) -> usize {
    consumer
        .inputs
        .iter()
        .position(|i| !i.is_empty() && producer.outputs.contains(i))
        .unwrap_or(usize::MAX)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Walk {
    /// Follow consumers: their input channels are the current node's output channels.
    Forward,
    /// Follow producers of a CONCAT/COMBINE input. `tied` when the producer's
    /// output channels must match the root's.
    Backward { tied: bool },
}

/// Why a root cannot be pruned.
enum Abandon {
    Grouped(NodeId),
    GeneratesOutput(NodeId),
    ConsumesInput(NodeId),
}

/// Nodes and edges discovered for one root, not yet in the arena.
#[derive(Default)]
struct Plan {
    nodes: Vec<NodeId>,
    position: HashMap<NodeId, usize>,
    edges: Vec<(usize, usize)>,
    edge_set: HashSet<(usize, usize)>,
}

impl Plan {
    fn touch(&mut self, id: NodeId) -> usize {
        *self.position.entry(id).or_insert_with(|| {
            self.nodes.push(id);
            self.nodes.len() - 1
        })
    }

    fn edge(&mut self, parent: NodeId, child: NodeId) {
        let edge = (self.touch(parent), self.touch(child));
        if self.edge_set.insert(edge) {
            self.edges.push(edge);
        }
    }
}

struct Builder<'a, M: ModelTree> {
    model: &'a M,
    graph: &'a ExportedGraph,
    index: &'a TensorIndex,
    classifier: &'a Classifier,
    classes: HashMap<NodeId, Classification>,
    materialized: HashMap<NodeId, NodeHandle<M::Handle>>,
    dangling: HashSet<&'a str>,
    deps: DependencyGraph<M::Handle>,
    diagnostics: Diagnostics,
}

impl<'a, M: ModelTree> Builder<'a, M> {
    fn new(
        model: &'a M,
        graph: &'a ExportedGraph,
        index: &'a TensorIndex,
        classifier: &'a Classifier,
    ) -> Self {
        Self {
            model,
            graph,
            index,
            classifier,
            classes: HashMap::new(),
            materialized: HashMap::new(),
            dangling: HashSet::new(),
            deps: DependencyGraph::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Candidate entries in graph order. Weights read by several
    /// convolutions are dropped.
    fn roots(&mut self) -> Vec<(String, NodeId)> {
        let graph = self.graph;
        let mut found: Vec<(String, NodeId)> = Vec::new();
        for (id, node) in graph.iter() {
            if !node.op().is_convolution() {
                continue;
            }
            let Some(weight) = weight_input(node) else {
                self.diagnostics.emit(
                    DiagnosticLevel::Debug,
                    DiagnosticKind::MissingWeightName,
                    node.label(),
                    "convolution has no named weight input",
                );
                continue;
            };
            if self.index.producer(weight).is_some() {
                log::debug!("{}: weight '{weight}' is computed in-graph", node.label());
                continue;
            }
            if let Some(name) = weight_name(node) {
                found.push((name.to_string(), id));
            }
        }

        let mut uses: HashMap<String, usize> = HashMap::new();
        for (name, _) in &found {
            *uses.entry(name.clone()).or_default() += 1;
        }
        let mut reported = HashSet::new();
        found.retain(|(name, _)| {
            let count = uses.get(name).copied().unwrap_or(0);
            if count <= 1 {
                return true;
            }
            if reported.insert(name.clone()) {
                self.diagnostics.emit(
                    DiagnosticLevel::Warning,
                    DiagnosticKind::SharedWeight,
                    name.clone(),
                    format!("weight is shared by {count} convolutions"),
                );
            }
            false
        });
        found
    }

    fn node_type(&mut self, id: NodeId) -> NodeType {
        if let Some(class) = self.classes.get(&id) {
            return class.node_type;
        }
        let graph = self.graph;
        let node = graph.node(id);
        let class = self.classifier.classify(node, self.groups(node));
        if class.is_unsupported() {
            self.diagnostics.emit(
                DiagnosticLevel::Info,
                DiagnosticKind::UnsupportedOperator,
                node.label(),
                format!("unsupported operator '{}' treated as IGNORE", op_key(node)),
            );
        }
        self.classes.insert(id, class);
        class.node_type
    }

    /// Channel groups of a convolution: the owning module's, or what the
    /// exported graph states when the module is unknown.
    fn groups(&self, node: &ExportedNode) -> i64 {
        if !node.op().is_convolution() {
            return 1;
        }
        weight_name(node)
            .and_then(|name| self.model.resolve(name))
            .map(|module| i64::from(self.model.channel_groups(module)))
            .or_else(|| self.graph.convolution_groups(self.index, node))
            .unwrap_or(1)
    }

    fn grow(&mut self, name: &str, root: NodeId) -> Option<NodeHandle<M::Handle>> {
        let Some(module) = self.model.resolve(name) else {
            self.diagnostics.emit(
                DiagnosticLevel::Info,
                DiagnosticKind::UnresolvedModule,
                name,
                "no module at this path; root skipped",
            );
            return None;
        };
        match self.node_type(root) {
            NodeType::Weight => {}
            NodeType::Grouped => {
                self.diagnostics.emit(
                    DiagnosticLevel::Info,
                    DiagnosticKind::GroupedConvolution,
                    name,
                    format!(
                        "cannot prune grouped convolution (groups = {})",
                        self.model.channel_groups(module)
                    ),
                );
                return None;
            }
            other => {
                log::debug!("{name}: classified as {other}, not a root");
                return None;
            }
        }

        let graph = self.graph;
        match self.plan(root) {
            Ok(plan) => {
                log::debug!(
                    "{name}: {} node(s), {} edge(s)",
                    plan.nodes.len(),
                    plan.edges.len()
                );
                Some(self.commit(plan))
            }
            Err(Abandon::Grouped(id)) => {
                self.diagnostics.emit(
                    DiagnosticLevel::Info,
                    DiagnosticKind::GroupedConvolution,
                    name,
                    format!(
                        "cannot prune grouped convolution '{}' depending on this weight",
                        graph.node(id).label()
                    ),
                );
                None
            }
            Err(Abandon::GeneratesOutput(id)) => {
                self.diagnostics.emit(
                    DiagnosticLevel::Info,
                    DiagnosticKind::GeneratesOutput,
                    name,
                    format!("generates output through '{}'", graph.node(id).label()),
                );
                None
            }
            Err(Abandon::ConsumesInput(id)) => {
                self.diagnostics.emit(
                    DiagnosticLevel::Info,
                    DiagnosticKind::ConsumesInput,
                    name,
                    format!(
                        "channels tied to a graph input through '{}'",
                        graph.node(id).label()
                    ),
                );
                None
            }
        }
    }

    fn plan(&mut self, root: NodeId) -> Result<Plan, Abandon> {
        let graph = self.graph;
        let index = self.index;
        let mut plan = Plan::default();
        plan.touch(root);

        let mut queue = VecDeque::from([(root, Walk::Forward)]);
        let mut expanded = HashSet::new();
        while let Some((id, walk)) = queue.pop_front() {
            if !expanded.insert((id, walk)) {
                continue;
            }
            let node = graph.node(id);
            match walk {
                Walk::Forward => {
                    if is_shape_query(&node.op()) {
                        continue;
                    }
                    for out in node.outputs.iter().filter(|o| !o.is_empty()) {
                        if index.is_output(out) {
                            return Err(Abandon::GeneratesOutput(id));
                        }
                        for &consumer in index.consumers(out) {
                            plan.edge(id, consumer);
                            match self.node_type(consumer) {
                                NodeType::Weight => {}
                                NodeType::Grouped => return Err(Abandon::Grouped(consumer)),
                                NodeType::Concat => {
                                    queue.push_back((consumer, Walk::Forward));
                                    queue.push_back((consumer, Walk::Backward { tied: false }));
                                }
                                NodeType::Combine => {
                                    queue.push_back((consumer, Walk::Forward));
                                    queue.push_back((consumer, Walk::Backward { tied: true }));
                                }
                                _ => queue.push_back((consumer, Walk::Forward)),
                            }
                        }
                    }
                }
                Walk::Backward { tied } => {
                    for input in node.data_inputs() {
                        let Some(producer) = index.producer(input) else {
                            if tied && index.is_graph_input(input) {
                                return Err(Abandon::ConsumesInput(id));
                            }
                            if !index.is_parameter(input) {
                                self.report_dangling(input, node);
                            }
                            continue;
                        };
                        plan.edge(producer, id);
                        match self.node_type(producer) {
                            NodeType::Weight => {}
                            NodeType::Grouped if tied => return Err(Abandon::Grouped(producer)),
                            NodeType::Grouped => {}
                            ty => {
                                let tied_further = tied && ty != NodeType::Concat;
                                queue.push_back((producer, Walk::Backward { tied: tied_further }));
                                if tied {
                                    queue.push_back((producer, Walk::Forward));
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(plan)
    }

    fn report_dangling(&mut self, tensor: &'a str, consumer: &ExportedNode) {
        if self.dangling.insert(tensor) {
            self.diagnostics.emit(
                DiagnosticLevel::Debug,
                DiagnosticKind::DanglingTensor,
                tensor,
                format!("read by '{}' but never produced; path skipped", consumer.label()),
            );
        }
    }

    /// Materializes a planned root and returns its handle.
    fn commit(&mut self, plan: Plan) -> NodeHandle<M::Handle> {
        let handles: Vec<_> = plan.nodes.iter().map(|&id| self.materialize(id)).collect();
        for &(parent, child) in &plan.edges {
            self.deps.link(handles[parent], handles[child]);
        }
        handles[0]
    }

    fn materialize(&mut self, id: NodeId) -> NodeHandle<M::Handle> {
        if let Some(&handle) = self.materialized.get(&id) {
            return handle;
        }
        let graph = self.graph;
        let node = graph.node(id);
        let node_type = self.node_type(id);
        let mut dep = DependencyNode::new(node_type, id, node.label(), op_key(node))
            .with_name(weight_name(node).map(str::to_string));
        if node_type == NodeType::Concat {
            dep.input_slots = Some(node.data_inputs().count());
        }
        let handle = self.deps.add(dep);
        self.materialized.insert(id, handle);
        handle
    }

    /// Orders parents by the consuming operator's input position and
    /// children by exported node order.
    fn sort_edges(&mut self) {
        let graph = self.graph;
        self.deps.sort_edges(
            |node, parent| input_position(graph.node(node.source), graph.node(parent.source)),
            |_, child| child.source.index(),
        );
    }

    /// Gives every CONCAT one parent per input, so a tensor concatenated
    /// twice contributes two channel ranges. Runs after [`Self::sort_edges`],
    /// which cannot order repeated parents.
    fn repeat_concat_inputs(&mut self) {
        let graph = self.graph;
        for h in self.deps.handles() {
            let node = &self.deps[h];
            if node.node_type != NodeType::Concat {
                continue;
            }
            let linked = node.parents();
            let slots: Vec<_> = graph
                .node(node.source)
                .data_inputs()
                .filter_map(|input| self.index.producer(input))
                .filter_map(|id| self.materialized.get(&id).copied())
                .filter(|p| linked.contains(p))
                .collect();
            if slots.len() != linked.len() {
                self.deps.relink_parents(h, slots);
            }
        }
    }

    fn bind(&mut self) {
        let graph = self.graph;
        for h in self.deps.handles() {
            let Some(name) = self.deps[h].name.clone() else {
                continue;
            };
            let Some(module) = self.model.resolve(&name) else {
                self.diagnostics.emit(
                    DiagnosticLevel::Debug,
                    DiagnosticKind::UnresolvedModule,
                    name,
                    "no module at this path; node left unbound",
                );
                continue;
            };
            let out_channels = self.out_channels(module, graph.node(self.deps[h].source));
            let node = &mut self.deps[h];
            node.module = Some(module);
            if matches!(node.node_type, NodeType::Weight | NodeType::Grouped) {
                node.out_channels = out_channels;
            }
        }
    }

    fn out_channels(&self, module: M::Handle, node: &ExportedNode) -> Option<u64> {
        let shape = self
            .model
            .parameter_shape(module, "weight")
            .or_else(|| {
                weight_input(node)
                    .and_then(|w| self.graph.initializer(w))
                    .map(|init| init.dims.clone())
            })?;
        let channels = if self.graph.is_transposed_convolution(self.index, node) {
            shape.get(1)? * i64::from(self.model.channel_groups(module))
        } else {
            *shape.first()?
        };
        u64::try_from(channels).ok()
    }

    /// Drops entries that reach a WEIGHT node without a module.
    fn retain_bound(&mut self, entries: &mut Vec<(String, NodeHandle<M::Handle>)>) {
        let deps = &self.deps;
        let diagnostics = &mut self.diagnostics;
        entries.retain(|(name, root)| {
            let unbound = DepthFirst::new(deps, *root)
                .map(|visit| &deps[visit.node])
                .find(|node| node.node_type == NodeType::Weight && node.module.is_none());
            let Some(node) = unbound else {
                return true;
            };
            diagnostics.emit(
                DiagnosticLevel::Warning,
                DiagnosticKind::UnboundWeight,
                name.clone(),
                format!("{node} has no module; entry dropped"),
            );
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use lnprune_ir::{AttributeValue, Initializer};
    use lnprune_model::ModuleTree;

    use super::*;

    type H = <ModuleTree as ModelTree>::Handle;

    fn node(name: &str, op: &str, inputs: &[&str], outputs: &[&str]) -> ExportedNode {
        ExportedNode::new(
            name,
            op,
            inputs.iter().map(|s| s.to_string()).collect(),
            outputs.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn conv(name: &str, input: &str, module: &str, output: &str) -> ExportedNode {
        node(name, "Conv", &[input, &format!("{module}.weight")], &[output])
    }

    fn graph(nodes: Vec<ExportedNode>, output: &str) -> ExportedGraph {
        let mut initializers = Vec::new();
        for n in &nodes {
            if let Some(w) = weight_input(n) {
                initializers.push(Initializer {
                    name: w.to_string(),
                    dims: vec![8, 8, 3, 3],
                });
            }
        }
        ExportedGraph {
            name: "test".into(),
            nodes,
            inputs: vec!["x".into()],
            outputs: vec![output.into()],
            initializers,
        }
    }

    fn tree(convs: &[(&str, u32)]) -> ModuleTree {
        let mut tree = ModuleTree::new();
        for &(path, groups) in convs {
            tree.insert_conv(path, vec![8, 8 / i64::from(groups), 3, 3], groups);
        }
        tree
    }

    fn labels(map: &DependencyMap<H>, hs: &[NodeHandle<H>]) -> Vec<String> {
        hs.iter().map(|&h| map.node(h).label.clone()).collect()
    }

    /// c0 → relu → c1 → c2 → head → y
    fn chain() -> ExportedGraph {
        graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("relu", "Relu", &["a"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "d"),
                conv("head", "d", "head", "y"),
            ],
            "y",
        )
    }

    #[test]
    fn weight_names() {
        let n = node("c", "Conv", &["x", "backbone.0.weight", "backbone.0.bias"], &["y"]);
        assert_eq!(weight_name(&n), Some("backbone.0"));
        assert_eq!(weight_name(&node("c", "Conv", &["x", "w"], &["y"])), None);
        assert_eq!(weight_name(&node("c", "Conv", &["x", ".weight"], &["y"])), None);
    }

    #[test]
    fn chain_entries() {
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();

        assert_eq!(map.names().collect::<Vec<_>>(), vec!["l0", "l1", "l2"]);
        let l0 = map.get("l0").unwrap();
        assert_eq!(map.node(l0).node_type, NodeType::Weight);
        let relu = map.node(l0).children()[0];
        assert_eq!(map.node(relu).node_type, NodeType::Passthrough);
        assert_eq!(labels(&map, map.node(relu).children()), vec!["c1"]);
        assert!(map.graph().asymmetric_edge().is_none());
    }

    #[test]
    fn root_reaching_output_is_abandoned() {
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();
        assert!(!map.contains_key("head"));
        let d: Vec<_> = map.diagnostics_of(DiagnosticKind::GeneratesOutput).collect();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].subject, "head");
    }

    #[test]
    fn nodes_are_shared_between_entries() {
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();
        let l1 = map.get("l1").unwrap();
        let relu = map.node(l1).parents()[0];
        assert_eq!(map.node(relu).parents(), &[map.get("l0").unwrap()]);
        let c1_count = map.graph().iter().filter(|(_, n)| n.label == "c1").count();
        assert_eq!(c1_count, 1);
    }

    #[test]
    fn unresolved_root_is_skipped() {
        let model = tree(&[("l1", 1), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();
        assert!(!map.contains_key("l0"));
        assert!(map.contains_key("l1"));
        assert!(
            map.diagnostics_of(DiagnosticKind::UnresolvedModule)
                .any(|d| d.subject == "l0" && d.level == DiagnosticLevel::Info)
        );
    }

    #[test]
    fn grouped_root_is_abandoned() {
        let model = tree(&[("l0", 1), ("l1", 2), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();
        assert!(!map.contains_key("l1"));
        // l0 feeds the grouped convolution directly
        assert!(!map.contains_key("l0"));
        assert!(map.contains_key("l2"));
        let grouped: Vec<_> = map
            .diagnostics_of(DiagnosticKind::GroupedConvolution)
            .map(|d| d.subject.as_str())
            .collect();
        assert_eq!(grouped, vec!["l0", "l1"]);
    }

    #[test]
    fn grouped_from_graph_attribute() {
        let mut g = chain();
        g.nodes[2] = g.nodes[2]
            .clone()
            .with_attribute("group", AttributeValue::Int(4));
        // no module for l1: the exported attribute decides
        let model = tree(&[("l0", 1), ("l2", 1), ("head", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();
        assert!(!map.contains_key("l0"));
        assert!(!map.contains_key("l1"));
        assert!(
            map.diagnostics_of(DiagnosticKind::GroupedConvolution)
                .any(|d| d.subject == "l0")
        );
    }

    #[test]
    fn shared_weight_is_removed() {
        let g = graph(
            vec![
                conv("a", "x", "shared", "a_out"),
                conv("b", "a_out", "shared", "b_out"),
                conv("c", "b_out", "c", "y"),
            ],
            "y",
        );
        let model = tree(&[("shared", 1), ("c", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();
        assert!(map.is_empty());
        let shared: Vec<_> = map.diagnostics_of(DiagnosticKind::SharedWeight).collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].level, DiagnosticLevel::Warning);
    }

    #[test]
    fn residual_add_ties_both_branches() {
        // c0 → r0 ─┬→ c1 → bn1 → add → c2 → out
        //          └────────────┘
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("r0", "Relu", &["a"], &["b"]),
                conv("c1", "b", "l1", "c"),
                node("bn1", "BatchNormalization", &["c", "l1_bn.weight"], &["d"]),
                node("add", "Add", &["b", "d"], &["e"]),
                conv("c2", "e", "l2", "f"),
                node("out", "Relu", &["f"], &["y"]),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();

        let l1 = map.get("l1").unwrap();
        let bn = map.node(l1).children()[0];
        let add = map.node(bn).children()[0];
        assert_eq!(map.node(add).node_type, NodeType::Combine);
        // the skip branch joins the add in input order
        assert_eq!(labels(&map, map.node(add).parents()), vec!["r0", "bn1"]);
        // l2 reaches the output and is abandoned
        assert!(!map.contains_key("l2"));
        assert!(map.contains_key("l0"));
    }

    #[test]
    fn concat_of_one_tensor_twice() {
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("cat", "Concat", &["a", "a"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "y"),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();

        let l0 = map.get("l0").unwrap();
        let cat = map.node(l0).children()[0];
        assert_eq!(map.node(l0).children(), &[cat, cat]);
        assert_eq!(map.node(cat).parents(), &[l0, l0]);
        assert_eq!(map.channels(cat), Some(16));
        assert_eq!(map.concat_ranges(cat), Some(vec![(l0, 0..8), (l0, 8..16)]));
        assert!(map.graph().asymmetric_edge().is_none());
    }

    #[test]
    fn collapsed_constant_leaves_concat_width_unknown() {
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("k", "Constant", &[], &["pad"]),
                node("cat", "Concat", &["a", "pad"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "y"),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();

        let l0 = map.get("l0").unwrap();
        let cat = map.node(l0).children()[0];
        assert_eq!(map.node(cat).parents(), &[l0]);
        assert_eq!(map.channels(cat), None);
        assert_eq!(map.concat_ranges(cat), None);
    }

    #[test]
    fn residual_on_graph_input_is_abandoned() {
        // c2(c1(x + c0(x)))
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("add", "Add", &["x", "a"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "y"),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();

        assert_eq!(map.names().collect::<Vec<_>>(), vec!["l1"]);
        let d: Vec<_> = map.diagnostics_of(DiagnosticKind::ConsumesInput).collect();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].subject, "l0");
    }

    #[test]
    fn unbound_weight_drops_entry() {
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("fc", "Gemm", &["a", "fc_w"], &["y"]),
            ],
            "y",
        );
        let model = tree(&[("l0", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();
        assert!(!map.contains_key("l0"));
        assert_eq!(map.diagnostics_of(DiagnosticKind::UnboundWeight).count(), 1);
    }

    #[test]
    fn unsupported_operator_is_reported_once() {
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("odd", "Mystery", &["a"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "y"),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();
        let l0 = map.get("l0").unwrap();
        assert_eq!(labels(&map, map.node(l0).children()), vec!["c1"]);
        assert_eq!(map.diagnostics_of(DiagnosticKind::UnsupportedOperator).count(), 1);
    }

    #[test]
    fn dangling_concat_input_is_skipped() {
        let g = graph(
            vec![
                conv("c0", "x", "l0", "a"),
                node("cat", "Concat", &["a", "ghost"], &["b"]),
                conv("c1", "b", "l1", "c"),
                conv("c2", "c", "l2", "y"),
            ],
            "y",
        );
        let model = tree(&[("l0", 1), ("l1", 1), ("l2", 1)]);
        let map = build_from_graph(&model, &g, &BuildOptions::default()).unwrap();
        assert!(map.contains_key("l0"));
        let dangling: Vec<_> = map.diagnostics_of(DiagnosticKind::DanglingTensor).collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].subject, "ghost");
    }

    #[test]
    fn cyclic_graph_is_fatal() {
        let g = graph(
            vec![
                node("a", "Relu", &["x", "e1"], &["e0"]),
                node("b", "Relu", &["e0"], &["e1"]),
            ],
            "e1",
        );
        let err = build_from_graph(&ModuleTree::new(), &g, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Graph(_)));
    }

    #[test]
    fn out_channels_from_module() {
        let mut model = tree(&[("l1", 1), ("l2", 1), ("head", 1)]);
        model.insert_conv("l0", vec![24, 3, 3, 3], 1);
        let map = build_from_graph(&model, &chain(), &BuildOptions::default()).unwrap();
        let l0 = map.get("l0").unwrap();
        assert_eq!(map.node(l0).out_channels, Some(24));
        assert_eq!(map.channels(map.node(l0).children()[0]), Some(24));
    }

    #[test]
    fn export_failure_is_fatal() {
        let exporter = |_: &[usize]| -> Result<ExportedGraph, lnprune_ir::ExportError> {
            Err(lnprune_ir::ExportError::Untraceable("data-dependent control flow".into()))
        };
        let err = build(&ModuleTree::new(), &exporter, &[1, 3, 32, 32], &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::Export(_)));
    }
}
