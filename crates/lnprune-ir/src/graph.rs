//! Exported computation graph.
//!
//! An [`ExportedGraph`] is the read-only result of exporting a model: a list
//! of operator nodes connected by named tensors. Nodes reference tensors by
//! name only; [`TensorIndex`] resolves names to their producer and consumers.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::GraphError;
use crate::op::{AtenOp, OpKind};

/// Argument positions of `aten::_convolution`
/// (`input, weight, bias, stride, padding, dilation, transposed, output_padding, groups, ...`).
const ATEN_CONVOLUTION_TRANSPOSED: usize = 6;
const ATEN_CONVOLUTION_GROUPS: usize = 8;

/// Position of a node in [`ExportedGraph::nodes`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the node position as a `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A constant tensor value carried inside an attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TensorValue {
    pub dims: Vec<i64>,
    pub ints: Vec<i64>,
    pub floats: Vec<f32>,
}

impl TensorValue {
    /// Returns the single integer held by a scalar (or one-element) tensor.
    pub fn as_scalar_int(&self) -> Option<i64> {
        match self.ints.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }
}

/// The value of an operator attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    String(String),
    Strings(Vec<String>),
    Tensor(TensorValue),
    /// Attribute kinds the dependency analysis never inspects (graphs, sparse tensors, ...).
    Unsupported,
}

/// A named operator attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One operation in the exported graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedNode {
    /// Exporter-assigned node name (may be empty).
    pub name: String,
    /// Raw operator kind, e.g. `"Conv"` or `"ATen"`.
    pub op_type: String,
    /// Operator domain (empty for the default ONNX domain).
    pub domain: String,
    /// Input tensor names, in operator argument order. Empty names mark
    /// omitted optional inputs.
    pub inputs: Vec<String>,
    /// Output tensor names.
    pub outputs: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl ExportedNode {
    /// Creates a node without attributes in the default domain.
    pub fn new(
        name: impl Into<String>,
        op_type: impl Into<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            domain: String::new(),
            inputs,
            outputs,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Looks up an integer attribute by name.
    pub fn int_attribute(&self, name: &str) -> Option<i64> {
        match self.attribute(name)? {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Looks up a string attribute by name.
    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        match self.attribute(name)? {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The sub-operator name of an `ATen` node: the `operator` attribute, or
    /// the first string attribute for exporters that leave it unnamed.
    pub fn aten_operator(&self) -> Option<&str> {
        if self.op_type != "ATen" {
            return None;
        }
        self.string_attribute("operator").or_else(|| {
            self.attributes.iter().find_map(|a| match &a.value {
                AttributeValue::String(s) => Some(s.as_str()),
                _ => None,
            })
        })
    }

    /// Parses the raw operator kind and attributes into an [`OpKind`].
    pub fn op(&self) -> OpKind {
        OpKind::from_node(self)
    }

    /// Non-empty input tensor names.
    pub fn data_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Human-readable label: the node name, or the operator kind when unnamed.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.op_type
        } else {
            &self.name
        }
    }
}

/// A named constant parameter of the graph (weights, biases, statistics).
#[derive(Clone, Debug, PartialEq)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<i64>,
}

/// The exported computation graph of a model evaluated on one input shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportedGraph {
    pub name: String,
    /// Operator nodes in exporter order.
    pub nodes: Vec<ExportedNode>,
    /// Graph input tensor names.
    pub inputs: Vec<String>,
    /// Graph output tensor names.
    pub outputs: Vec<String>,
    pub initializers: Vec<Initializer>,
}

impl ExportedGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node at `id`.
    pub fn node(&self, id: NodeId) -> &ExportedNode {
        &self.nodes[id.index()]
    }

    /// Iterates over `(id, node)` pairs in exporter order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ExportedNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Looks up an initializer by tensor name.
    pub fn initializer(&self, name: &str) -> Option<&Initializer> {
        self.initializers.iter().find(|i| i.name == name)
    }

    /// Builds the tensor producer/consumer index, validating that every
    /// tensor has at most one producer and that the graph is acyclic.
    pub fn index(&self) -> Result<TensorIndex, GraphError> {
        let mut producers: HashMap<&str, NodeId> = HashMap::new();
        let mut consumers: HashMap<&str, Vec<NodeId>> = HashMap::new();

        for (id, node) in self.iter() {
            for out in node.outputs.iter().filter(|o| !o.is_empty()) {
                if let Some(first) = producers.insert(out, id) {
                    return Err(GraphError::DuplicateProducer {
                        tensor: out.clone(),
                        first: self.node(first).label().to_string(),
                        second: node.label().to_string(),
                    });
                }
            }
            for inp in node.data_inputs() {
                let list = consumers.entry(inp).or_default();
                if list.last() != Some(&id) {
                    list.push(id);
                }
            }
        }

        let index = TensorIndex {
            producers: producers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            consumers: consumers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            parameters: self
                .initializers
                .iter()
                .map(|i| i.name.clone())
                .chain(self.inputs.iter().cloned())
                .collect(),
            inputs: self
                .inputs
                .iter()
                .filter(|name| self.initializer(name).is_none())
                .cloned()
                .collect(),
            outputs: self.outputs.iter().cloned().collect(),
        };
        index.topological_order(self)?;
        Ok(index)
    }

    /// Reads an integer scalar fed into an operator by a `Constant` node.
    pub fn constant_int(&self, index: &TensorIndex, tensor: &str) -> Option<i64> {
        let producer = self.node(index.producer(tensor)?);
        if producer.op_type != "Constant" {
            return None;
        }
        match producer.attribute("value")? {
            AttributeValue::Tensor(t) => t.as_scalar_int(),
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Channel-group count of a convolution node: the `group` attribute of
    /// ONNX convolutions, or the constant `groups` argument of an ATen
    /// `_convolution`. `None` for other operators or unresolvable constants.
    pub fn convolution_groups(&self, index: &TensorIndex, node: &ExportedNode) -> Option<i64> {
        match node.op() {
            OpKind::Conv { group } | OpKind::ConvTranspose { group } => Some(group),
            OpKind::Aten(AtenOp::Convolution) => node
                .inputs
                .get(ATEN_CONVOLUTION_GROUPS)
                .and_then(|t| self.constant_int(index, t)),
            _ => None,
        }
    }

    /// Whether an ATen `_convolution` node is a transposed convolution.
    pub fn is_transposed_convolution(&self, index: &TensorIndex, node: &ExportedNode) -> bool {
        match node.op() {
            OpKind::ConvTranspose { .. } => true,
            OpKind::Aten(AtenOp::Convolution) => node
                .inputs
                .get(ATEN_CONVOLUTION_TRANSPOSED)
                .and_then(|t| self.constant_int(index, t))
                == Some(1),
            _ => false,
        }
    }
}

/// Producer/consumer lookup tables for the tensors of an [`ExportedGraph`].
#[derive(Clone, Debug, Default)]
pub struct TensorIndex {
    producers: HashMap<String, NodeId>,
    consumers: HashMap<String, Vec<NodeId>>,
    parameters: HashSet<String>,
    inputs: HashSet<String>,
    outputs: HashSet<String>,
}

impl TensorIndex {
    /// The node producing `tensor`, if any.
    pub fn producer(&self, tensor: &str) -> Option<NodeId> {
        self.producers.get(tensor).copied()
    }

    /// The nodes consuming `tensor`, in exporter order.
    pub fn consumers(&self, tensor: &str) -> &[NodeId] {
        self.consumers.get(tensor).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` for initializers and graph inputs.
    pub fn is_parameter(&self, tensor: &str) -> bool {
        self.parameters.contains(tensor)
    }

    /// Returns `true` for graph inputs fed by the caller. Initializers that
    /// an exporter also lists as inputs do not count.
    pub fn is_graph_input(&self, tensor: &str) -> bool {
        self.inputs.contains(tensor)
    }

    /// Returns `true` if `tensor` is a graph output.
    pub fn is_output(&self, tensor: &str) -> bool {
        self.outputs.contains(tensor)
    }

    /// Returns node ids in topological order.
    ///
    /// The ordering is deterministic: among ready nodes, the one with the
    /// smaller [`NodeId`] is emitted first.
    pub fn topological_order(&self, graph: &ExportedGraph) -> Result<Vec<NodeId>, GraphError> {
        let n = graph.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (id, node) in graph.iter() {
            for inp in node.data_inputs() {
                if let Some(p) = self.producer(inp) {
                    in_degree[id.index()] += 1;
                    successors[p.index()].push(id.index());
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(idx) = ready.pop_first() {
            order.push(NodeId(idx as u32));
            for &s in &successors[idx] {
                in_degree[s] -= 1;
                if in_degree[s] == 0 {
                    ready.insert(s);
                }
            }
        }

        if order.len() != n {
            return Err(GraphError::Cycle {
                visited: order.len(),
                total: n,
            });
        }
        Ok(order)
    }
}
