//! Operator classification.
//!
//! Every exported operator maps to exactly one [`NodeType`]. The built-in
//! table is a closed match over [`OpKind`]; callers can replace any entry by
//! operator key (`"MaxPool"`, `"ATen::max_pool2d"`) through
//! [`Classifier::with_override`]. Operators outside the table fall back to
//! [`NodeType::Ignore`].

use std::collections::HashMap;

use lnprune_ir::{AtenOp, ExportedNode, OpKind};

use crate::node::NodeType;

/// Where a classification came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationSource {
    /// A caller-supplied override.
    Override,
    /// The built-in table.
    Builtin,
    /// The operator is unknown; defaulted to [`NodeType::Ignore`].
    Default,
}

/// Result of classifying one exported node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub node_type: NodeType,
    pub source: ClassificationSource,
}

impl Classification {
    fn new(node_type: NodeType, source: ClassificationSource) -> Self {
        Self { node_type, source }
    }

    /// Returns `true` when the operator was not recognized.
    pub fn is_unsupported(&self) -> bool {
        self.source == ClassificationSource::Default
    }
}

/// Override key of an exported node: its `op_type`, or `ATen::<operator>`
/// for generic ATen nodes (in-place suffix stripped).
pub fn op_key(node: &ExportedNode) -> String {
    match node.aten_operator() {
        Some(name) => format!("ATen::{}", AtenOp::base_name(name)),
        None => node.op_type.clone(),
    }
}

/// Maps exported operators to node types.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    overrides: HashMap<String, NodeType>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the classification of every operator with key `op`.
    #[must_use]
    pub fn with_override(mut self, op: impl Into<String>, node_type: NodeType) -> Self {
        self.set_override(op, node_type);
        self
    }

    pub fn set_override(&mut self, op: impl Into<String>, node_type: NodeType) {
        let op = op.into();
        log::debug!("classification override: {op} -> {node_type}");
        self.overrides.insert(op, node_type);
    }

    /// Classifies `node`. `groups` is the channel-group count of the owning
    /// module (or of the exported convolution); a convolution with
    /// `groups != 1` is always [`NodeType::Grouped`], whatever the overrides.
    pub fn classify(&self, node: &ExportedNode, groups: i64) -> Classification {
        let op = node.op();
        if op.is_convolution() && groups != 1 {
            return Classification::new(NodeType::Grouped, ClassificationSource::Builtin);
        }
        if let Some(&node_type) = self.overrides.get(&op_key(node)) {
            return Classification::new(node_type, ClassificationSource::Override);
        }
        match builtin(&op) {
            Some(node_type) => Classification::new(node_type, ClassificationSource::Builtin),
            None => Classification::new(NodeType::Ignore, ClassificationSource::Default),
        }
    }
}

/// Returns `true` for operators whose output describes a tensor's shape
/// rather than its channels.
pub(crate) fn is_shape_query(op: &OpKind) -> bool {
    matches!(
        op,
        OpKind::Shape | OpKind::ConstantOfShape | OpKind::Aten(AtenOp::Size)
    )
}

fn builtin(op: &OpKind) -> Option<NodeType> {
    use NodeType::*;

    let ty = match op {
        OpKind::Conv { .. } | OpKind::ConvTranspose { .. } | OpKind::Gemm => Weight,
        OpKind::BatchNormalization
        | OpKind::InstanceNormalization
        | OpKind::Activation(_)
        | OpKind::Pool(_)
        | OpKind::Resize
        | OpKind::Dropout
        | OpKind::Identity
        | OpKind::Pad => Passthrough,
        OpKind::Concat { axis: 1 } => Concat,
        OpKind::Concat { .. } => Combine,
        OpKind::Split { axis: 1 } => Split,
        OpKind::Split { .. } => Passthrough,
        OpKind::Binary(_) => Combine,
        OpKind::Constant
        | OpKind::ConstantOfShape
        | OpKind::Shape
        | OpKind::Gather
        | OpKind::Cast
        | OpKind::Unsqueeze
        | OpKind::Squeeze
        | OpKind::Reshape
        | OpKind::Flatten
        | OpKind::Transpose
        | OpKind::Slice => Ignore,
        OpKind::Aten(aten) => match aten {
            AtenOp::Convolution | AtenOp::Linear => Weight,
            AtenOp::BatchNorm
            | AtenOp::Activation(_)
            | AtenOp::Pool(_)
            | AtenOp::Upsample
            | AtenOp::Dropout => Passthrough,
            AtenOp::Cat => Concat,
            AtenOp::Split => Split,
            AtenOp::Binary(_) => Combine,
            AtenOp::Size | AtenOp::View | AtenOp::Flatten => Ignore,
            AtenOp::Other(_) => return None,
        },
        OpKind::MatMul | OpKind::Other(_) => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use lnprune_ir::AttributeValue;

    use super::*;

    fn node(op_type: &str) -> ExportedNode {
        ExportedNode::new("n", op_type, vec!["x".into()], vec!["y".into()])
    }

    fn aten(operator: &str) -> ExportedNode {
        node("ATen").with_attribute("operator", AttributeValue::String(operator.into()))
    }

    fn ty(classifier: &Classifier, node: &ExportedNode) -> NodeType {
        classifier.classify(node, 1).node_type
    }

    #[test]
    fn builtin_table() {
        let c = Classifier::default();
        assert_eq!(ty(&c, &node("Conv")), NodeType::Weight);
        assert_eq!(ty(&c, &node("LeakyRelu")), NodeType::Passthrough);
        assert_eq!(ty(&c, &node("MaxPool")), NodeType::Passthrough);
        assert_eq!(ty(&c, &node("Concat")), NodeType::Concat);
        assert_eq!(ty(&c, &node("Add")), NodeType::Combine);
        assert_eq!(ty(&c, &node("Reshape")), NodeType::Ignore);
        assert_eq!(ty(&c, &aten("_convolution")), NodeType::Weight);
        assert_eq!(ty(&c, &aten("relu_")), NodeType::Passthrough);
        assert_eq!(ty(&c, &aten("cat")), NodeType::Concat);
        assert_eq!(ty(&c, &aten("chunk")), NodeType::Split);
    }

    #[test]
    fn axis_decides_concat_and_split() {
        let c = Classifier::default();
        let spatial = node("Concat").with_attribute("axis", AttributeValue::Int(2));
        assert_eq!(ty(&c, &spatial), NodeType::Combine);
        let channels = node("Split").with_attribute("axis", AttributeValue::Int(1));
        assert_eq!(ty(&c, &channels), NodeType::Split);
        assert_eq!(ty(&c, &node("Split")), NodeType::Passthrough);
    }

    #[test]
    fn unknown_operator_defaults_to_ignore() {
        let c = Classifier::default();
        let result = c.classify(&node("NonMaxSuppression"), 1);
        assert_eq!(result.node_type, NodeType::Ignore);
        assert!(result.is_unsupported());
        assert!(c.classify(&aten("im2col"), 1).is_unsupported());
        assert!(!c.classify(&node("Shape"), 1).is_unsupported());
    }

    #[test]
    fn grouped_convolution() {
        let c = Classifier::default();
        assert_eq!(c.classify(&node("Conv"), 32).node_type, NodeType::Grouped);
        assert_eq!(c.classify(&aten("_convolution"), 2).node_type, NodeType::Grouped);
        // groups only matter for convolutions
        assert_eq!(c.classify(&node("Relu"), 4).node_type, NodeType::Passthrough);
    }

    #[test]
    fn overrides_take_precedence() {
        let c = Classifier::new()
            .with_override("MaxPool", NodeType::Ignore)
            .with_override("ATen::max_pool2d", NodeType::Ignore);
        let result = c.classify(&node("MaxPool"), 1);
        assert_eq!(result.node_type, NodeType::Ignore);
        assert_eq!(result.source, ClassificationSource::Override);
        assert_eq!(ty(&c, &aten("max_pool2d")), NodeType::Ignore);
        assert_eq!(ty(&c, &node("AveragePool")), NodeType::Passthrough);
    }

    #[test]
    fn override_cannot_hide_grouping() {
        let c = Classifier::new().with_override("Conv", NodeType::Weight);
        assert_eq!(c.classify(&node("Conv"), 2).node_type, NodeType::Grouped);
    }

    #[test]
    fn op_keys() {
        assert_eq!(op_key(&node("MaxPool")), "MaxPool");
        assert_eq!(op_key(&aten("add_")), "ATen::add");
        assert_eq!(op_key(&aten("_convolution")), "ATen::_convolution");
    }
}
