//! Closed operator vocabulary.
//!
//! [`OpKind`] turns the open-ended `op_type` string of an exported node into
//! a closed enum. Generic `ATen` nodes carry their real operator in a string
//! attribute; those are parsed into [`AtenOp`]. Anything unrecognized lands in
//! an `Other` arm so callers always have an explicit default to handle.

use std::fmt;

use crate::graph::ExportedNode;

/// Element-wise activation functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Activation {
    Relu,
    LeakyRelu,
    Sigmoid,
    Tanh,
    Clip,
    HardSwish,
    HardSigmoid,
    Mish,
    Softplus,
    Elu,
    Selu,
    PRelu,
}

/// Pooling operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Max,
    Average,
    GlobalMax,
    GlobalAverage,
}

/// Element-wise binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Sum,
}

/// Sub-operators of a generic `ATen` node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AtenOp {
    Convolution,
    Linear,
    BatchNorm,
    Activation(Activation),
    Pool(PoolKind),
    Upsample,
    Dropout,
    Cat,
    Split,
    Binary(BinaryOp),
    Size,
    View,
    Flatten,
    Other(String),
}

impl AtenOp {
    /// Strips the trailing underscore of an in-place variant (`relu_` is
    /// `relu`). Private operators such as `_convolution` are left alone.
    pub fn base_name(name: &str) -> &str {
        name.strip_suffix('_')
            .filter(|b| !b.is_empty() && !b.starts_with('_'))
            .unwrap_or(name)
    }

    /// Parses an ATen operator name. In-place variants (`relu_`) map to
    /// their out-of-place counterpart.
    pub fn parse(name: &str) -> Self {
        match Self::base_name(name) {
            "_convolution" | "convolution" | "conv2d" => Self::Convolution,
            "linear" | "addmm" => Self::Linear,
            "batch_norm" | "_batch_norm_impl_index" => Self::BatchNorm,
            "relu" => Self::Activation(Activation::Relu),
            "leaky_relu" => Self::Activation(Activation::LeakyRelu),
            "sigmoid" => Self::Activation(Activation::Sigmoid),
            "tanh" => Self::Activation(Activation::Tanh),
            "hardtanh" | "relu6" => Self::Activation(Activation::Clip),
            "hardswish" => Self::Activation(Activation::HardSwish),
            "hardsigmoid" => Self::Activation(Activation::HardSigmoid),
            "mish" => Self::Activation(Activation::Mish),
            "softplus" => Self::Activation(Activation::Softplus),
            "elu" => Self::Activation(Activation::Elu),
            "selu" => Self::Activation(Activation::Selu),
            "prelu" => Self::Activation(Activation::PRelu),
            "max_pool2d" | "max_pool2d_with_indices" => Self::Pool(PoolKind::Max),
            "avg_pool2d" => Self::Pool(PoolKind::Average),
            "adaptive_avg_pool2d" => Self::Pool(PoolKind::GlobalAverage),
            "adaptive_max_pool2d" => Self::Pool(PoolKind::GlobalMax),
            "upsample_nearest2d" | "upsample_bilinear2d" | "upsample" => Self::Upsample,
            "dropout" | "feature_dropout" => Self::Dropout,
            "cat" | "concat" => Self::Cat,
            "split" | "split_with_sizes" | "chunk" => Self::Split,
            "add" => Self::Binary(BinaryOp::Add),
            "sub" => Self::Binary(BinaryOp::Sub),
            "mul" => Self::Binary(BinaryOp::Mul),
            "div" => Self::Binary(BinaryOp::Div),
            "size" => Self::Size,
            "view" | "reshape" => Self::View,
            "flatten" => Self::Flatten,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// Operator kind of an exported node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Conv { group: i64 },
    ConvTranspose { group: i64 },
    Gemm,
    MatMul,
    BatchNormalization,
    InstanceNormalization,
    Activation(Activation),
    Pool(PoolKind),
    Resize,
    Dropout,
    Identity,
    Pad,
    Concat { axis: i64 },
    Split { axis: i64 },
    Binary(BinaryOp),
    Constant,
    ConstantOfShape,
    Shape,
    Gather,
    Cast,
    Unsqueeze,
    Squeeze,
    Reshape,
    Flatten,
    Transpose,
    Slice,
    /// A generic `ATen` node with its parsed sub-operator.
    Aten(AtenOp),
    Other(String),
}

impl OpKind {
    /// Parses an exported node's `op_type` and attributes.
    pub fn from_node(node: &ExportedNode) -> Self {
        let group = || node.int_attribute("group").unwrap_or(1);
        match node.op_type.as_str() {
            "Conv" => Self::Conv { group: group() },
            "ConvTranspose" => Self::ConvTranspose { group: group() },
            "Gemm" => Self::Gemm,
            "MatMul" => Self::MatMul,
            "BatchNormalization" => Self::BatchNormalization,
            "InstanceNormalization" => Self::InstanceNormalization,
            "Relu" => Self::Activation(Activation::Relu),
            "LeakyRelu" => Self::Activation(Activation::LeakyRelu),
            "Sigmoid" => Self::Activation(Activation::Sigmoid),
            "Tanh" => Self::Activation(Activation::Tanh),
            "Clip" => Self::Activation(Activation::Clip),
            "HardSwish" => Self::Activation(Activation::HardSwish),
            "HardSigmoid" => Self::Activation(Activation::HardSigmoid),
            "Mish" => Self::Activation(Activation::Mish),
            "Softplus" => Self::Activation(Activation::Softplus),
            "Elu" => Self::Activation(Activation::Elu),
            "Selu" => Self::Activation(Activation::Selu),
            "PRelu" => Self::Activation(Activation::PRelu),
            "MaxPool" => Self::Pool(PoolKind::Max),
            "AveragePool" => Self::Pool(PoolKind::Average),
            "GlobalMaxPool" => Self::Pool(PoolKind::GlobalMax),
            "GlobalAveragePool" => Self::Pool(PoolKind::GlobalAverage),
            "Resize" | "Upsample" => Self::Resize,
            "Dropout" => Self::Dropout,
            "Identity" => Self::Identity,
            "Pad" => Self::Pad,
            "Concat" => Self::Concat {
                axis: node.int_attribute("axis").unwrap_or(1),
            },
            "Split" => Self::Split {
                axis: node.int_attribute("axis").unwrap_or(0),
            },
            "Add" => Self::Binary(BinaryOp::Add),
            "Sub" => Self::Binary(BinaryOp::Sub),
            "Mul" => Self::Binary(BinaryOp::Mul),
            "Div" => Self::Binary(BinaryOp::Div),
            "Max" => Self::Binary(BinaryOp::Max),
            "Min" => Self::Binary(BinaryOp::Min),
            "Sum" => Self::Binary(BinaryOp::Sum),
            "Constant" => Self::Constant,
            "ConstantOfShape" => Self::ConstantOfShape,
            "Shape" => Self::Shape,
            "Gather" => Self::Gather,
            "Cast" => Self::Cast,
            "Unsqueeze" => Self::Unsqueeze,
            "Squeeze" => Self::Squeeze,
            "Reshape" => Self::Reshape,
            "Flatten" => Self::Flatten,
            "Transpose" => Self::Transpose,
            "Slice" => Self::Slice,
            "ATen" => match node.aten_operator() {
                Some(name) => Self::Aten(AtenOp::parse(name)),
                None => Self::Other("ATen".into()),
            },
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns `true` for operators that own a convolution weight.
    pub fn is_convolution(&self) -> bool {
        matches!(
            self,
            Self::Conv { .. } | Self::ConvTranspose { .. } | Self::Aten(AtenOp::Convolution)
        )
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conv { group: 1 } => f.write_str("Conv"),
            Self::Conv { group } => write!(f, "Conv(group={group})"),
            Self::ConvTranspose { group: 1 } => f.write_str("ConvTranspose"),
            Self::ConvTranspose { group } => write!(f, "ConvTranspose(group={group})"),
            Self::Activation(a) => write!(f, "{a:?}"),
            Self::Pool(PoolKind::Max) => f.write_str("MaxPool"),
            Self::Pool(PoolKind::Average) => f.write_str("AveragePool"),
            Self::Pool(PoolKind::GlobalMax) => f.write_str("GlobalMaxPool"),
            Self::Pool(PoolKind::GlobalAverage) => f.write_str("GlobalAveragePool"),
            Self::Concat { axis } => write!(f, "Concat(axis={axis})"),
            Self::Split { axis } => write!(f, "Split(axis={axis})"),
            Self::Binary(op) => write!(f, "{op:?}"),
            Self::Aten(AtenOp::Other(name)) => write!(f, "ATen::{name}"),
            Self::Aten(op) => write!(f, "ATen::{op:?}"),
            Self::Other(name) => f.write_str(name),
            other => write!(f, "{other:?}"),
        }
    }
}
