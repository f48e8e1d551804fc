//! Conversion from ONNX protobuf messages to [`ExportedGraph`].

use std::path::Path;

use lnprune_ir::{
    Attribute, AttributeValue, ExportedGraph, ExportedNode, Initializer, TensorValue,
};
use prost::Message;

use crate::OnnxError;
use crate::proto::{AttributeProto, GraphProto, ModelProto, NodeProto, TensorProto};
use crate::proto::{attribute_type, data_type};

/// Decodes a serialized ONNX model into an exported graph.
pub fn decode_model(bytes: &[u8]) -> Result<ExportedGraph, OnnxError> {
    let model = ModelProto::decode(bytes)?;
    let graph = model.graph.ok_or(OnnxError::MissingGraph)?;
    log::debug!(
        "decoded ONNX model from '{}' {} ({} nodes)",
        model.producer_name,
        model.producer_version,
        graph.node.len()
    );
    Ok(convert_graph(graph))
}

/// Reads and decodes an ONNX model file.
pub fn load_model(path: impl AsRef<Path>) -> Result<ExportedGraph, OnnxError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| OnnxError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_model(&bytes)
}

/// Converts a decoded `GraphProto`.
pub fn convert_graph(graph: GraphProto) -> ExportedGraph {
    ExportedGraph {
        name: graph.name,
        nodes: graph.node.into_iter().map(convert_node).collect(),
        inputs: graph.input.into_iter().map(|v| v.name).collect(),
        outputs: graph.output.into_iter().map(|v| v.name).collect(),
        initializers: graph
            .initializer
            .into_iter()
            .map(|t| Initializer {
                name: t.name,
                dims: t.dims,
            })
            .collect(),
    }
}

fn convert_node(node: NodeProto) -> ExportedNode {
    ExportedNode {
        name: node.name,
        op_type: node.op_type,
        domain: node.domain,
        inputs: node.input,
        outputs: node.output,
        attributes: node.attribute.into_iter().map(convert_attribute).collect(),
    }
}

fn convert_attribute(attr: AttributeProto) -> Attribute {
    let value = match attr.r#type {
        attribute_type::FLOAT => AttributeValue::Float(attr.f),
        attribute_type::INT => AttributeValue::Int(attr.i),
        attribute_type::STRING => AttributeValue::String(utf8(&attr.s)),
        attribute_type::TENSOR => match &attr.t {
            Some(t) => AttributeValue::Tensor(tensor_value(t)),
            None => AttributeValue::Unsupported,
        },
        attribute_type::FLOATS => AttributeValue::Floats(attr.floats.clone()),
        attribute_type::INTS => AttributeValue::Ints(attr.ints.clone()),
        attribute_type::STRINGS => {
            AttributeValue::Strings(attr.strings.iter().map(|s| utf8(s)).collect())
        }
        0 => infer_untyped(&attr),
        _ => AttributeValue::Unsupported,
    };
    Attribute {
        name: attr.name,
        value,
    }
}

/// Very old exporters leave `type` unset; pick whichever payload is populated.
fn infer_untyped(attr: &AttributeProto) -> AttributeValue {
    if let Some(t) = &attr.t {
        AttributeValue::Tensor(tensor_value(t))
    } else if !attr.ints.is_empty() {
        AttributeValue::Ints(attr.ints.clone())
    } else if !attr.floats.is_empty() {
        AttributeValue::Floats(attr.floats.clone())
    } else if !attr.strings.is_empty() {
        AttributeValue::Strings(attr.strings.iter().map(|s| utf8(s)).collect())
    } else if !attr.s.is_empty() {
        AttributeValue::String(utf8(&attr.s))
    } else if attr.f != 0.0 {
        AttributeValue::Float(attr.f)
    } else {
        AttributeValue::Int(attr.i)
    }
}

fn tensor_value(t: &TensorProto) -> TensorValue {
    let mut ints: Vec<i64> = t
        .int64_data
        .iter()
        .copied()
        .chain(t.int32_data.iter().map(|&v| i64::from(v)))
        .collect();
    let mut floats = t.float_data.clone();

    match t.data_type {
        data_type::INT64 if ints.is_empty() => {
            ints = t
                .raw_data
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
        }
        data_type::INT32 if ints.is_empty() => {
            ints = t
                .raw_data
                .chunks_exact(4)
                .map(|c| i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect();
        }
        data_type::FLOAT if floats.is_empty() => {
            floats = t
                .raw_data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
        }
        _ => {}
    }

    TensorValue {
        dims: t.dims.clone(),
        ints,
        floats,
    }
}

fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
