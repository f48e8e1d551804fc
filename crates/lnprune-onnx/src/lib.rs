//! ONNX support for lnprune.
//!
//! Decodes ONNX models (as produced by `torch.onnx.export`, including the
//! `ONNX_ATEN` operator export) into [`lnprune_ir::ExportedGraph`]s using
//! protobuf deserialization via prost, and provides the [`OnnxFile`] and
//! [`CommandExporter`] export drivers.

use std::path::PathBuf;

use lnprune_ir::ExportError;

mod decode;
mod exporter;
#[doc(hidden)]
pub mod proto;

pub use decode::{convert_graph, decode_model, load_model};
pub use exporter::{CommandExporter, OUTPUT_PLACEHOLDER, OnnxFile, SHAPE_PLACEHOLDER};

/// Errors while reading ONNX models.
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error(transparent)]
    Decode(#[from] prost::DecodeError),
    #[error("ONNX model contains no graph")]
    MissingGraph,
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<OnnxError> for ExportError {
    fn from(err: OnnxError) -> Self {
        match err {
            OnnxError::Decode(e) => ExportError::Malformed(e.to_string()),
            OnnxError::MissingGraph => ExportError::MissingGraph,
            OnnxError::Read { source, .. } => ExportError::Io(source),
        }
    }
}
