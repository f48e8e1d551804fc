//! Error type for dependency-map builds.

use lnprune_ir::{ExportError, GraphError};

/// Fatal build failures. Nothing about a single root is fatal; those
/// become diagnostics on the returned map instead.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The exporter could not produce a graph.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// The exported graph is structurally unusable.
    #[error("invalid exported graph: {0}")]
    Graph(#[from] GraphError),
}
