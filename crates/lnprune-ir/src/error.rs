//! Error types for exported graphs.

/// Structural problems that make an exported graph unusable.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A tensor is listed as the output of two different nodes.
    #[error("tensor '{tensor}' already produced by '{first}' (second producer '{second}')")]
    DuplicateProducer {
        tensor: String,
        first: String,
        second: String,
    },

    /// The producer/consumer relation contains a cycle.
    #[error("cycle detected in exported graph ({visited} of {total} nodes ordered)")]
    Cycle { visited: usize, total: usize },
}

/// Failures of the export driver.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The model could not be traced for the requested input shape.
    #[error("model cannot be traced: {0}")]
    Untraceable(String),

    /// The exporter produced bytes that do not decode to a graph.
    #[error("malformed exported graph: {0}")]
    Malformed(String),

    /// The exported model has no graph.
    #[error("exported model contains no graph")]
    MissingGraph,

    /// Reading or writing the temporary export artifact failed.
    #[error("export i/o: {0}")]
    Io(#[from] std::io::Error),
}
