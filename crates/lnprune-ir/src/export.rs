//! Export driver contract.

use crate::error::ExportError;
use crate::graph::ExportedGraph;

/// Produces the exported graph of a model evaluated on a synthetic input.
///
/// Implementations must not mutate model parameters and must fail instead
/// of returning a partial graph when the model cannot be traced.
pub trait Exporter {
    /// Exports the model for an input tensor of `input_shape`.
    fn export_graph(&self, input_shape: &[usize]) -> Result<ExportedGraph, ExportError>;
}

impl<F> Exporter for F
where
    F: Fn(&[usize]) -> Result<ExportedGraph, ExportError>,
{
    fn export_graph(&self, input_shape: &[usize]) -> Result<ExportedGraph, ExportError> {
        self(input_shape)
    }
}

impl Exporter for ExportedGraph {
    /// A graph that was exported ahead of time exports as itself,
    /// whatever shape is requested.
    fn export_graph(&self, input_shape: &[usize]) -> Result<ExportedGraph, ExportError> {
        log::debug!(
            "using pre-exported graph '{}' for input shape {input_shape:?}",
            self.name
        );
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_exporter_receives_shape() {
        let exporter = |shape: &[usize]| {
            if shape.len() != 4 {
                return Err(ExportError::Untraceable(format!("rank {}", shape.len())));
            }
            Ok(ExportedGraph {
                name: format!("{}x{}", shape[2], shape[3]),
                ..Default::default()
            })
        };
        assert_eq!(exporter.export_graph(&[1, 3, 32, 64]).unwrap().name, "32x64");
        assert!(exporter.export_graph(&[3, 32]).is_err());
    }

    #[test]
    fn graph_exports_itself() {
        let graph = ExportedGraph {
            name: "frozen".into(),
            ..Default::default()
        };
        assert_eq!(graph.export_graph(&[1, 3, 8, 8]).unwrap(), graph);
    }
}
