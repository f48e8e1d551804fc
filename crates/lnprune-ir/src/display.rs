//! Text dump of exported graphs for debugging.

use std::fmt;

use crate::graph::{AttributeValue, ExportedGraph, ExportedNode};

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Ints(v) => write!(f, "{v:?}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Floats(v) => write!(f, "{v:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Strings(v) => write!(f, "{v:?}"),
            Self::Tensor(t) => write!(f, "tensor{:?}", t.dims),
            Self::Unsupported => f.write_str("<unsupported>"),
        }
    }
}

impl fmt::Display for ExportedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}({})",
            self.outputs.join(", "),
            self.op(),
            self.inputs.join(", ")
        )?;
        if !self.attributes.is_empty() {
            f.write_str(" {")?;
            for (i, attr) in self.attributes.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", attr.name, attr.value)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

/// Renders a whole graph, one node per line, prefixed by its position.
pub fn dump_graph(graph: &ExportedGraph) -> String {
    GraphDump(graph).to_string()
}

struct GraphDump<'a>(&'a ExportedGraph);

impl fmt::Display for GraphDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.0;
        writeln!(f, "graph {:?}", graph.name)?;
        writeln!(f, "  inputs: {}", graph.inputs.join(", "))?;
        writeln!(f, "  outputs: {}", graph.outputs.join(", "))?;
        for init in &graph.initializers {
            writeln!(f, "  param {} {:?}", init.name, init.dims)?;
        }
        for (id, node) in graph.iter() {
            writeln!(f, "  %{} {}: {}", id.0, node.label(), node)?;
        }
        Ok(())
    }
}
