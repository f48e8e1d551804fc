//! Module-tree inference from exported parameter names.
//!
//! Exporters that keep parameter names (`layers.0.conv.weight`) leave enough
//! behind to rebuild the module hierarchy: every dotted initializer becomes a
//! parameter of the module at its prefix, and the operator consuming the
//! parameter tells what kind of module it was.

use lnprune_ir::{AtenOp, ExportedGraph, OpKind, TensorIndex};

use crate::tree::ModuleTree;

impl ModuleTree {
    /// Rebuilds a module tree from a graph's named initializers.
    pub fn from_graph(graph: &ExportedGraph) -> Self {
        let mut tree = Self::new();

        for init in &graph.initializers {
            match init.name.rsplit_once('.') {
                Some((path, param)) if !path.is_empty() && !path.contains("::") => {
                    let module = tree.insert(path, "Module");
                    tree.get_mut(module).set_parameter(param, init.dims.clone());
                }
                _ => log::debug!("initializer '{}' has no module path", init.name),
            }
        }

        let index = match graph.index() {
            Ok(index) => index,
            Err(err) => {
                log::warn!("module kinds not inferred: {err}");
                return tree;
            }
        };

        for node in &graph.nodes {
            let Some(path) = node
                .data_inputs()
                .find_map(|name| name.strip_suffix(".weight").filter(|p| !p.is_empty()))
            else {
                continue;
            };
            if let Some((kind, groups)) = module_kind(graph, &index, node) {
                let module = tree.insert(path, kind);
                let m = tree.get_mut(module);
                m.kind = kind.to_string();
                m.groups = groups;
            }
        }

        tree
    }
}

fn module_kind(
    graph: &ExportedGraph,
    index: &TensorIndex,
    node: &lnprune_ir::ExportedNode,
) -> Option<(&'static str, u32)> {
    let op = node.op();
    if op.is_convolution() {
        let groups = graph
            .convolution_groups(index, node)
            .and_then(|g| u32::try_from(g).ok())
            .unwrap_or(1);
        let kind = if graph.is_transposed_convolution(index, node) {
            "ConvTranspose2d"
        } else {
            "Conv2d"
        };
        return Some((kind, groups));
    }
    match op {
        OpKind::BatchNormalization | OpKind::Aten(AtenOp::BatchNorm) => Some(("BatchNorm2d", 1)),
        OpKind::InstanceNormalization => Some(("InstanceNorm2d", 1)),
        OpKind::Gemm | OpKind::Aten(AtenOp::Linear) => Some(("Linear", 1)),
        _ => None,
    }
}
