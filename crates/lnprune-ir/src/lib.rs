//! Exported computation graph model for lnprune.
//!
//! An exporter turns a live model into an [`ExportedGraph`]: operator nodes
//! wired together by tensor names. This crate holds that graph, its closed
//! operator vocabulary ([`OpKind`]), the [`Exporter`] contract and the
//! handle-addressed [`Arena`] used by graph-shaped data further up the stack.

pub mod arena;
mod display;
mod error;
mod export;
pub mod graph;
mod op;

pub use arena::{Arena, Handle};
pub use display::dump_graph;
pub use error::{ExportError, GraphError};
pub use export::Exporter;
pub use graph::{
    Attribute, AttributeValue, ExportedGraph, ExportedNode, Initializer, NodeId, TensorIndex,
    TensorValue,
};
pub use op::{Activation, AtenOp, BinaryOp, OpKind, PoolKind};
