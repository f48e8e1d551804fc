//! Channel-dependency graphs for structured pruning.
//!
//! [`build`] exports a model, finds every prunable convolution weight and
//! grows a graph of the operators its output channels flow through. Each
//! operator is classified ([`NodeType`]) by how it propagates a change in
//! channel count; operators without channel semantics are collapsed away.
//! The result is a [`DependencyMap`]: one entry per prunable weight, all
//! entries sharing one [`DependencyGraph`].
//!
//! ```text
//! layers.0
//!  WEIGHT layers.0
//!    PASSTHROUGH MaxPool_1 (MaxPool)
//!      WEIGHT layers.2
//! ```

mod build;
mod classify;
mod collapse;
mod diagnostic;
mod error;
mod map;
mod node;
mod print;
mod traverse;

pub use build::{BuildOptions, build, build_from_graph, weight_name};
pub use classify::{Classification, ClassificationSource, Classifier, op_key};
pub use collapse::collapse;
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLevel};
pub use error::BuildError;
pub use map::DependencyMap;
pub use node::{DependencyGraph, DependencyNode, NodeHandle, NodeType, ParseNodeTypeError};
pub use print::{PrintOptions, format_dependency_map, format_entry};
pub use traverse::{DepthFirst, Visit, traverse_depth_first};
