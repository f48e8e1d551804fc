//! Model module-tree collaborator.
//!
//! The dependency builder never touches a live model directly. It asks a
//! [`ModelTree`] to resolve dot-paths (`layers.3.conv`) to module handles and
//! reads a few facts about those modules. [`ModuleTree`] is an in-memory
//! implementation that can be assembled by hand or inferred from the named
//! parameters of an exported graph.

use std::fmt::Debug;
use std::hash::Hash;

mod infer;
mod tree;

pub use tree::{Module, ModuleTree, Parameter};

/// Read-only view of a model's trainable-module hierarchy.
pub trait ModelTree {
    /// Non-owning reference to one module of the tree.
    type Handle: Copy + Eq + Hash + Debug;

    /// Resolves a dot-separated module path. `None` when any segment is missing.
    fn resolve(&self, path: &str) -> Option<Self::Handle>;

    /// Number of channel groups of a (convolution) module; `1` for modules
    /// without grouping.
    fn channel_groups(&self, module: Self::Handle) -> u32;

    /// Shape of a named parameter of the module (e.g. `"weight"`).
    fn parameter_shape(&self, module: Self::Handle, parameter: &str) -> Option<Vec<i64>>;

    /// Type tag of the module (e.g. `"Conv2d"`), for reporting.
    fn kind(&self, module: Self::Handle) -> String;
}

impl<T: ModelTree + ?Sized> ModelTree for &T {
    type Handle = T::Handle;

    fn resolve(&self, path: &str) -> Option<Self::Handle> {
        (**self).resolve(path)
    }

    fn channel_groups(&self, module: Self::Handle) -> u32 {
        (**self).channel_groups(module)
    }

    fn parameter_shape(&self, module: Self::Handle, parameter: &str) -> Option<Vec<i64>> {
        (**self).parameter_shape(module, parameter)
    }

    fn kind(&self, module: Self::Handle) -> String {
        (**self).kind(module)
    }
}
