//! Arena-backed module tree.

use lnprune_ir::{Arena, Handle};

use crate::ModelTree;

/// A trainable parameter of a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub shape: Vec<i64>,
}

/// One module of the tree.
#[derive(Clone, Debug)]
pub struct Module {
    /// Attribute name under the parent (empty for the root).
    pub name: String,
    /// Type tag, e.g. `"Conv2d"`, `"BatchNorm2d"`, `"Sequential"`.
    pub kind: String,
    /// Channel-group count; `1` unless this is a grouped convolution.
    pub groups: u32,
    pub parameters: Vec<Parameter>,
    parent: Option<Handle<Module>>,
    children: Vec<Handle<Module>>,
}

impl Module {
    fn new(name: &str, kind: &str, parent: Option<Handle<Module>>) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            groups: 1,
            parameters: Vec::new(),
            parent,
            children: Vec::new(),
        }
    }

    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parent(&self) -> Option<Handle<Module>> {
        self.parent
    }

    pub fn children(&self) -> &[Handle<Module>] {
        &self.children
    }
}

/// A model's module hierarchy, rooted at an unnamed container.
#[derive(Clone, Debug)]
pub struct ModuleTree {
    modules: Arena<Module>,
    root: Handle<Module>,
}

impl Default for ModuleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTree {
    /// Creates a tree holding only the root container.
    pub fn new() -> Self {
        let mut modules = Arena::new();
        let root = modules.append(Module::new("", "Model", None));
        Self { modules, root }
    }

    pub fn root(&self) -> Handle<Module> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.modules.len() == 1
    }

    pub fn get(&self, module: Handle<Module>) -> &Module {
        &self.modules[module]
    }

    pub fn get_mut(&mut self, module: Handle<Module>) -> &mut Module {
        &mut self.modules[module]
    }

    /// The direct child of `parent` called `name`.
    pub fn child(&self, parent: Handle<Module>, name: &str) -> Option<Handle<Module>> {
        self.modules[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.modules[c].name == name)
    }

    /// Inserts (or finds) the module at `path`, creating missing
    /// intermediate containers as `"Sequential"`. An existing module keeps
    /// its kind unless it was only a placeholder container.
    pub fn insert(&mut self, path: &str, kind: &str) -> Handle<Module> {
        let mut current = self.root;
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            current = match self.child(current, segment) {
                Some(existing) => existing,
                None => {
                    let container = if is_last { kind } else { "Sequential" };
                    let handle = self
                        .modules
                        .append(Module::new(segment, container, Some(current)));
                    self.modules[current].children.push(handle);
                    handle
                }
            };
        }
        if current != self.root && self.modules[current].kind == "Sequential" {
            self.modules[current].kind = kind.to_string();
        }
        current
    }

    /// Inserts a module with a weight parameter and a channel-group count.
    pub fn insert_conv(&mut self, path: &str, weight_shape: Vec<i64>, groups: u32) -> Handle<Module> {
        let handle = self.insert(path, "Conv2d");
        let module = self.get_mut(handle);
        module.kind = "Conv2d".into();
        module.groups = groups;
        module.set_parameter("weight", weight_shape);
        handle
    }

    /// The dot-path of `module`.
    pub fn path(&self, module: Handle<Module>) -> String {
        let mut segments = Vec::new();
        let mut current = Some(module);
        while let Some(h) = current {
            let m = &self.modules[h];
            if !m.name.is_empty() {
                segments.push(m.name.as_str());
            }
            current = m.parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Iterates over every module except the root, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<Module>, &Module)> {
        let root = self.root;
        self.modules.iter().filter(move |&(h, _)| h != root)
    }
}

impl Module {
    /// Sets (or replaces) a parameter shape.
    pub fn set_parameter(&mut self, name: &str, shape: Vec<i64>) {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(p) => p.shape = shape,
            None => self.parameters.push(Parameter {
                name: name.to_string(),
                shape,
            }),
        }
    }
}

impl ModelTree for ModuleTree {
    type Handle = Handle<Module>;

    fn resolve(&self, path: &str) -> Option<Self::Handle> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self.root, |current, segment| self.child(current, segment))
    }

    fn channel_groups(&self, module: Self::Handle) -> u32 {
        self.modules[module].groups
    }

    fn parameter_shape(&self, module: Self::Handle, parameter: &str) -> Option<Vec<i64>> {
        self.modules[module]
            .parameter(parameter)
            .map(|p| p.shape.clone())
    }

    fn kind(&self, module: Self::Handle) -> String {
        self.modules[module].kind.clone()
    }
}
