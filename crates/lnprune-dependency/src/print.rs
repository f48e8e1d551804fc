//! Text rendering of dependency maps.

use std::fmt;

use crate::map::DependencyMap;
use crate::traverse::DepthFirst;

/// Layout of [`format_dependency_map`].
#[derive(Clone, Debug)]
pub struct PrintOptions {
    /// Indent unit; each depth level adds it twice.
    pub separator: String,
    /// Draw `├─`/`└─` connectors instead of plain indentation.
    pub tree: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            separator: " ".into(),
            tree: false,
        }
    }
}

impl PrintOptions {
    pub fn tree() -> Self {
        Self {
            tree: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Renders every entry of `map`: the weight name, one line per visited node,
/// then a blank line.
pub fn format_dependency_map<H>(map: &DependencyMap<H>, options: &PrintOptions) -> String {
    Rendered {
        map,
        options,
        entry: None,
    }
    .to_string()
}

/// Renders a single entry, or `None` when `name` is not in the map.
pub fn format_entry<H>(map: &DependencyMap<H>, name: &str, options: &PrintOptions) -> Option<String> {
    if !map.contains_key(name) {
        return None;
    }
    let rendered = Rendered {
        map,
        options,
        entry: Some(name),
    };
    Some(rendered.to_string())
}

/// A map, or one entry of it, laid out per [`PrintOptions`].
struct Rendered<'a, H> {
    map: &'a DependencyMap<H>,
    options: &'a PrintOptions,
    entry: Option<&'a str>,
}

impl<H> fmt::Display for Rendered<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.entry {
            return self.write_entry(f, name);
        }
        for name in self.map.names() {
            self.write_entry(f, name)?;
        }
        Ok(())
    }
}

impl<H> Rendered<'_, H> {
    fn write_entry(&self, f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
        let Some(walk) = self.map.traverse(name) else {
            return Ok(());
        };
        writeln!(f, "{name}")?;
        if self.options.tree {
            self.write_tree(f, walk)?;
        } else {
            for visit in walk {
                let indent = self.options.separator.repeat(2 * visit.depth);
                writeln!(f, " {indent}{}", self.map.node(visit.node))?;
            }
        }
        writeln!(f)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, walk: DepthFirst<'_, H>) -> fmt::Result {
        // lasts[d] is the last-child flag of the ancestor at depth d + 1
        let mut lasts: Vec<bool> = Vec::new();
        for visit in walk {
            if visit.depth == 0 {
                writeln!(f, "{}", self.map.node(visit.node))?;
                continue;
            }
            lasts.truncate(visit.depth - 1);
            for &last in &lasts {
                f.write_str(if last { "   " } else { "│  " })?;
            }
            f.write_str(if visit.last { "└─ " } else { "├─ " })?;
            writeln!(f, "{}", self.map.node(visit.node))?;
            lasts.push(visit.last);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lnprune_ir::NodeId;

    use super::*;
    use crate::node::{DependencyGraph, DependencyNode, NodeType};

    fn sample() -> DependencyMap<()> {
        let mut g = DependencyGraph::new();
        let mut add = |ty, label: &str, name: Option<&str>| {
            let id = NodeId(g.len() as u32);
            g.add(DependencyNode::new(ty, id, label, "Op").with_name(name.map(Into::into)))
        };
        let c0 = add(NodeType::Weight, "Conv_0", Some("layers.0"));
        let pool = add(NodeType::Passthrough, "MaxPool_1", None);
        let c1 = add(NodeType::Weight, "Conv_2", Some("layers.1"));
        let c2 = add(NodeType::Weight, "Conv_3", Some("layers.2"));
        g.link(c0, pool);
        g.link(pool, c1);
        g.link(c0, c2);
        DependencyMap::new(vec![("layers.0".into(), c0)], g, Vec::new())
    }

    #[test]
    fn plain_layout() {
        let text = format_dependency_map(&sample(), &PrintOptions::default());
        assert_eq!(
            text,
            "layers.0\n \
             WEIGHT layers.0\n   \
             PASSTHROUGH MaxPool_1 (Op)\n     \
             WEIGHT layers.1\n   \
             WEIGHT layers.2\n\n"
        );
    }

    #[test]
    fn custom_separator() {
        let opts = PrintOptions::default().with_separator("-");
        let text = format_dependency_map(&sample(), &opts);
        assert!(text.contains("\n ----WEIGHT layers.1\n"));
    }

    #[test]
    fn tree_layout() {
        let text = format_dependency_map(&sample(), &PrintOptions::tree());
        assert_eq!(
            text,
            "layers.0\n\
             WEIGHT layers.0\n\
             ├─ PASSTHROUGH MaxPool_1 (Op)\n\
             │  └─ WEIGHT layers.1\n\
             └─ WEIGHT layers.2\n\n"
        );
    }

    #[test]
    fn entry_rendering_matches_map_rendering() {
        let map = sample();
        for opts in [PrintOptions::default(), PrintOptions::tree()] {
            assert_eq!(
                format_entry(&map, "layers.0", &opts).unwrap(),
                format_dependency_map(&map, &opts)
            );
        }
    }

    #[test]
    fn single_entry() {
        let map = sample();
        assert!(format_entry(&map, "layers.0", &PrintOptions::default()).is_some());
        assert!(format_entry(&map, "layers.9", &PrintOptions::default()).is_none());
    }
}
