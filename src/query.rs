//! Lookups between nodes and source files: "show code" and its reverse.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};
use crate::graph::types::{Item, SourceLocation};
use crate::names;

/// A file's text positioned at one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
    pub line: usize,
}

/// Node locations gathered from one item stream.
#[derive(Debug, Default)]
pub struct SourceLocator {
    locations: HashMap<String, SourceLocation>,
    /// Every node name, located or not.
    names: Vec<String>,
}

impl SourceLocator {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut locator = Self::default();
        for node in items.into_iter().filter_map(Item::as_node) {
            locator.names.push(node.name.clone());
            if let Some(location) = &node.location {
                locator.locations.insert(node.name.clone(), location.clone());
            }
        }
        locator.names.sort();
        locator.names.dedup();
        locator
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// The node's own location, else the earliest located descendant.
    pub fn location(&self, node: &str) -> Option<&SourceLocation> {
        if let Some(location) = self.locations.get(node) {
            return Some(location);
        }
        self.locations
            .iter()
            .filter(|(name, _)| names::is_strict_prefix(node, name))
            .map(|(_, location)| location)
            .min_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)))
    }

    /// Path, whole file text and line of a node.
    pub fn get_source(&self, node: &str) -> Result<SourceText> {
        let location = self
            .location(node)
            .ok_or_else(|| GraphError::NodeNotFound(node.to_string()))?;
        let text = std::fs::read_to_string(&location.path)
            .map_err(|e| GraphError::open(&location.path, e))?;
        Ok(SourceText {
            path: location.path.clone(),
            text,
            line: location.line,
        })
    }

    /// Node declared closest above `line` in `path`; else the deepest common
    /// ancestor of the nodes located in the same directory.
    pub fn node_for_file_path(&self, path: &Path, line: usize) -> Result<String> {
        let in_file = self
            .locations
            .iter()
            .filter(|(_, location)| location.path == path && location.line <= line)
            .max_by(|(a_name, a), (b_name, b)| {
                a.line.cmp(&b.line).then_with(|| a_name.len().cmp(&b_name.len()))
            })
            .map(|(name, _)| name.clone());
        if let Some(name) = in_file {
            return Ok(name);
        }

        let dir = path.parent();
        let mut in_dir = self
            .locations
            .iter()
            .filter(|(_, location)| location.path.parent() == dir)
            .map(|(name, _)| name.as_str());
        let ancestor = in_dir.next().map(|first| {
            in_dir.fold(first.to_string(), |common, name| common_ancestor(&common, name))
        });
        match ancestor {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(GraphError::NodeNotFound(format!("{}:{line}", path.display()))),
        }
    }

    /// Every known node name in sorted order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn common_ancestor(a: &str, b: &str) -> String {
    let mut candidate = a;
    while !candidate.is_empty() && candidate != b && !names::is_strict_prefix(candidate, b) {
        candidate = names::parent_name(candidate);
    }
    candidate.to_string()
}
