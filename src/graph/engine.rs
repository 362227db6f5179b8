//! Collected item graph.
//!
//! Folds an item stream into a petgraph `DiGraph` with a name index.
//! Used for statistics, invariant checks and lookups after a parse.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use super::types::*;

/// Nodes and links of one parse.
pub struct ItemGraph {
    graph: DiGraph<Node, Link>,
    /// Index: node name -> node index.
    name_index: HashMap<String, NodeIndex>,
    /// Index: parent name -> children.
    children: HashMap<String, Vec<NodeIndex>>,
    /// Links whose target never became a node (ignored or unwalked).
    dangling: Vec<Link>,
}

impl Default for ItemGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_index: HashMap::new(),
            children: HashMap::new(),
            dangling: Vec::new(),
        }
    }

    /// Build from a complete item stream. Nodes may come after links that use them.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Item>,
    {
        let mut graph = Self::new();
        let mut links = Vec::new();
        for item in items {
            match item {
                Item::Node(node) => {
                    graph.add_node(node);
                }
                Item::Link(link) => links.push(link),
            }
        }
        for link in links {
            graph.add_link(link);
        }
        debug!(
            nodes = graph.graph.node_count(),
            links = graph.graph.edge_count(),
            dangling = graph.dangling.len(),
            "collected item graph"
        );
        graph
    }

    // ─── Building ───────────────────────────────────────────────

    /// Add a node. A repeated name keeps the first node.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.name_index.get(&node.name) {
            return idx;
        }
        let name = node.name.clone();
        let parent = node.parent.clone();
        let idx = self.graph.add_node(node);
        self.name_index.insert(name, idx);
        if !parent.is_empty() {
            self.children.entry(parent).or_default().push(idx);
        }
        idx
    }

    /// Add a link between known nodes; anything else is kept as dangling.
    pub fn add_link(&mut self, link: Link) {
        match (
            self.name_index.get(&link.source).copied(),
            self.name_index.get(&link.target).copied(),
        ) {
            (Some(from), Some(to)) => {
                self.graph.add_edge(from, to, link);
            }
            _ => self.dangling.push(link),
        }
    }

    // ─── Queries ────────────────────────────────────────────────

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.name_index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Direct children in emission order.
    pub fn children(&self, name: &str) -> Vec<&Node> {
        self.children
            .get(name)
            .map(|indexes| indexes.iter().map(|&idx| &self.graph[idx]).collect())
            .unwrap_or_default()
    }

    /// Outgoing links, including ones whose target was never emitted.
    pub fn links_from(&self, name: &str) -> Vec<&Link> {
        let mut links: Vec<&Link> = match self.name_index.get(name) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|edge| edge.weight())
                .collect(),
            None => Vec::new(),
        };
        links.extend(self.dangling.iter().filter(|l| l.source == name));
        links
    }

    /// Incoming links from emitted nodes.
    pub fn links_to(&self, name: &str) -> Vec<&Link> {
        match self.name_index.get(name) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .map(|edge| edge.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn dangling(&self) -> &[Link] {
        &self.dangling
    }

    /// Nodes whose parent was never emitted. Empty for a well-formed stream.
    pub fn orphans(&self) -> Vec<&Node> {
        self.graph
            .node_weights()
            .filter(|node| !node.parent.is_empty() && !self.name_index.contains_key(&node.parent))
            .collect()
    }

    // ─── Stats ──────────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_kind = BTreeMap::new();
        for node in self.graph.node_weights() {
            *nodes_by_kind.entry(node.kind.to_string()).or_insert(0) += 1;
        }
        let mut links_by_kind = BTreeMap::new();
        for link in self.graph.edge_weights().chain(&self.dangling) {
            *links_by_kind.entry(link.kind.to_string()).or_insert(0) += 1;
        }
        GraphStats {
            total_nodes: self.graph.node_count(),
            total_links: self.graph.edge_count() + self.dangling.len(),
            unresolved_links: self.dangling.len(),
            orphans: self.orphans().len(),
            nodes_by_kind,
            links_by_kind,
        }
    }
}

/// Statistics about a collected graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_links: usize,
    /// Links whose target has no node.
    pub unresolved_links: usize,
    pub orphans: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub links_by_kind: BTreeMap<String, usize>,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes: {}", self.total_nodes)?;
        for (kind, count) in &self.nodes_by_kind {
            writeln!(f, "  {kind}: {count}")?;
        }
        writeln!(
            f,
            "Links: {} ({} unresolved)",
            self.total_links, self.unresolved_links
        )?;
        for (kind, count) in &self.links_by_kind {
            writeln!(f, "  {kind}: {count}")?;
        }
        if self.orphans > 0 {
            writeln!(f, "Orphans: {}", self.orphans)?;
        }
        Ok(())
    }
}
