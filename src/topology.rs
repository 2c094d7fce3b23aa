//! Resolving alarm sources into topology paths.
//!
//! An alarm source like `rootA.site1.dev1` encodes its position in the network hierarchy,
//! each segment is one level (region -> site -> device). The path of the source is the
//! chain of its ancestors root first, ending with the source itself. Every node on the path
//! is identified by the prefix of the source up to that level (`rootA`, `rootA.site1`,
//! `rootA.site1.dev1`), so equally named segments under different parents stay distinct.

use std::collections::BTreeSet;

pub const DEFAULT_PATH_SEPARATOR: char = '.';

/// Identifier of a topology node, the source prefix up to the node's level.
pub type NodeId = String;

/// Set of topology nodes touched by some paths.
pub type NodeSet = BTreeSet<NodeId>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PathNode {
    pub id: NodeId,
    /// Name of the segment, used as the label of the node.
    pub name: String,
}

/// Ordered chain of topology nodes, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TopologyPath {
    nodes: Vec<PathNode>,
}

impl TopologyPath {
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|node| &node.id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// An empty path means the source has no topology membership.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if the path shares at least one node with the set.
    pub fn intersects(&self, nodes: &NodeSet) -> bool {
        self.node_ids().any(|id| nodes.contains(id))
    }

    pub fn intersects_path(&self, other: &TopologyPath) -> bool {
        self.node_ids()
            .any(|id| other.node_ids().any(|other_id| other_id == id))
    }
}

/// Collect all nodes of the given paths.
pub fn node_set<'a>(paths: impl IntoIterator<Item = &'a TopologyPath>) -> NodeSet {
    paths
        .into_iter()
        .flat_map(|path| path.node_ids().cloned())
        .collect()
}

/// Turns alarm source identifiers into topology paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathResolver {
    separator: char,
}

impl Default for PathResolver {
    fn default() -> Self {
        PathResolver::new(DEFAULT_PATH_SEPARATOR)
    }
}

impl PathResolver {
    pub fn new(separator: char) -> PathResolver {
        PathResolver { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Resolve one alarm source. Malformed identifiers (empty, or with an empty segment)
    /// resolve to an empty path.
    pub fn resolve(&self, alarm_source: &str) -> TopologyPath {
        let alarm_source = alarm_source.trim();
        if alarm_source.is_empty() {
            return TopologyPath::default();
        }

        let mut nodes = Vec::new();
        let mut prefix = String::with_capacity(alarm_source.len());
        for segment in alarm_source.split(self.separator) {
            if segment.trim().is_empty() {
                return TopologyPath::default();
            }
            if !prefix.is_empty() {
                prefix.push(self.separator);
            }
            prefix.push_str(segment);
            nodes.push(PathNode {
                id: prefix.clone(),
                name: segment.to_string(),
            });
        }

        TopologyPath { nodes }
    }

    /// Resolve every distinct source, skipping the ones without topology membership.
    pub fn resolve_all<'a>(
        &self,
        alarm_sources: impl IntoIterator<Item = &'a str>,
    ) -> BTreeSet<TopologyPath> {
        alarm_sources
            .into_iter()
            .map(|source| self.resolve(source))
            .filter(|path| !path.is_empty())
            .collect()
    }
}
