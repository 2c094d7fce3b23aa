//! Merging topology paths into a single tree for display.

use std::collections::BTreeMap;

use crate::topology::{NodeId, TopologyPath};

/// Name of the root added when the paths don't share a single top level node.
pub const SYNTHETIC_ROOT_NAME: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TopologyTree {
    pub name: String,
    pub id: NodeId,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TopologyTree>,
}

impl TopologyTree {
    fn synthetic_root(children: Vec<TopologyTree>) -> TopologyTree {
        TopologyTree {
            name: SYNTHETIC_ROOT_NAME.to_string(),
            id: NodeId::new(),
            children,
        }
    }

    pub fn is_synthetic_root(&self) -> bool {
        self.id.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&TopologyTree> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.node_count())
            .sum::<usize>()
    }

    /// Names of the leaves, depth first.
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        collect_leaf_names(self, &mut leaves);
        leaves
    }
}

fn collect_leaf_names<'a>(tree: &'a TopologyTree, leaves: &mut Vec<&'a str>) {
    if tree.children.is_empty() {
        leaves.push(&tree.name);
    }
    for child in &tree.children {
        collect_leaf_names(child, leaves);
    }
}

#[derive(Default)]
struct TrieNode {
    name: String,
    children: BTreeMap<NodeId, TrieNode>,
}

impl TrieNode {
    fn into_tree(self, id: NodeId) -> TopologyTree {
        TopologyTree {
            name: self.name,
            id,
            children: self
                .children
                .into_iter()
                .map(|(child_id, child)| child.into_tree(child_id))
                .collect(),
        }
    }
}

/// Merge the paths into one tree. Paths that agree on their first k nodes share those
/// k tree nodes. Children are ordered by node id, so the result doesn't depend on the
/// order of the paths.
///
/// A single top level node becomes the root of the tree, otherwise (no paths, or several
/// unrelated top level nodes) the top level nodes hang under a synthetic root.
pub fn build_tree<'a>(paths: impl IntoIterator<Item = &'a TopologyPath>) -> TopologyTree {
    let mut top_level: BTreeMap<NodeId, TrieNode> = BTreeMap::new();

    for path in paths {
        let mut level = &mut top_level;
        for node in path.nodes() {
            let trie_node = level.entry(node.id.clone()).or_insert_with(|| TrieNode {
                name: node.name.clone(),
                children: BTreeMap::new(),
            });
            level = &mut trie_node.children;
        }
    }

    let mut roots: Vec<TopologyTree> = top_level
        .into_iter()
        .map(|(id, node)| node.into_tree(id))
        .collect();

    if roots.len() == 1 {
        roots.remove(0)
    } else {
        TopologyTree::synthetic_root(roots)
    }
}
