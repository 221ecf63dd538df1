//! Ordered node collections
//!
//! Insertion order is the traversal order used by every graph build, so the
//! collection keeps nodes in a vector and indexes them by id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use crate::node::{DbtNode, NodeId};

/// Insertion-ordered mapping from unique_id to node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<DbtNode>", into = "Vec<DbtNode>")]
pub struct NodeCollection {
    nodes: Vec<DbtNode>,

    /// unique_id -> position in `nodes`
    index: HashMap<NodeId, usize>,
}

impl NodeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing (in place) any node with the same id
    pub fn insert(&mut self, node: DbtNode) -> Option<DbtNode> {
        match self.index.get(&node.unique_id) {
            Some(&position) => Some(std::mem::replace(&mut self.nodes[position], node)),
            None => {
                self.index.insert(node.unique_id.clone(), self.nodes.len());
                self.nodes.push(node);
                None
            }
        }
    }

    pub fn get(&self, unique_id: &str) -> Option<&DbtNode> {
        self.index.get(unique_id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.index.contains_key(unique_id)
    }

    /// Node ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.unique_id.as_str())
    }

    /// Nodes in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, DbtNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get immediate children (dependents) of a node, in insertion order
    pub fn children_of(&self, unique_id: &str) -> Vec<&DbtNode> {
        self.nodes
            .iter()
            .filter(|node| node.depends_on.iter().any(|dep| dep == unique_id))
            .collect()
    }

    /// Reverse edges for the whole collection: node -> nodes that depend on it
    ///
    /// Each child appears once per parent, in insertion order.
    pub fn children_map(&self) -> HashMap<&str, Vec<&DbtNode>> {
        let mut children: HashMap<&str, Vec<&DbtNode>> = HashMap::new();

        for node in &self.nodes {
            let mut seen = BTreeSet::new();
            for dep in &node.depends_on {
                if seen.insert(dep.as_str()) {
                    children.entry(dep.as_str()).or_default().push(node);
                }
            }
        }

        children
    }

    /// Copy of this collection ordered so that every node follows its dependencies
    ///
    /// Kahn's algorithm; among ready nodes the earliest inserted goes first, so
    /// an already consistent order is returned unchanged. Dependencies outside
    /// the collection do not constrain the order. Returns `None` on a cycle.
    pub fn topologically_sorted(&self) -> Option<NodeCollection> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for (position, node) in self.nodes.iter().enumerate() {
            let parents: BTreeSet<usize> = node
                .depends_on
                .iter()
                .filter_map(|dep| self.index.get(dep).copied())
                .collect();

            in_degree[position] = parents.len();
            for parent in parents {
                children[parent].push(position);
            }
        }

        // Find nodes with no dependencies
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(position, _)| position)
            .collect();

        let mut sorted = NodeCollection::new();

        while let Some(position) = ready.pop_first() {
            sorted.insert(self.nodes[position].clone());

            for &child in &children[position] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        // Check if all nodes were visited (no cycles)
        if sorted.len() == self.nodes.len() {
            Some(sorted)
        } else {
            None
        }
    }
}

impl FromIterator<DbtNode> for NodeCollection {
    fn from_iter<T: IntoIterator<Item = DbtNode>>(iter: T) -> Self {
        let mut collection = NodeCollection::new();
        for node in iter {
            collection.insert(node);
        }
        collection
    }
}

impl From<Vec<DbtNode>> for NodeCollection {
    fn from(nodes: Vec<DbtNode>) -> Self {
        nodes.into_iter().collect()
    }
}

impl From<NodeCollection> for Vec<DbtNode> {
    fn from(collection: NodeCollection) -> Self {
        collection.nodes
    }
}

impl<'a> IntoIterator for &'a NodeCollection {
    type Item = &'a DbtNode;
    type IntoIter = std::slice::Iter<'a, DbtNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
