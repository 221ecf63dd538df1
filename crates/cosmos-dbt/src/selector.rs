//! Node selection by tag or path
//!
//! Selectors use dbt's `method:value` syntax. Only the `tag` and `path`
//! methods are supported.

use cosmos_core::{CosmosError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use crate::dag::NodeCollection;
use crate::node::DbtNode;

/// A parsed node selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `tag:<name>` - nodes carrying the tag
    Tag(String),

    /// `path:<prefix>` - nodes whose file path starts with the prefix, compared
    /// component by component
    Path(PathBuf),
}

impl Selector {
    pub fn matches(&self, node: &DbtNode) -> bool {
        match self {
            Self::Tag(tag) => node.has_tag(tag),
            Self::Path(prefix) => node.file_path.starts_with(prefix),
        }
    }
}

impl FromStr for Selector {
    type Err = CosmosError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("tag", tag)) if !tag.is_empty() => Ok(Self::Tag(tag.to_string())),
            Some(("path", prefix)) if !prefix.is_empty() => Ok(Self::Path(PathBuf::from(prefix))),
            _ => Err(CosmosError::InvalidSelector(s.to_string())),
        }
    }
}

fn parse_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| s.parse()).collect()
}

/// Filter a node collection with select/exclude selectors
///
/// An empty `select` keeps every node. Tests are not matched directly by
/// `select`: a test survives when every dependency it has in the collection
/// survives and it is not excluded itself. Dependencies on removed nodes are
/// pruned from the surviving nodes.
pub fn select_nodes(
    nodes: &NodeCollection,
    select: &[String],
    exclude: &[String],
) -> Result<NodeCollection> {
    let select = parse_all(select)?;
    let exclude = parse_all(exclude)?;

    if select.is_empty() && exclude.is_empty() {
        return Ok(nodes.clone());
    }

    let excluded = |node: &DbtNode| exclude.iter().any(|selector| selector.matches(node));

    let kept: HashSet<&str> = nodes
        .iter()
        .filter(|node| !node.is_test())
        .filter(|node| select.is_empty() || select.iter().any(|selector| selector.matches(node)))
        .filter(|node| !excluded(*node))
        .map(|node| node.unique_id.as_str())
        .collect();

    let kept_tests: HashSet<&str> = nodes
        .iter()
        .filter(|node| node.is_test() && !excluded(*node))
        .filter(|node| {
            node.depends_on
                .iter()
                .filter(|dep| nodes.contains(dep))
                .all(|dep| kept.contains(dep.as_str()))
        })
        .map(|node| node.unique_id.as_str())
        .collect();

    let survives = |id: &str| kept.contains(id) || kept_tests.contains(id);

    let selected: NodeCollection = nodes
        .iter()
        .filter(|node| survives(node.unique_id.as_str()))
        .map(|node| {
            let mut node = node.clone();
            node.depends_on.retain(|dep| survives(dep.as_str()));
            node
        })
        .collect();

    tracing::debug!(
        total = nodes.len(),
        selected = selected.len(),
        "Applied node selection"
    );

    Ok(selected)
}
