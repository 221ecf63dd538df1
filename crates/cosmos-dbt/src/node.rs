//! A single vertex of the dbt dependency graph

use cosmos_core::DbtResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Node identifier (unique_id from dbt, e.g. "model.jaffle_shop.orders")
pub type NodeId = String;

/// A dbt model, seed, snapshot or test
///
/// Read-only once built; the builder methods exist only to construct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbtNode {
    /// Globally unique identifier
    pub unique_id: NodeId,

    /// Human-readable name, not guaranteed unique
    pub name: String,

    pub resource_type: DbtResourceType,

    /// Upstream node ids, in the order dbt reported them
    #[serde(default)]
    pub depends_on: Vec<NodeId>,

    /// Source file of the node relative to the project root (may be empty)
    ///
    /// `path:` selectors compare leading components, so a relative prefix
    /// never matches an absolute path.
    #[serde(default)]
    pub file_path: PathBuf,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Node configuration (materialization strategy, etc.)
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

impl DbtNode {
    /// Create a node with no dependencies, tags or config
    pub fn new(
        unique_id: impl Into<NodeId>,
        name: impl Into<String>,
        resource_type: DbtResourceType,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            resource_type,
            depends_on: Vec::new(),
            file_path: PathBuf::new(),
            tags: BTreeSet::new(),
            config: BTreeMap::new(),
        }
    }

    /// Set upstream dependencies
    pub fn with_depends_on<I, S>(mut self, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.depends_on = depends_on.into_iter().map(Into::into).collect();
        self
    }

    /// Set the source file path
    pub fn with_file_path(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Set tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Add one config entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn is_test(&self) -> bool {
        self.resource_type == DbtResourceType::Test
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Materialization strategy from `config.materialized`, if set
    pub fn materialized(&self) -> Option<&str> {
        self.config.get("materialized").and_then(Value::as_str)
    }
}
