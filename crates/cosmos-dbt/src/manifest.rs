//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json and converts it to a node collection
//! ordered so that every node follows its dependencies.

use cosmos_core::DbtResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use crate::dag::NodeCollection;
use crate::node::DbtNode;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    pub metadata: ManifestMetadata,

    /// Model, seed, snapshot and test nodes
    pub nodes: HashMap<String, ManifestNode>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Parse manifest from JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Convert enabled models, seeds, snapshots and tests into a node collection
    ///
    /// Dependencies on anything that is not itself converted (sources,
    /// macros, disabled nodes) are dropped. The result is topologically
    /// ordered, ties broken by unique_id.
    pub fn to_nodes(&self) -> Result<NodeCollection, ManifestError> {
        let mut manifest_nodes: Vec<&ManifestNode> = self
            .nodes
            .values()
            .filter(|node| node.config.enabled)
            .filter(|node| {
                let resource_type = DbtResourceType::from(node.resource_type.as_str());
                let keep = resource_type.is_runnable() || resource_type == DbtResourceType::Test;
                if !keep {
                    tracing::debug!(
                        unique_id = %node.unique_id,
                        resource_type = %node.resource_type,
                        "Skipping node that is not rendered as a task"
                    );
                }
                keep
            })
            .collect();

        manifest_nodes.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));

        let known: HashSet<&str> = manifest_nodes
            .iter()
            .map(|node| node.unique_id.as_str())
            .collect();

        let nodes: NodeCollection = manifest_nodes
            .iter()
            .map(|node| {
                let depends_on = node.depends_on.nodes.iter().filter(|dep| {
                    let is_known = known.contains(dep.as_str());
                    if !is_known {
                        tracing::debug!(
                            unique_id = %node.unique_id,
                            dependency = %dep,
                            "Dropping dependency outside the rendered nodes"
                        );
                    }
                    is_known
                });

                DbtNode {
                    unique_id: node.unique_id.clone(),
                    name: node.name.clone(),
                    resource_type: DbtResourceType::from(node.resource_type.as_str()),
                    depends_on: depends_on.cloned().collect(),
                    file_path: PathBuf::from(&node.original_file_path),
                    tags: node.tags.iter().cloned().collect(),
                    config: node.config.to_map(),
                }
            })
            .collect();

        nodes.topologically_sorted().ok_or(ManifestError::Cycle)
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub dbt_schema_version: String,
    pub dbt_version: String,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: String,

    /// Node name (e.g., "users")
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    pub resource_type: String,

    /// Original file path
    #[serde(default)]
    pub original_file_path: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Node configuration
    #[serde(default)]
    pub config: NodeConfig,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,
}

/// Node configuration (from dbt_project.yml or model config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Whether the node is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Materialization type
    #[serde(default)]
    pub materialized: Option<String>,

    /// Every other config key, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            materialized: None,
            extra: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    fn to_map(&self) -> BTreeMap<String, Value> {
        let mut config = self.extra.clone();
        if let Some(materialized) = &self.materialized {
            config.insert("materialized".to_string(), Value::String(materialized.clone()));
        }
        config
    }
}

fn default_true() -> bool {
    true
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),

    #[error("Manifest dependency graph contains a cycle")]
    Cycle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"{
        "metadata": {
            "dbt_schema_version": "https://schemas.getdbt.com/dbt/manifest/v10.json",
            "dbt_version": "1.7.0",
            "project_name": "jaffle_shop"
        },
        "nodes": {
            "model.jaffle_shop.orders": {
                "unique_id": "model.jaffle_shop.orders",
                "name": "orders",
                "resource_type": "model",
                "original_file_path": "models/orders.sql",
                "tags": ["nightly"],
                "config": {"enabled": true, "materialized": "table", "schema": "marts"},
                "depends_on": {"nodes": ["model.jaffle_shop.stg_orders", "source.jaffle_shop.raw.payments"]}
            },
            "model.jaffle_shop.stg_orders": {
                "unique_id": "model.jaffle_shop.stg_orders",
                "name": "stg_orders",
                "resource_type": "model",
                "original_file_path": "models/staging/stg_orders.sql",
                "config": {"materialized": "view"},
                "depends_on": {"nodes": ["seed.jaffle_shop.raw_orders"]}
            },
            "seed.jaffle_shop.raw_orders": {
                "unique_id": "seed.jaffle_shop.raw_orders",
                "name": "raw_orders",
                "resource_type": "seed",
                "original_file_path": "seeds/raw_orders.csv"
            },
            "test.jaffle_shop.not_null_orders_id": {
                "unique_id": "test.jaffle_shop.not_null_orders_id",
                "name": "not_null_orders_id",
                "resource_type": "test",
                "depends_on": {"nodes": ["model.jaffle_shop.orders"]}
            },
            "analysis.jaffle_shop.revenue": {
                "unique_id": "analysis.jaffle_shop.revenue",
                "name": "revenue",
                "resource_type": "analysis",
                "depends_on": {"nodes": ["model.jaffle_shop.orders"]}
            },
            "model.jaffle_shop.legacy": {
                "unique_id": "model.jaffle_shop.legacy",
                "name": "legacy",
                "resource_type": "model",
                "config": {"enabled": false}
            }
        }
    }"#;

    #[test]
    fn parse_manifest() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();

        assert_eq!(manifest.metadata.dbt_version, "1.7.0");
        assert_eq!(manifest.metadata.project_name.as_deref(), Some("jaffle_shop"));

        let orders = manifest.get_node("model.jaffle_shop.orders").unwrap();
        assert_eq!(orders.config.materialized.as_deref(), Some("table"));
        assert_eq!(orders.config.extra.get("schema"), Some(&Value::from("marts")));
        assert!(!manifest.get_node("model.jaffle_shop.legacy").unwrap().config.enabled);
    }

    #[test]
    fn convert_to_ordered_nodes() {
        let nodes = Manifest::from_json(MANIFEST).unwrap().to_nodes().unwrap();

        assert_eq!(
            nodes.ids().collect::<Vec<_>>(),
            vec![
                "seed.jaffle_shop.raw_orders",
                "model.jaffle_shop.stg_orders",
                "model.jaffle_shop.orders",
                "test.jaffle_shop.not_null_orders_id",
            ]
        );

        let orders = nodes.get("model.jaffle_shop.orders").unwrap();
        assert_eq!(orders.depends_on, vec!["model.jaffle_shop.stg_orders".to_string()]);
        assert_eq!(orders.file_path, PathBuf::from("models/orders.sql"));
        assert_eq!(orders.materialized(), Some("table"));
        assert!(orders.has_tag("nightly"));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(
            Manifest::from_json("{\"nodes\": []}"),
            Err(ManifestError::ParseError(_))
        ));
    }

    #[test]
    fn cyclic_manifest_is_rejected() {
        let manifest = Manifest::from_json(
            r#"{
                "metadata": {"dbt_schema_version": "v10", "dbt_version": "1.7.0"},
                "nodes": {
                    "model.p.a": {"unique_id": "model.p.a", "name": "a", "resource_type": "model",
                                  "depends_on": {"nodes": ["model.p.b"]}},
                    "model.p.b": {"unique_id": "model.p.b", "name": "b", "resource_type": "model",
                                  "depends_on": {"nodes": ["model.p.a"]}}
                }
            }"#,
        )
        .unwrap();

        assert!(matches!(manifest.to_nodes(), Err(ManifestError::Cycle)));
    }
}
