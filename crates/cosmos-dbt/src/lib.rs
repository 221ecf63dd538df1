//! dbt node model and node collections
//!
//! This crate handles:
//! - The node record every graph build starts from
//! - Ordered node collections (insertion order is traversal order)
//! - Tag/path based node selection
//! - Converting a dbt manifest.json into a node collection

pub mod node;
pub mod dag;
pub mod selector;
pub mod manifest;

pub use node::{DbtNode, NodeId};
pub use dag::NodeCollection;
pub use selector::{select_nodes, Selector};
pub use manifest::{Manifest, ManifestError, ManifestMetadata, ManifestNode, NodeConfig, DependsOn};
