//! Cosmos Core
//!
//! Shared vocabulary for rendering dbt projects as orchestrator task graphs:
//! resource kinds, execution modes, test placement, configuration and errors.

pub mod constants;
pub mod config;
pub mod error;

pub use constants::{DbtResourceType, ExecutionMode, TestBehavior};
pub use config::{CosmosConfig, ExecutionConfig, ProfileConfig, ProjectConfig, RenderConfig, ConfigError};
pub use error::{CosmosError, Result};

/// Argument mapping handed to a task implementation's constructor
pub type TaskArgs = serde_json::Map<String, serde_json::Value>;
