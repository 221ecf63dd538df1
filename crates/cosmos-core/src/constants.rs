//! Resource kinds, execution modes and test placement
//!
//! The string forms of these enums appear in manifests, config files and
//! operator references, so they are stable.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::CosmosError;

/// Kind of a dbt node
///
/// Anything dbt emits that is not one of the four kinds rendered as tasks is
/// kept verbatim in `Other` so it can be reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DbtResourceType {
    /// SQL model (`dbt run`)
    Model,

    /// CSV seed (`dbt seed`)
    Seed,

    /// Snapshot (`dbt snapshot`)
    Snapshot,

    /// Data test (`dbt test`)
    Test,

    /// Any other resource type (analysis, operation, ...)
    Other(String),
}

impl DbtResourceType {
    /// Stable lowercase identifier, as written by dbt
    pub fn as_str(&self) -> &str {
        match self {
            Self::Model => "model",
            Self::Seed => "seed",
            Self::Snapshot => "snapshot",
            Self::Test => "test",
            Self::Other(other) => other,
        }
    }

    /// Whether nodes of this kind are rendered as their own task
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Model | Self::Seed | Self::Snapshot)
    }
}

impl From<&str> for DbtResourceType {
    fn from(value: &str) -> Self {
        match value {
            "model" => Self::Model,
            "seed" => Self::Seed,
            "snapshot" => Self::Snapshot,
            "test" => Self::Test,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DbtResourceType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DbtResourceType> for String {
    fn from(value: DbtResourceType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for DbtResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the dbt commands of the produced tasks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// dbt installed alongside the orchestrator
    #[default]
    Local,

    /// dbt inside a Docker container
    Docker,

    /// dbt inside a Kubernetes pod
    Kubernetes,

    /// dbt in a per-task Python virtualenv
    Virtualenv,
}

impl ExecutionMode {
    /// Lowercase name, used as the operator module name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::Virtualenv => "virtualenv",
        }
    }

    /// Title-case name, used as the operator class suffix
    pub fn title_case(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Docker => "Docker",
            Self::Kubernetes => "Kubernetes",
            Self::Virtualenv => "Virtualenv",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = CosmosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "docker" => Ok(Self::Docker),
            "kubernetes" => Ok(Self::Kubernetes),
            "virtualenv" => Ok(Self::Virtualenv),
            _ => Err(CosmosError::UnknownExecutionMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where validation tasks are placed relative to the tasks they check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestBehavior {
    /// No validation tasks at all
    None,

    /// Each tested node gets a group: its task followed by its test task
    #[default]
    AfterEach,

    /// One project-wide test task after every other task
    AfterAll,
}

impl TestBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AfterEach => "after_each",
            Self::AfterAll => "after_all",
        }
    }
}

impl FromStr for TestBehavior {
    type Err = CosmosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "after_each" => Ok(Self::AfterEach),
            "after_all" => Ok(Self::AfterAll),
            _ => Err(CosmosError::UnknownTestBehavior(s.to_string())),
        }
    }
}

impl std::fmt::Display for TestBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_from_dbt_strings() {
        assert_eq!(DbtResourceType::from("model"), DbtResourceType::Model);
        assert_eq!(DbtResourceType::from("snapshot"), DbtResourceType::Snapshot);
        assert_eq!(
            DbtResourceType::from("analysis"),
            DbtResourceType::Other("analysis".to_string())
        );
    }

    #[test]
    fn resource_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&DbtResourceType::Seed).unwrap();
        assert_eq!(json, "\"seed\"");

        let parsed: DbtResourceType = serde_json::from_str("\"operation\"").unwrap();
        assert_eq!(parsed, DbtResourceType::Other("operation".to_string()));
        assert!(!parsed.is_runnable());
    }

    #[test]
    fn execution_mode_names() {
        assert_eq!(ExecutionMode::Kubernetes.as_str(), "kubernetes");
        assert_eq!(ExecutionMode::Kubernetes.title_case(), "Kubernetes");
        assert_eq!("DOCKER".parse::<ExecutionMode>().unwrap(), ExecutionMode::Docker);
    }

    #[test]
    fn unknown_execution_mode_is_rejected() {
        let err = "ssh".parse::<ExecutionMode>().unwrap_err();
        assert!(matches!(err, CosmosError::UnknownExecutionMode(mode) if mode == "ssh"));
    }

    #[test]
    fn test_behavior_parsing() {
        assert_eq!("after-all".parse::<TestBehavior>().unwrap(), TestBehavior::AfterAll);
        assert_eq!("none".parse::<TestBehavior>().unwrap(), TestBehavior::None);
        assert_eq!(TestBehavior::default(), TestBehavior::AfterEach);
        assert!("sometimes".parse::<TestBehavior>().is_err());
    }
}
