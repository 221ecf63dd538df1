//! Configuration schema (cosmos.toml)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use crate::constants::{ExecutionMode, TestBehavior};
use crate::TaskArgs;

/// Location and identity of the dbt project being rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Path to the dbt project directory
    pub dbt_project: PathBuf,

    /// Path to a pre-compiled manifest.json (default: <dbt_project>/target/manifest.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,

    /// Explicit project name (default: directory name of `dbt_project`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            dbt_project: PathBuf::from("."),
            manifest_path: None,
            project_name: None,
        }
    }
}

impl ProjectConfig {
    /// Create a project config pointing at a dbt project directory
    pub fn new(dbt_project: impl Into<PathBuf>) -> Self {
        Self {
            dbt_project: dbt_project.into(),
            ..Self::default()
        }
    }

    /// Name used for project-scoped tasks such as the aggregate test task
    pub fn project_name(&self) -> String {
        if let Some(name) = &self.project_name {
            return name.clone();
        }

        self.dbt_project
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dbt_project".to_string())
    }

    /// Resolved manifest location
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.dbt_project.join("target").join("manifest.json"))
    }
}

/// dbt profile selection (credentials are resolved by the orchestrator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub profile_name: String,

    pub target_name: String,

    /// Path to an existing profiles.yml
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_profiles_yml: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_name: "default".to_string(),
            target_name: "dev".to_string(),
            path_to_profiles_yml: None,
        }
    }
}

/// How the task graph is shaped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Test placement policy
    #[serde(default)]
    pub test_behavior: TestBehavior,

    /// Node selectors to include (`tag:<name>`, `path:<prefix>`); empty keeps everything
    #[serde(default)]
    pub select: Vec<String>,

    /// Node selectors to exclude, applied after `select`
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Which operator family runs the dbt commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosmosConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Extra constructor arguments passed verbatim to every task
    #[serde(default)]
    pub operator_args: TaskArgs,
}

impl CosmosConfig {
    /// Load config from TOML file
    ///
    /// A relative `dbt_project` is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            if config.project.dbt_project.is_relative() {
                config.project.dbt_project = parent.join(&config.project.dbt_project);
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Arguments shared by every produced task
    ///
    /// `operator_args` first, then the project and profile settings, which
    /// win on key collisions.
    pub fn task_args(&self) -> TaskArgs {
        let mut args = self.operator_args.clone();

        args.insert(
            "project_dir".to_string(),
            Value::String(self.project.dbt_project.display().to_string()),
        );
        args.insert(
            "profile_name".to_string(),
            Value::String(self.profile.profile_name.clone()),
        );
        args.insert(
            "target_name".to_string(),
            Value::String(self.profile.target_name.clone()),
        );

        if let Some(profiles_yml) = &self.profile.path_to_profiles_yml {
            args.insert(
                "profiles_yml_filepath".to_string(),
                Value::String(profiles_yml.display().to_string()),
            );
        }

        args
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
