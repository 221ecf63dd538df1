//! Errors raised while turning a node collection into a task graph
//!
//! Every variant aborts the whole build; no partial graph is ever returned.

/// Result type alias using CosmosError
pub type Result<T> = std::result::Result<T, CosmosError>;

/// Graph construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CosmosError {
    /// A node kind that cannot be rendered as a task
    #[error("Unsupported resource type '{resource_type}' for node '{unique_id}'")]
    UnsupportedResourceType {
        unique_id: String,
        resource_type: String,
    },

    #[error("Unknown execution mode: {0}")]
    UnknownExecutionMode(String),

    #[error("Unknown test behavior: {0}")]
    UnknownTestBehavior(String),

    /// A `depends_on` entry that does not resolve inside the node collection
    #[error("Node '{node}' depends on '{dependency}', which is not in the node collection")]
    MissingDependency { node: String, dependency: String },

    #[error("Task id '{0}' is already used in this graph")]
    DuplicateTaskId(String),

    #[error("Task group '{0}' already exists in this graph")]
    DuplicateGroupId(String),

    #[error("Unknown graph unit '{0}'")]
    UnknownUnit(String),

    #[error("Invalid selector '{0}': expected 'tag:<name>' or 'path:<prefix>'")]
    InvalidSelector(String),
}

impl CosmosError {
    /// Create an unsupported resource type error for a node
    pub fn unsupported(unique_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self::UnsupportedResourceType {
            unique_id: unique_id.into(),
            resource_type: resource_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_names_node() {
        let err = CosmosError::unsupported("analysis.proj.a", "analysis");
        assert_eq!(
            err.to_string(),
            "Unsupported resource type 'analysis' for node 'analysis.proj.a'"
        );
    }
}
