//! Task metadata: what to instantiate for a node and with which arguments

use cosmos_core::{CosmosError, DbtResourceType, ExecutionMode, Result, TaskArgs};
use cosmos_dbt::DbtNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::operator::calculate_operator_class;

/// dbt class of the validation operator
const DBT_TEST_CLASS: &str = "DbtTest";

/// Everything needed to instantiate one task in the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Task identifier, unique within the produced graph
    pub id: String,

    /// Fully qualified operator reference
    pub operator_class: String,

    /// Operator constructor arguments
    pub arguments: TaskArgs,
}

/// Task id suffix and dbt operator class for a resource kind
fn dbt_task_kind(resource_type: &DbtResourceType) -> Option<(&'static str, &'static str)> {
    match resource_type {
        DbtResourceType::Model => Some(("run", "DbtRun")),
        DbtResourceType::Seed => Some(("seed", "DbtSeed")),
        DbtResourceType::Snapshot => Some(("snapshot", "DbtSnapshot")),
        DbtResourceType::Test => Some(("test", DBT_TEST_CLASS)),
        DbtResourceType::Other(_) => None,
    }
}

fn with_models(task_args: &TaskArgs, model_name: &str) -> TaskArgs {
    let mut arguments = task_args.clone();
    arguments.insert(
        "models".to_string(),
        Value::Array(vec![Value::String(model_name.to_string())]),
    );
    arguments
}

/// Build the metadata of the task that runs a single node
///
/// Fails with `UnsupportedResourceType` for anything but models, seeds,
/// snapshots and tests.
pub fn create_task_metadata(
    node: &DbtNode,
    execution_mode: ExecutionMode,
    args: &TaskArgs,
) -> Result<TaskMetadata> {
    let (suffix, dbt_class) = dbt_task_kind(&node.resource_type)
        .ok_or_else(|| CosmosError::unsupported(&node.unique_id, node.resource_type.as_str()))?;

    Ok(TaskMetadata {
        id: format!("{}_{}", node.name, suffix),
        operator_class: calculate_operator_class(execution_mode, dbt_class),
        arguments: with_models(args, &node.name),
    })
}

/// Build the metadata of a synthesized `dbt test` task
///
/// With a model name the task tests only that model; without one (or with an
/// empty one) it tests the whole project.
pub fn create_test_task_metadata(
    test_task_name: &str,
    execution_mode: ExecutionMode,
    task_args: &TaskArgs,
    model_name: Option<&str>,
) -> TaskMetadata {
    let arguments = match model_name.filter(|name| !name.is_empty()) {
        Some(model_name) => with_models(task_args, model_name),
        None => task_args.clone(),
    };

    TaskMetadata {
        id: test_task_name.to_string(),
        operator_class: calculate_operator_class(execution_mode, DBT_TEST_CLASS),
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(name: &str, resource_type: DbtResourceType) -> DbtNode {
        DbtNode::new(format!("my_folder.{}", name), name, resource_type)
    }

    fn args(value: Value) -> TaskArgs {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    #[test]
    fn model_runs_locally() {
        let metadata = create_task_metadata(
            &node("my_model", DbtResourceType::Model),
            ExecutionMode::Local,
            &TaskArgs::new(),
        )
        .unwrap();

        assert_eq!(metadata.id, "my_model_run");
        assert_eq!(metadata.operator_class, "cosmos.operators.local.DbtRunLocalOperator");
        assert_eq!(metadata.arguments, args(json!({"models": ["my_model"]})));
    }

    #[test]
    fn seed_in_docker() {
        let metadata = create_task_metadata(
            &node("my_seed", DbtResourceType::Seed),
            ExecutionMode::Docker,
            &TaskArgs::new(),
        )
        .unwrap();

        assert_eq!(metadata.id, "my_seed_seed");
        assert_eq!(metadata.operator_class, "cosmos.operators.docker.DbtSeedDockerOperator");
        assert_eq!(metadata.arguments, args(json!({"models": ["my_seed"]})));
    }

    #[test]
    fn snapshot_in_kubernetes() {
        let metadata = create_task_metadata(
            &node("my_snapshot", DbtResourceType::Snapshot),
            ExecutionMode::Kubernetes,
            &TaskArgs::new(),
        )
        .unwrap();

        assert_eq!(metadata.id, "my_snapshot_snapshot");
        assert_eq!(
            metadata.operator_class,
            "cosmos.operators.kubernetes.DbtSnapshotKubernetesOperator"
        );
        assert_eq!(metadata.arguments, args(json!({"models": ["my_snapshot"]})));
    }

    #[test]
    fn standalone_test_node() {
        let metadata = create_task_metadata(
            &node("not_null_orders_id", DbtResourceType::Test),
            ExecutionMode::Local,
            &TaskArgs::new(),
        )
        .unwrap();

        assert_eq!(metadata.id, "not_null_orders_id_test");
        assert_eq!(metadata.operator_class, "cosmos.operators.local.DbtTestLocalOperator");
    }

    #[test]
    fn unsupported_resource_type() {
        let unsupported = DbtNode::new(
            "unsupported",
            "unsupported",
            DbtResourceType::from("unsupported"),
        );

        let err = create_task_metadata(&unsupported, ExecutionMode::Local, &TaskArgs::new())
            .unwrap_err();
        assert_eq!(err, CosmosError::unsupported("unsupported", "unsupported"));
    }

    #[test]
    fn task_args_are_merged() {
        let metadata = create_task_metadata(
            &node("my_model", DbtResourceType::Model),
            ExecutionMode::Local,
            &args(json!({"project_dir": "/srv/dbt", "models": ["stale"]})),
        )
        .unwrap();

        assert_eq!(
            metadata.arguments,
            args(json!({"project_dir": "/srv/dbt", "models": ["my_model"]}))
        );
    }

    #[test]
    fn test_task_for_model() {
        let metadata = create_test_task_metadata(
            "test_no_nulls",
            ExecutionMode::Local,
            &args(json!({"task_arg": "value"})),
            Some("my_model"),
        );

        assert_eq!(metadata.id, "test_no_nulls");
        assert_eq!(metadata.operator_class, "cosmos.operators.local.DbtTestLocalOperator");
        assert_eq!(
            metadata.arguments,
            args(json!({"task_arg": "value", "models": ["my_model"]}))
        );
    }

    #[test]
    fn project_wide_test_task_has_no_models() {
        let task_args = args(json!({"task_arg": "value"}));

        let unscoped = create_test_task_metadata("astro_shop_test", ExecutionMode::Docker, &task_args, None);
        assert_eq!(unscoped.arguments, task_args);
        assert_eq!(unscoped.operator_class, "cosmos.operators.docker.DbtTestDockerOperator");

        let empty = create_test_task_metadata("astro_shop_test", ExecutionMode::Docker, &task_args, Some(""));
        assert_eq!(empty.arguments, task_args);
    }
}
