//! Operator class resolution

use cosmos_core::ExecutionMode;

/// Python package that provides the operators
pub const OPERATOR_PACKAGE: &str = "cosmos";

/// Fully qualified operator reference for a dbt command in an execution mode
///
/// `("DbtSeed", Kubernetes)` resolves to
/// `cosmos.operators.kubernetes.DbtSeedKubernetesOperator`.
pub fn calculate_operator_class(execution_mode: ExecutionMode, dbt_class: &str) -> String {
    format!(
        "{}.operators.{}.{}{}Operator",
        OPERATOR_PACKAGE,
        execution_mode.as_str(),
        dbt_class,
        execution_mode.title_case()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubernetes_seed() {
        assert_eq!(
            calculate_operator_class(ExecutionMode::Kubernetes, "DbtSeed"),
            "cosmos.operators.kubernetes.DbtSeedKubernetesOperator"
        );
    }

    #[test]
    fn every_mode_uses_its_own_module() {
        assert_eq!(
            calculate_operator_class(ExecutionMode::Local, "DbtRun"),
            "cosmos.operators.local.DbtRunLocalOperator"
        );
        assert_eq!(
            calculate_operator_class(ExecutionMode::Docker, "DbtTest"),
            "cosmos.operators.docker.DbtTestDockerOperator"
        );
        assert_eq!(
            calculate_operator_class(ExecutionMode::Virtualenv, "DbtSnapshot"),
            "cosmos.operators.virtualenv.DbtSnapshotVirtualenvOperator"
        );
    }
}
