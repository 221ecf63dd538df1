//! Cosmos Airflow rendering
//!
//! Turns a dbt node collection into an Airflow task graph description:
//! - Operator class resolution per execution mode
//! - Task metadata for dbt run/seed/snapshot/test tasks
//! - Leaf calculation
//! - Graph assembly with test placement (after each node, after all, none)

pub mod operator;
pub mod metadata;
pub mod dag;
pub mod graph;

pub use operator::calculate_operator_class;
pub use metadata::{create_task_metadata, create_test_task_metadata, TaskMetadata};
pub use dag::{Edge, GraphUnit, Task, TaskGraph, TaskGroup, UnitRef};
pub use graph::{build_airflow_graph, calculate_leaves};
