//! Graph assembly: dbt nodes in, Airflow task graph out
//!
//! Nodes are visited in collection order, which callers keep topologically
//! consistent. Edges are wired only after every task exists, so correctness
//! does not depend on that order.

use cosmos_core::{CosmosConfig, CosmosError, ExecutionMode, Result, TaskArgs, TestBehavior};
use cosmos_dbt::{DbtNode, NodeCollection};
use std::collections::{HashMap, HashSet};
use crate::dag::{Task, TaskGraph, UnitRef};
use crate::metadata::{create_task_metadata, create_test_task_metadata};

/// Ids among `task_ids` that no other node among `task_ids` depends on
///
/// Output follows the order of `task_ids`. Ids missing from `nodes` are skipped.
pub fn calculate_leaves<'a, I>(task_ids: I, nodes: &NodeCollection) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let materialized: Vec<&DbtNode> = task_ids
        .into_iter()
        .filter_map(|id| nodes.get(id))
        .collect();

    let parents: HashSet<&str> = materialized
        .iter()
        .flat_map(|node| node.depends_on.iter().map(String::as_str))
        .collect();

    materialized
        .iter()
        .filter(|node| !parents.contains(node.unique_id.as_str()))
        .map(|node| node.unique_id.clone())
        .collect()
}

/// Build the task graph for a node collection
///
/// `task_args` are merged into every task's arguments. The whole build fails
/// on the first node that cannot be rendered or dependency that does not
/// resolve; no partial graph is returned.
pub fn build_airflow_graph(
    nodes: &NodeCollection,
    config: &CosmosConfig,
    task_args: &TaskArgs,
) -> Result<TaskGraph> {
    GraphAssembler {
        nodes,
        execution_mode: config.execution.execution_mode,
        test_behavior: config.render.test_behavior,
        project_name: config.project.project_name(),
        task_args,
    }
    .assemble()
}

struct GraphAssembler<'a> {
    nodes: &'a NodeCollection,
    execution_mode: ExecutionMode,
    test_behavior: TestBehavior,
    project_name: String,
    task_args: &'a TaskArgs,
}

impl<'a> GraphAssembler<'a> {
    fn assemble(&self) -> Result<TaskGraph> {
        self.check_dependencies()?;

        let dependents = self.nodes.children_map();
        let mut graph = TaskGraph::new();

        // node id -> the unit standing for it in the graph
        let mut units: HashMap<&str, UnitRef> = HashMap::new();
        let mut unit_order: Vec<&str> = Vec::new();

        for node in self.nodes {
            if node.is_test() {
                continue;
            }

            let tests: Vec<&DbtNode> = dependents
                .get(node.unique_id.as_str())
                .map(|children| children.iter().copied().filter(|child| child.is_test()).collect())
                .unwrap_or_default();

            let unit = self.add_node(&mut graph, node, &tests)?;
            units.insert(node.unique_id.as_str(), unit);
            unit_order.push(node.unique_id.as_str());
        }

        for node in self.nodes {
            let Some(unit) = units.get(node.unique_id.as_str()) else {
                continue;
            };
            for dep in &node.depends_on {
                if let Some(upstream) = units.get(dep.as_str()) {
                    graph.set_downstream(upstream, unit)?;
                }
            }
        }

        let leaves = calculate_leaves(unit_order.iter().copied(), self.nodes);

        if self.test_behavior == TestBehavior::AfterAll {
            let test_count = self.nodes.iter().filter(|node| node.is_test()).count();
            let metadata = create_test_task_metadata(
                &format!("{}_test", self.project_name),
                self.execution_mode,
                self.task_args,
                None,
            );
            let test_task = graph.add_task(Task::from_metadata(metadata, None))?;

            for id in &unit_order {
                graph.set_downstream(&units[id], &test_task)?;
            }
            graph.mark_terminal(test_task.id())?;

            tracing::debug!(task_id = test_task.id(), tests = test_count, "Added project-wide test task");
        } else {
            for leaf in &leaves {
                let exits = graph.unit(&units[leaf.as_str()])?.exit_task_ids(&graph);
                for task_id in exits {
                    graph.mark_terminal(&task_id)?;
                }
            }
        }

        tracing::info!(
            nodes = self.nodes.len(),
            tasks = graph.tasks().len(),
            groups = graph.groups().len(),
            edges = graph.edges().len(),
            test_behavior = %self.test_behavior,
            execution_mode = %self.execution_mode,
            "Built task graph"
        );

        Ok(graph)
    }

    /// Every `depends_on` entry must resolve inside the collection
    fn check_dependencies(&self) -> Result<()> {
        for node in self.nodes {
            if let Some(dep) = node.depends_on.iter().find(|dep| !self.nodes.contains(dep)) {
                return Err(CosmosError::MissingDependency {
                    node: node.unique_id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    /// Add the task for one node, grouped with its test task when tests run after each node
    fn add_node(&self, graph: &mut TaskGraph, node: &DbtNode, tests: &[&DbtNode]) -> Result<UnitRef> {
        let metadata = create_task_metadata(node, self.execution_mode, self.task_args)?;

        if self.test_behavior != TestBehavior::AfterEach || tests.is_empty() {
            return graph.add_task(Task::from_metadata(metadata, None));
        }

        let test_node_ids = tests.iter().map(|test| test.unique_id.clone()).collect();
        let group = graph.add_group(&node.name, test_node_ids)?;

        let run = graph.add_task(Task::from_metadata(metadata, Some(node.name.as_str())))?;
        let test_metadata = create_test_task_metadata(
            &format!("{}_test", node.name),
            self.execution_mode,
            self.task_args,
            Some(node.name.as_str()),
        );
        let test = graph.add_task(Task::from_metadata(test_metadata, Some(node.name.as_str())))?;
        graph.set_downstream(&run, &test)?;

        Ok(group)
    }
}
