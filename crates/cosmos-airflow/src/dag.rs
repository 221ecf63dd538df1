//! Task graph handed to the orchestrator
//!
//! Tasks and task groups are both addressable graph units. Wiring a unit
//! downstream of another connects the exit tasks of the upstream unit to the
//! entry tasks of the downstream unit, the way Airflow resolves `group >> task`.

use cosmos_core::{CosmosError, Result, TaskArgs};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use crate::metadata::TaskMetadata;

/// Reference to a task or task group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum UnitRef {
    Task(String),
    Group(String),
}

impl UnitRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Task(id) | Self::Group(id) => id,
        }
    }
}

/// A directed edge between two units
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub upstream: UnitRef,
    pub downstream: UnitRef,
}

/// One operator instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Full task id (`<group_id>.<id>` inside a group)
    pub task_id: String,

    pub operator_class: String,

    pub arguments: TaskArgs,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl Task {
    /// Instantiate task metadata, optionally inside a group
    pub fn from_metadata(metadata: TaskMetadata, group_id: Option<&str>) -> Self {
        let task_id = match group_id {
            Some(group_id) => format!("{}.{}", group_id, metadata.id),
            None => metadata.id,
        };

        Self {
            task_id,
            operator_class: metadata.operator_class,
            arguments: metadata.arguments,
            group_id: group_id.map(str::to_string),
        }
    }
}

/// A node's task bundled with its validation task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub group_id: String,

    /// Member task ids in insertion order
    pub children: Vec<String>,

    /// Test nodes validated inside this group, in node order
    pub test_node_ids: Vec<String>,
}

/// Something edges can point at
pub trait GraphUnit {
    fn unit_id(&self) -> &str;

    /// Task ids making up this unit
    fn member_task_ids(&self) -> Vec<&str>;

    /// Members with no upstream inside the unit; incoming edges land here
    fn entry_task_ids(&self, graph: &TaskGraph) -> Vec<String> {
        let members = self.member_task_ids();
        members
            .iter()
            .filter(|id| !graph.direct_upstream(id).iter().any(|up| members.contains(&up.as_str())))
            .map(|id| id.to_string())
            .collect()
    }

    /// Members with no downstream inside the unit; outgoing edges leave from here
    fn exit_task_ids(&self, graph: &TaskGraph) -> Vec<String> {
        let members = self.member_task_ids();
        members
            .iter()
            .filter(|id| !graph.direct_downstream(id).iter().any(|down| members.contains(&down.as_str())))
            .map(|id| id.to_string())
            .collect()
    }

    /// Tasks outside the unit that members depend on directly
    fn upstream_task_ids(&self, graph: &TaskGraph) -> BTreeSet<String> {
        let members = self.member_task_ids();
        members
            .iter()
            .flat_map(|id| graph.direct_upstream(id))
            .filter(|up| !members.contains(&up.as_str()))
            .cloned()
            .collect()
    }

    /// Tasks outside the unit that depend directly on members
    fn downstream_task_ids(&self, graph: &TaskGraph) -> BTreeSet<String> {
        let members = self.member_task_ids();
        members
            .iter()
            .flat_map(|id| graph.direct_downstream(id))
            .filter(|down| !members.contains(&down.as_str()))
            .cloned()
            .collect()
    }
}

impl GraphUnit for Task {
    fn unit_id(&self) -> &str {
        &self.task_id
    }

    fn member_task_ids(&self) -> Vec<&str> {
        vec![self.task_id.as_str()]
    }
}

impl GraphUnit for TaskGroup {
    fn unit_id(&self) -> &str {
        &self.group_id
    }

    fn member_task_ids(&self) -> Vec<&str> {
        self.children.iter().map(String::as_str).collect()
    }
}

/// Tasks, groups and the edges between them
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskGraph {
    tasks: Vec<Task>,

    groups: Vec<TaskGroup>,

    edges: Vec<Edge>,

    /// Task ids the graph ends with
    terminals: Vec<String>,

    #[serde(skip)]
    task_index: HashMap<String, usize>,

    #[serde(skip)]
    group_index: HashMap<String, usize>,

    /// Task-level reverse edges: task -> tasks it waits for
    #[serde(skip)]
    upstream: HashMap<String, Vec<String>>,

    /// Task-level forward edges: task -> tasks waiting for it
    #[serde(skip)]
    downstream: HashMap<String, Vec<String>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; a task with a `group_id` joins that (existing) group
    pub fn add_task(&mut self, task: Task) -> Result<UnitRef> {
        if self.task_index.contains_key(&task.task_id) {
            return Err(CosmosError::DuplicateTaskId(task.task_id));
        }

        if let Some(group_id) = &task.group_id {
            let position = *self
                .group_index
                .get(group_id)
                .ok_or_else(|| CosmosError::UnknownUnit(group_id.clone()))?;
            self.groups[position].children.push(task.task_id.clone());
        }

        tracing::debug!(task_id = %task.task_id, operator = %task.operator_class, "Added task");

        let unit = UnitRef::Task(task.task_id.clone());
        self.task_index.insert(task.task_id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(unit)
    }

    /// Add an empty group
    pub fn add_group(&mut self, group_id: &str, test_node_ids: Vec<String>) -> Result<UnitRef> {
        if self.group_index.contains_key(group_id) {
            return Err(CosmosError::DuplicateGroupId(group_id.to_string()));
        }

        self.group_index.insert(group_id.to_string(), self.groups.len());
        self.groups.push(TaskGroup {
            group_id: group_id.to_string(),
            children: Vec::new(),
            test_node_ids,
        });
        Ok(UnitRef::Group(group_id.to_string()))
    }

    /// Resolve a unit reference
    pub fn unit(&self, unit: &UnitRef) -> Result<&dyn GraphUnit> {
        let resolved: Option<&dyn GraphUnit> = match unit {
            UnitRef::Task(id) => self.task(id).map(|task| task as &dyn GraphUnit),
            UnitRef::Group(id) => self.group(id).map(|group| group as &dyn GraphUnit),
        };
        resolved.ok_or_else(|| CosmosError::UnknownUnit(unit.id().to_string()))
    }

    /// Make `downstream` wait for `upstream`
    pub fn set_downstream(&mut self, upstream: &UnitRef, downstream: &UnitRef) -> Result<()> {
        let exits = self.unit(upstream)?.exit_task_ids(self);
        let entries = self.unit(downstream)?.entry_task_ids(self);

        for from in &exits {
            for to in &entries {
                let children = self.downstream.entry(from.clone()).or_default();
                if !children.contains(to) {
                    children.push(to.clone());
                    self.upstream.entry(to.clone()).or_default().push(from.clone());
                }
            }
        }

        let edge = Edge {
            upstream: upstream.clone(),
            downstream: downstream.clone(),
        };
        if !self.edges.contains(&edge) {
            tracing::debug!(upstream = upstream.id(), downstream = downstream.id(), "Wired edge");
            self.edges.push(edge);
        }

        Ok(())
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.task_index.get(task_id).map(|&position| &self.tasks[position])
    }

    pub fn group(&self, group_id: &str) -> Option<&TaskGroup> {
        self.group_index.get(group_id).map(|&position| &self.groups[position])
    }

    /// Tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Groups in insertion order
    pub fn groups(&self) -> &[TaskGroup] {
        &self.groups
    }

    /// Unit-level edges in wiring order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Tasks a task waits for directly
    pub fn direct_upstream(&self, task_id: &str) -> &[String] {
        self.upstream.get(task_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Tasks waiting directly for a task
    pub fn direct_downstream(&self, task_id: &str) -> &[String] {
        self.downstream.get(task_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Upstream task ids of a task or group
    pub fn upstream_task_ids(&self, unit: &UnitRef) -> Result<BTreeSet<String>> {
        Ok(self.unit(unit)?.upstream_task_ids(self))
    }

    /// Downstream task ids of a task or group
    pub fn downstream_task_ids(&self, unit: &UnitRef) -> Result<BTreeSet<String>> {
        Ok(self.unit(unit)?.downstream_task_ids(self))
    }

    /// Tasks nothing depends on, in insertion order
    pub fn leaves(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.direct_downstream(&task.task_id).is_empty())
            .collect()
    }

    /// Tasks that depend on nothing, in insertion order
    pub fn roots(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.direct_upstream(&task.task_id).is_empty())
            .collect()
    }

    /// Record a task the graph ends with
    pub fn mark_terminal(&mut self, task_id: &str) -> Result<()> {
        if !self.task_index.contains_key(task_id) {
            return Err(CosmosError::UnknownUnit(task_id.to_string()));
        }
        if !self.terminals.iter().any(|id| id == task_id) {
            self.terminals.push(task_id.to_string());
        }
        Ok(())
    }

    /// Terminal task ids, in the order they were marked
    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    /// Task ids in dependency order
    ///
    /// Among ready tasks the earliest inserted goes first, so the result is
    /// deterministic. Returns `None` if the edges contain a cycle.
    pub fn topological_sort(&self) -> Option<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .tasks
            .iter()
            .map(|task| self.direct_upstream(&task.task_id).len())
            .collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(position, _)| position)
            .collect();

        let mut result = Vec::with_capacity(self.tasks.len());

        while let Some(position) = ready.pop_first() {
            let task_id = &self.tasks[position].task_id;
            result.push(task_id.clone());

            for child in self.direct_downstream(task_id) {
                if let Some(&child_position) = self.task_index.get(child) {
                    in_degree[child_position] -= 1;
                    if in_degree[child_position] == 0 {
                        ready.insert(child_position);
                    }
                }
            }
        }

        if result.len() == self.tasks.len() {
            Some(result)
        } else {
            None
        }
    }
}
