// src/dag/plan.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::task::{TaskId, TaskRef};

/// Output of the resolver: the tasks that still need to run, in an order
/// where every task follows all of its scheduled dependencies.
///
/// Alongside the ordered list the plan keeps a graph over the scheduled
/// tasks (edge `dependency -> dependent`). Node indices equal positions in
/// [`Plan::tasks`], which the concurrent executor relies on.
#[derive(Debug, Clone)]
pub struct Plan {
    goal: TaskId,
    tasks: Vec<TaskRef>,
    graph: DiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
    skipped: Vec<TaskId>,
}

impl Plan {
    pub(crate) fn new(goal: TaskId) -> Self {
        Self {
            goal,
            tasks: Vec::new(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Append a task whose dependencies have all been handled already.
    ///
    /// Dependencies that were found complete are not in the plan and get no
    /// edge.
    pub(crate) fn push(&mut self, task: TaskRef, dependencies: &[TaskId]) {
        let id = task.id();
        let node = self.graph.add_node(id.clone());
        debug_assert_eq!(node.index(), self.tasks.len());

        for dep in dependencies {
            if let Some(&dep_node) = self.index.get(dep) {
                self.graph.update_edge(dep_node, node, ());
            }
        }

        self.index.insert(id, node);
        self.tasks.push(task);
    }

    pub(crate) fn skip(&mut self, id: TaskId) {
        self.skipped.push(id);
    }

    pub fn goal(&self) -> &TaskId {
        &self.goal
    }

    /// Tasks to run, dependencies first.
    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.graph.node_weights().cloned().collect()
    }

    /// Tasks the resolver found complete, in discovery order. Their
    /// dependencies were not examined.
    pub fn skipped(&self) -> &[TaskId] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).map(|node| node.index())
    }

    /// Scheduled dependencies of `id` (complete ones are not listed).
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Scheduled tasks that depend directly on `id`.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbours(id, Direction::Outgoing)
    }

    fn neighbours(&self, id: &TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut found: Vec<TaskId> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        found.sort_by_key(|dep| self.index[dep].index());
        found
    }

    /// Number of unfinished scheduled dependencies per position.
    pub(crate) fn dependency_counts(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect()
    }

    /// Positions of the tasks that depend directly on the task at `position`.
    pub(crate) fn dependent_positions(&self, position: usize) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(position), Direction::Outgoing)
            .map(|n| n.index())
            .collect();
        found.sort_unstable();
        found
    }
}
