//! Typed task graph: nodes, edges, and the pipeline that produces them.

mod aggregate;
mod builder;

pub use aggregate::GroupAggregator;
pub use builder::GraphBuilder;

use std::fmt;

use serde::Serialize;

use crate::record::TaskRecord;
use crate::state::{StateAttributes, TaskState};

/// Identity of a rendered node.
///
/// Tasks and groups live in separate namespaces, so a task id never collides
/// with a group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NodeId {
    Task(String),
    Group(String),
}

impl NodeId {
    pub fn task(id: impl Into<String>) -> Self {
        Self::Task(id.into())
    }

    pub fn group(key: impl Into<String>) -> Self {
        Self::Group(key.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task:{}", id),
            Self::Group(key) => write!(f, "group:{}", key),
        }
    }
}

/// Directed dependency edge: `from` must finish before `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    /// Edge between two task ids.
    pub fn between_tasks(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(NodeId::task(from), NodeId::task(to))
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A single task with its resolved display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub record: TaskRecord,
    pub state: TaskState,
    pub attributes: StateAttributes,
}

impl TaskNode {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn group_key(&self) -> Option<&str> {
        self.record.effective_group()
    }
}

/// A collapsed cluster of tasks sharing a group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNode {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub aggregate_state: TaskState,
    pub attributes: StateAttributes,
    /// Member task ids, sorted.
    pub members: Vec<String>,
}

/// A node as seen by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Task(TaskNode),
    Group(GroupNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Task(task) => NodeId::task(task.id()),
            Self::Group(group) => NodeId::group(&group.key),
        }
    }

    /// State shown for the node; the aggregate state for groups.
    pub fn state(&self) -> TaskState {
        match self {
            Self::Task(task) => task.state,
            Self::Group(group) => group.aggregate_state,
        }
    }

    /// Number of tasks represented by the node.
    pub fn count(&self) -> usize {
        match self {
            Self::Task(_) => 1,
            Self::Group(group) => group.count,
        }
    }

    pub fn attributes(&self) -> &StateAttributes {
        match self {
            Self::Task(task) => &task.attributes,
            Self::Group(group) => &group.attributes,
        }
    }

    /// Human readable caption: task name (or id) / group label.
    pub fn caption(&self) -> &str {
        match self {
            Self::Task(task) if !task.record.name.is_empty() => &task.record.name,
            Self::Task(task) => task.id(),
            Self::Group(group) => &group.label,
        }
    }

    /// Whether the renderer needs to redraw this node when it reappears
    /// with the same id.
    pub fn differs_from(&self, other: &Node) -> bool {
        self.state() != other.state() || self.count() != other.count()
    }
}

/// Output of the graph builder: one node per record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    pub nodes: Vec<TaskNode>,
    pub edges: Vec<Edge>,
    /// Dependencies dropped because their target was not in the snapshot.
    pub dangling: usize,
}

/// Output of the group aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
