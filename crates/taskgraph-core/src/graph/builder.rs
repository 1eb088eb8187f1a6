use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GraphError, Result};
use crate::record::TaskRecord;
use crate::state::{StateRegistry, TaskState};

use super::{Edge, TaskGraph, TaskNode};

/// Turns a flat snapshot of task records into a task graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    registry: StateRegistry,
}

impl GraphBuilder {
    /// Create a builder resolving attributes through the given registry.
    pub fn new(registry: StateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    /// Build the graph for one snapshot.
    ///
    /// Fails on the first unknown state or repeated task id; no partial graph
    /// is ever returned. Dependencies on ids absent from the snapshot are
    /// dropped and counted in [`TaskGraph::dangling`]. Nodes and edges come
    /// out sorted by id.
    pub fn build<I>(&self, records: I) -> Result<TaskGraph>
    where
        I: IntoIterator<Item = TaskRecord>,
    {
        let mut index: BTreeMap<String, TaskNode> = BTreeMap::new();

        for record in records {
            let state: TaskState = record.state.parse()?;
            let attributes = self.registry.attributes_for(state);

            if index.contains_key(&record.id) {
                return Err(GraphError::DuplicateTaskId(record.id));
            }

            index.insert(
                record.id.clone(),
                TaskNode {
                    record,
                    state,
                    attributes,
                },
            );
        }

        let mut edges = BTreeSet::new();
        let mut dangling = 0;

        for node in index.values() {
            let dependencies: BTreeSet<&str> =
                node.record.depends_on.iter().map(String::as_str).collect();

            for dependency in dependencies {
                if index.contains_key(dependency) {
                    edges.insert(Edge::between_tasks(dependency, node.id()));
                } else {
                    dangling += 1;
                    tracing::trace!(
                        task_id = %node.id(),
                        dependency = %dependency,
                        "Dropping dangling dependency"
                    );
                }
            }
        }

        if dangling > 0 {
            tracing::debug!(dangling, "Snapshot references tasks outside the retained window");
        }

        Ok(TaskGraph {
            nodes: index.into_values().collect(),
            edges: edges.into_iter().collect(),
            dangling,
        })
    }
}
