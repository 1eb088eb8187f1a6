use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::state::{StateRegistry, TaskState};

use super::{Edge, GroupNode, GroupedGraph, Node, NodeId, TaskGraph, TaskNode};

/// Folds tasks sharing a group key into collapsed group nodes.
#[derive(Debug, Clone, Default)]
pub struct GroupAggregator {
    registry: StateRegistry,
    /// Group keys whose members are shown individually.
    expanded: HashSet<String>,
}

impl GroupAggregator {
    pub fn new(registry: StateRegistry) -> Self {
        Self {
            registry,
            expanded: HashSet::new(),
        }
    }

    /// Keep the members of these groups as individual task nodes.
    pub fn with_expanded<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expanded.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// Collapse grouped tasks and rewrite edges onto the surviving nodes.
    ///
    /// Edges that become self-loops are dropped and edges collapsing onto the
    /// same pair are merged. Groups come out sorted by key after the
    /// pass-through tasks.
    pub fn aggregate(&self, graph: TaskGraph) -> GroupedGraph {
        let mut nodes = Vec::with_capacity(graph.nodes.len());
        let mut groups: BTreeMap<String, Vec<TaskNode>> = BTreeMap::new();
        let mut absorbed: HashMap<String, NodeId> = HashMap::new();

        for task in graph.nodes {
            let collapsed_key = task
                .group_key()
                .filter(|key| !self.is_expanded(key))
                .map(str::to_string);

            match collapsed_key {
                Some(key) => {
                    absorbed.insert(task.id().to_string(), NodeId::group(&key));
                    groups.entry(key).or_default().push(task);
                }
                None => nodes.push(Node::Task(task)),
            }
        }

        let group_count = groups.len();
        for (key, members) in groups {
            nodes.push(Node::Group(self.collapse(key, members)));
        }

        let rewrite = |id: NodeId| -> NodeId {
            if let NodeId::Task(task_id) = &id {
                if let Some(group) = absorbed.get(task_id) {
                    return group.clone();
                }
            }
            id
        };

        let edges: BTreeSet<Edge> = graph
            .edges
            .into_iter()
            .map(|edge| Edge::new(rewrite(edge.from), rewrite(edge.to)))
            .filter(|edge| !edge.is_self_loop())
            .collect();

        tracing::trace!(
            groups = group_count,
            absorbed = absorbed.len(),
            edges = edges.len(),
            "Aggregated task graph"
        );

        GroupedGraph {
            nodes,
            edges: edges.into_iter().collect(),
        }
    }

    fn collapse(&self, key: String, members: Vec<TaskNode>) -> GroupNode {
        // Groups only exist for keys with at least one member.
        let aggregate_state = self
            .registry
            .most_urgent(members.iter().map(|task| task.state))
            .unwrap_or(TaskState::Pending);

        let mut member_ids: Vec<String> = members
            .into_iter()
            .map(|task| task.record.id)
            .collect();
        member_ids.sort();

        GroupNode {
            label: key.clone(),
            key,
            count: member_ids.len(),
            aggregate_state,
            attributes: self.registry.attributes_for(aggregate_state),
            members: member_ids,
        }
    }
}
