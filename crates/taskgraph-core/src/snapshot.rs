use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::{Edge, GraphBuilder, GroupAggregator, GroupedGraph, Node, NodeId};
use crate::patch::Patch;
use crate::record::TaskRecord;
use crate::state::StateRegistry;

/// Fully materialized graph at one point in time.
///
/// Immutable once built; a newer snapshot replaces it as a whole.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    revision: u64,
    built_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_nodes")]
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeSet<Edge>,
    dangling: usize,
}

fn serialize_nodes<S>(
    nodes: &BTreeMap<NodeId, Node>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(nodes.values())
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl GraphSnapshot {
    /// The snapshot held before the first successful refresh.
    pub fn empty() -> Self {
        Self {
            revision: 0,
            built_at: Utc::now(),
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
            dangling: 0,
        }
    }

    /// Wrap an aggregated graph as the given revision.
    pub fn from_graph(graph: GroupedGraph, revision: u64, dangling: usize) -> Self {
        Self {
            revision,
            built_at: Utc::now(),
            nodes: graph.nodes.into_iter().map(|node| (node.id(), node)).collect(),
            edges: graph.edges.into_iter().collect(),
            dangling,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Dependencies dropped while building this snapshot.
    pub fn dangling(&self) -> usize {
        self.dangling
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether both snapshots describe the same graph, ignoring revision and
    /// build time.
    pub fn same_graph(&self, other: &GraphSnapshot) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }

    /// Compute the patch that turns `self` into `next`.
    ///
    /// Nodes are matched by id; a node present in both counts as changed only
    /// when its state or member count differs.
    pub fn diff(&self, next: &GraphSnapshot) -> Patch {
        let mut patch = Patch::empty(self.revision, next.revision);

        for (id, node) in &next.nodes {
            match self.nodes.get(id) {
                None => patch.added.push(node.clone()),
                Some(previous) if previous.differs_from(node) => patch.changed.push(node.clone()),
                Some(_) => {}
            }
        }

        patch.removed = self
            .nodes
            .keys()
            .filter(|id| !next.nodes.contains_key(*id))
            .cloned()
            .collect();

        patch.added_edges = next.edges.difference(&self.edges).cloned().collect();
        patch.removed_edges = self.edges.difference(&next.edges).cloned().collect();

        patch
    }
}

/// Builder plus aggregator: records in, snapshot out.
#[derive(Debug, Clone, Default)]
pub struct GraphPipeline {
    builder: GraphBuilder,
    aggregator: GroupAggregator,
}

impl GraphPipeline {
    pub fn new(builder: GraphBuilder, aggregator: GroupAggregator) -> Self {
        Self {
            builder,
            aggregator,
        }
    }

    /// Assemble the pipeline described by the `[graph]` config section.
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        let registry = match &config.state_order {
            Some(order) => StateRegistry::with_order(order)?,
            None => StateRegistry::default(),
        };

        Ok(Self::new(
            GraphBuilder::new(registry.clone()),
            GroupAggregator::new(registry).with_expanded(config.expanded_groups.iter().cloned()),
        ))
    }

    pub fn registry(&self) -> &StateRegistry {
        self.builder.registry()
    }

    /// Build and aggregate one snapshot of records.
    pub fn materialize<I>(&self, records: I, revision: u64) -> Result<GraphSnapshot>
    where
        I: IntoIterator<Item = TaskRecord>,
    {
        let graph = self.builder.build(records)?;
        let dangling = graph.dangling;
        let grouped = self.aggregator.aggregate(graph);
        Ok(GraphSnapshot::from_graph(grouped, revision, dangling))
    }
}
