use serde::Serialize;

use crate::graph::{Edge, Node, NodeId};

/// Delta between two consecutive graph snapshots.
///
/// Added and changed nodes carry their full payload so the renderer can draw
/// them without a second lookup; removed nodes only need their id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Revision the patch applies to.
    pub from_revision: u64,
    /// Revision after applying the patch.
    pub to_revision: u64,
    /// Nodes present only in the new snapshot.
    pub added: Vec<Node>,
    /// Ids present only in the old snapshot.
    pub removed: Vec<NodeId>,
    /// Nodes whose state or count changed.
    pub changed: Vec<Node>,
    pub added_edges: Vec<Edge>,
    pub removed_edges: Vec<Edge>,
}

impl Patch {
    /// Create an empty patch between two revisions.
    pub fn empty(from_revision: u64, to_revision: u64) -> Self {
        Self {
            from_revision,
            to_revision,
            ..Default::default()
        }
    }

    /// Check if the patch is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }

    /// Total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.changed.len()
            + self.added_edges.len()
            + self.removed_edges.len()
    }

    pub fn added_ids(&self) -> Vec<NodeId> {
        self.added.iter().map(Node::id).collect()
    }

    pub fn changed_ids(&self) -> Vec<NodeId> {
        self.changed.iter().map(Node::id).collect()
    }
}
