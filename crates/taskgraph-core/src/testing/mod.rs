//! Testing utilities for task graph consumers.
//!
//! Record builders for assembling snapshots in a line each, plus an
//! assertion macro for `Result`-returning graph operations.
//!
//! # Example
//!
//! ```ignore
//! use taskgraph_core::testing::{record, snapshot_of};
//!
//! let snap = snapshot_of(vec![
//!     record("a", "SUCCESS").in_group("chord"),
//!     record("b", "FAILURE").in_group("chord"),
//! ]);
//! assert_eq!(snap.node_count(), 1);
//! ```

mod assertions;

use crate::record::TaskRecord;
use crate::snapshot::{GraphPipeline, GraphSnapshot};

/// Shorthand for a record with an id and raw state.
pub fn record(id: &str, state: &str) -> TaskRecord {
    TaskRecord::new(id, state)
}

/// Build a revision-1 snapshot with the default pipeline.
///
/// Panics if the records do not form a valid snapshot.
pub fn snapshot_of(records: Vec<TaskRecord>) -> GraphSnapshot {
    match GraphPipeline::default().materialize(records, 1) {
        Ok(snapshot) => snapshot,
        Err(e) => panic!("test snapshot failed to build: {}", e),
    }
}

/// A small chain `a -> b -> c` with `b` and `c` sharing a group.
pub fn sample_chain() -> Vec<TaskRecord> {
    vec![
        record("a", "SUCCESS").with_name("tasks.fetch"),
        record("b", "STARTED")
            .with_name("tasks.parse")
            .in_group("chord-1")
            .with_dependency("a"),
        record("c", "PENDING")
            .with_name("tasks.store")
            .in_group("chord-1")
            .with_dependency("b"),
    ]
}
