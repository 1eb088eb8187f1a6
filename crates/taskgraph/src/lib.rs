//! Task graph live view.
//!
//! Builds a renderable dependency graph from task queue snapshots, collapses
//! task groups into single nodes, and keeps the graph current with minimal
//! patches.

pub use taskgraph_core;
pub use taskgraph_runtime;

// Re-export testing assertion macros at crate root when testing feature is enabled.
#[cfg(feature = "testing")]
pub use taskgraph_core::assert_err_variant;

pub mod prelude {
    pub use taskgraph_core::{
        Edge, GraphError, GraphPipeline, GraphSnapshot, Node, NodeId, Patch, Result,
        StateRegistry, TaskGraphConfig, TaskRecord, TaskState,
    };
    pub use taskgraph_runtime::{
        FileSnapshotSource, HttpSnapshotSource, LiveSyncController, RefreshPoller,
        SnapshotSource, SyncEvent, SyncStatus,
    };
}
