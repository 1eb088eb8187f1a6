//! Runtime for the task graph view: snapshot sources, the live sync
//! controller, and the refresh poller.

pub mod observability;
pub mod source;
pub mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use observability::init_tracing;
pub use source::{
    source_from_config, FileSnapshotSource, HttpSnapshotSource, SnapshotSource, SourceFuture,
};
pub use sync::{LiveSyncController, PollerHandle, RefreshPoller, SyncEvent, SyncStatus};
