//! Live synchronization of the rendered graph with the backend.

mod controller;
mod poller;

pub use controller::{LiveSyncController, SyncEvent, SyncStatus};
pub use poller::{PollerHandle, RefreshPoller};
