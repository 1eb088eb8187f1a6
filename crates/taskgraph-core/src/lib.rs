//! Task graph data model: from raw task snapshots to renderable graphs and
//! the patches that keep them current.

pub mod config;
pub mod error;
pub mod graph;
pub mod patch;
pub mod record;
pub mod snapshot;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::TaskGraphConfig;
pub use error::{GraphError, Result};
pub use graph::{
    Edge, GraphBuilder, GroupAggregator, GroupNode, GroupedGraph, Node, NodeId, TaskGraph,
    TaskNode,
};
pub use patch::Patch;
pub use record::{records_from_json, records_from_slice, TaskRecord};
pub use snapshot::{GraphPipeline, GraphSnapshot};
pub use state::{StateAttributes, StateRegistry, TaskState};
