use thiserror::Error;

/// Core error type for task graph operations.
///
/// Every variant is fatal to the build or refresh cycle that produced it,
/// never to the process. The type is `Clone` so a single cycle result can be
/// handed to every caller that was coalesced into it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown task state: {0}")]
    UnknownState(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid state order: {0}")]
    InvalidStateOrder(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("No snapshot source configured")]
    NoSource,

    #[error("Refresh cancelled before completion")]
    Cancelled,
}

impl GraphError {
    /// Whether the error came from obtaining the snapshot rather than building it.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailure(_) | Self::NoSource)
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::InvalidSnapshot(e.to_string())
    }
}

impl From<std::io::Error> for GraphError {
    fn from(e: std::io::Error) -> Self {
        GraphError::Io(e.to_string())
    }
}

/// Result type alias using GraphError.
pub type Result<T> = std::result::Result<T, GraphError>;
