mod observability;

pub use observability::LoggingConfig;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::state::TaskState;

/// Root configuration for the task graph view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGraphConfig {
    /// Where snapshots come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Refresh cadence and failure handling.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Graph shaping options.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TaskGraphConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GraphError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| GraphError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Snapshot source configuration.
///
/// `url` wins over `file` when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// HTTP endpoint returning the task snapshot.
    pub url: Option<String>,

    /// JSON file holding a snapshot, for replay.
    pub file: Option<PathBuf>,

    /// Bearer token sent with HTTP requests.
    pub bearer_token: Option<String>,
}

/// Live sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refresh cadence in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Consecutive failures before the view is reported stale.
    #[serde(default = "default_stale_after_failures")]
    pub stale_after_failures: u32,

    /// Capacity of the sync event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            fetch_timeout_ms: default_fetch_timeout(),
            stale_after_failures: default_stale_after_failures(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_fetch_timeout() -> u64 {
    5000
}

fn default_stale_after_failures() -> u32 {
    3
}

fn default_event_buffer() -> usize {
    64
}

/// Graph shaping configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Custom urgency order, most urgent first. Must list every state once.
    pub state_order: Option<Vec<TaskState>>,

    /// Group keys rendered as individual tasks instead of one cluster.
    #[serde(default)]
    pub expanded_groups: Vec<String>,
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
