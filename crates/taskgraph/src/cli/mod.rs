mod render;
mod watch;

pub use render::RenderCommand;
pub use watch::WatchCommand;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use taskgraph_core::TaskGraphConfig;

/// Default configuration file, used when present.
const DEFAULT_CONFIG: &str = "taskgraph.toml";

/// Task graph live view for distributed task queues.
#[derive(Parser)]
#[command(name = "taskgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Build the graph once and print it as JSON.
    Render(RenderCommand),

    /// Poll the configured source and print patches as they arrive.
    Watch(WatchCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.execute().await,
            Commands::Watch(cmd) => cmd.execute().await,
        }
    }
}

/// Load configuration.
///
/// An explicit path must exist. Without one, `taskgraph.toml` is read if it
/// exists and defaults are used otherwise.
fn load_config(path: Option<&str>) -> Result<TaskGraphConfig> {
    match path {
        Some(path) => {
            if !Path::new(path).exists() {
                anyhow::bail!("Configuration file not found: {}", path);
            }
            TaskGraphConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))
        }
        None if Path::new(DEFAULT_CONFIG).exists() => TaskGraphConfig::from_file(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG)),
        None => Ok(TaskGraphConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_render_command() {
        let cli = Cli::try_parse_from(["taskgraph", "render", "--input", "tasks.json"]).unwrap();
        match cli.command {
            Commands::Render(cmd) => {
                assert_eq!(cmd.input.as_deref(), Some("tasks.json"));
                assert!(cmd.config.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_watch_command() {
        let cli = Cli::try_parse_from([
            "taskgraph",
            "watch",
            "--config",
            "dash.toml",
            "--interval-ms",
            "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch(cmd) => {
                assert_eq!(cmd.config.as_deref(), Some("dash.toml"));
                assert_eq!(cmd.interval_ms, Some(500));
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let err = load_config(Some("/nonexistent/taskgraph.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\npoll_interval_ms = 750").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sync.poll_interval_ms, 750);
    }
}
