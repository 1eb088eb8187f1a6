use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use taskgraph_core::{GraphSnapshot, Node, TaskGraphConfig};
use taskgraph_runtime::{init_tracing, FileSnapshotSource, LiveSyncController, SnapshotSource};

use super::load_config;

/// Build the graph once and print it.
#[derive(Parser)]
pub struct RenderCommand {
    /// Configuration file path (defaults to taskgraph.toml when present).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Read records from this JSON file instead of the configured source.
    #[arg(short, long)]
    pub input: Option<String>,
}

impl RenderCommand {
    /// Execute the render command.
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        init_tracing(&config.logging)?;
        self.run(&config).await
    }

    async fn run(&self, config: &TaskGraphConfig) -> Result<()> {
        let controller = LiveSyncController::from_config(config)?;

        match &self.input {
            Some(input) => {
                info!("Reading records from {}", input);
                let records = FileSnapshotSource::new(input).fetch().await?;
                controller.refresh(records).await?;
            }
            None => {
                if !controller.has_source() {
                    anyhow::bail!(
                        "No snapshot source configured.\n\
                         Set [source] url or file in the config, or pass --input."
                    );
                }
                controller.trigger().await?;
            }
        }

        let snapshot = controller.current();
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);

        eprintln!(
            "{} {} nodes, {} edges",
            style("✓").green(),
            style(snapshot.node_count()).cyan(),
            style(snapshot.edge_count()).cyan()
        );
        for line in node_lines(&snapshot) {
            eprintln!("  {}", line);
        }
        if snapshot.dangling() > 0 {
            eprintln!(
                "{} {} dependencies point at tasks missing from the snapshot",
                style("⚠").yellow(),
                snapshot.dangling()
            );
        }

        Ok(())
    }
}

/// One line per node: caption, member count for groups, and state.
fn node_lines(snapshot: &GraphSnapshot) -> Vec<String> {
    snapshot
        .nodes()
        .map(|node| match node {
            Node::Group(group) => {
                format!("{} x{} [{}]", node.caption(), group.count, node.state())
            }
            Node::Task(_) => format!("{} [{}]", node.caption(), node.state()),
        })
        .collect()
}
