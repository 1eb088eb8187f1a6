use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use taskgraph_core::TaskGraphConfig;
use taskgraph_runtime::{init_tracing, LiveSyncController, RefreshPoller, SyncEvent};

use super::load_config;

/// Poll the configured source and stream patches as JSON lines.
#[derive(Parser)]
pub struct WatchCommand {
    /// Configuration file path (defaults to taskgraph.toml when present).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Poll interval in milliseconds (overrides config).
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

impl WatchCommand {
    /// Execute the watch command.
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        init_tracing(&config.logging)?;

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        self.run(&config, shutdown).await
    }

    fn interval(&self, config: &TaskGraphConfig) -> Duration {
        self.interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.sync.poll_interval())
    }

    async fn run(
        &self,
        config: &TaskGraphConfig,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let controller = LiveSyncController::from_config(config)?;
        if !controller.has_source() {
            anyhow::bail!(
                "No snapshot source configured.\nSet [source] url or file in the config."
            );
        }

        let interval = self.interval(config);
        eprintln!();
        eprintln!(
            "  {} v{}  polling every {}ms",
            style("taskgraph").bold().cyan(),
            env!("CARGO_PKG_VERSION"),
            interval.as_millis()
        );
        eprintln!("  Press Ctrl-C to stop");
        eprintln!();

        let mut events = controller.subscribe();
        let poller = RefreshPoller::new(controller.clone(), interval).spawn();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Ok(SyncEvent::Patch(patch)) => {
                        if !patch.is_empty() {
                            println!("{}", serde_json::to_string(&*patch)?);
                        }
                    }
                    Ok(SyncEvent::Failed { error, stale }) => {
                        let line = serde_json::json!({
                            "error": error.to_string(),
                            "stale": stale,
                        });
                        println!("{}", line);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed patches cannot be replayed; resend the whole graph.
                        warn!(skipped, "Event stream lagged, emitting full snapshot");
                        println!("{}", serde_json::to_string(&*controller.current())?);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Stopping watch");
        poller.stop().await;

        let status = controller.status();
        eprintln!(
            "{} stopped at revision {}",
            style("■").dim(),
            style(status.revision).cyan()
        );

        Ok(())
    }
}
