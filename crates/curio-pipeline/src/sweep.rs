//! Stuck-asset sweep: a polling loop that finds assets sitting in a
//! non-terminal state past a threshold and re-triggers the right stage.
//!
//! Collaborator calls are fire-and-forget with no retry queue; the sweep
//! is the retry path when a dispatch was lost or a collaborator never
//! reported back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use curio_core::{defaults, Error, Result};
use curio_db::Database;

use crate::orchestrator::StageOrchestrator;

/// Sweep configuration, from environment.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub enabled: bool,
    /// Seconds between sweep passes.
    pub interval_secs: u64,
    /// Age threshold before a non-terminal asset counts as stuck.
    pub stuck_after_secs: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: defaults::SWEEP_INTERVAL_SECS,
            stuck_after_secs: defaults::SWEEP_STUCK_AFTER_SECS as i64,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        let enabled = std::env::var(defaults::ENV_SWEEP_ENABLED)
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let interval_secs = std::env::var(defaults::ENV_SWEEP_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SWEEP_INTERVAL_SECS)
            .max(1);
        let stuck_after_secs = std::env::var(defaults::ENV_SWEEP_STUCK_AFTER_SECS)
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults::SWEEP_STUCK_AFTER_SECS as i64)
            .max(1);
        Self {
            enabled,
            interval_secs,
            stuck_after_secs,
        }
    }
}

/// Handle for controlling a running sweeper.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Signal the sweeper to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Background sweeper re-triggering stuck pipeline stages.
pub struct Sweeper {
    db: Database,
    orchestrator: Arc<StageOrchestrator>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(db: Database, orchestrator: Arc<StageOrchestrator>, config: SweepConfig) -> Self {
        Self {
            db,
            orchestrator,
            config,
        }
    }

    /// Start the sweep loop and return a handle for control.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        SweepHandle { shutdown_tx }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "pipeline", "Sweep is disabled, not starting");
            return;
        }

        info!(
            subsystem = "pipeline",
            component = "sweep",
            interval_secs = self.config.interval_secs,
            stuck_after_secs = self.config.stuck_after_secs,
            "Sweep started"
        );

        let interval = Duration::from_secs(self.config.interval_secs);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "pipeline", component = "sweep", "Sweep received shutdown signal");
                    break;
                }
                _ = sleep(interval) => {}
            }

            if let Err(e) = self.pass().await {
                error!(
                    subsystem = "pipeline",
                    component = "sweep",
                    error_msg = %e,
                    "Sweep pass failed"
                );
            }
        }
    }

    /// One sweep pass over the three stuck states.
    pub async fn pass(&self) -> Result<()> {
        let threshold = self.config.stuck_after_secs;

        // Transcription requested but never picked up: re-dispatch. The
        // orchestrator's status guard keeps this idempotent.
        let stuck = self.db.assets.find_stuck_transcriptions(threshold).await?;
        for asset in &stuck {
            warn!(
                subsystem = "pipeline",
                component = "sweep",
                asset_id = %asset.id,
                "Re-dispatching stuck transcription"
            );
            self.orchestrator.spawn_transcription(asset.id);
        }

        // Transcribed, scratch items waiting, but no merge ever ran.
        let unmerged = self.db.assets.find_unmerged_transcribed(threshold).await?;
        for asset in &unmerged {
            let Some(provider_asset_id) = &asset.provider_asset_id else {
                continue;
            };
            let scratch_count = self
                .db
                .scratch_items
                .count_for_provider_asset(asset.user_id, provider_asset_id)
                .await?;
            if scratch_count > 0 {
                warn!(
                    subsystem = "pipeline",
                    component = "sweep",
                    asset_id = %asset.id,
                    scratch_count,
                    "Re-triggering merge for transcribed asset"
                );
                self.orchestrator.spawn_merge(asset.user_id, asset.id);
            }
        }

        // Never confirmed by the provider. Nothing to re-trigger locally;
        // surfaced for operators, the UI shows the stuck state.
        let stalled = self.db.assets.find_stalled_preparing(threshold).await?;
        for asset in &stalled {
            warn!(
                subsystem = "pipeline",
                component = "sweep",
                asset_id = %asset.id,
                provider_upload_id = asset.provider_upload_id.as_deref().unwrap_or("-"),
                "Asset stalled in preparing state"
            );
        }

        debug!(
            subsystem = "pipeline",
            component = "sweep",
            stuck_transcriptions = stuck.len(),
            unmerged = unmerged.len(),
            stalled = stalled.len(),
            "Sweep pass complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SweepConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, defaults::SWEEP_INTERVAL_SECS);
        assert_eq!(
            config.stuck_after_secs,
            defaults::SWEEP_STUCK_AFTER_SECS as i64
        );
    }
}
