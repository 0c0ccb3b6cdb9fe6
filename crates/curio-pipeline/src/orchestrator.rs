//! Stage orchestrator: fires the next pipeline stage as a side effect of
//! an applied state transition.
//!
//! Dispatch is fire-and-forget: the webhook response never waits on a
//! collaborator call. Failures are logged; recovery comes from provider
//! redelivery or the stuck-asset sweep.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use curio_core::{defaults, Error, Result, TranscriptStatus};
use curio_db::Database;

use crate::merge::{MergeEngine, MergeRequest};

/// Orchestrator configuration, from environment.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base URL used to construct outbound collaborator calls.
    pub site_base_url: String,
    /// Bearer token for the transcription collaborator.
    pub transcribe_auth_token: Option<String>,
    /// Outbound call timeout in seconds.
    pub dispatch_timeout_secs: u64,
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            site_base_url: std::env::var(defaults::ENV_SITE_BASE_URL)
                .unwrap_or_else(|_| defaults::DEFAULT_SITE_BASE_URL.to_string()),
            transcribe_auth_token: std::env::var(defaults::ENV_TRANSCRIBE_AUTH_TOKEN).ok(),
            dispatch_timeout_secs: defaults::TRANSCRIBE_DISPATCH_TIMEOUT_SECS,
        }
    }
}

/// Triggers transcription and merge stages.
pub struct StageOrchestrator {
    db: Database,
    merge_engine: Arc<MergeEngine>,
    client: reqwest::Client,
    config: OrchestratorConfig,
}

impl StageOrchestrator {
    pub fn new(
        db: Database,
        merge_engine: Arc<MergeEngine>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.dispatch_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            db,
            merge_engine,
            client,
            config,
        })
    }

    /// Fire-and-forget transcription dispatch. The webhook handler never
    /// awaits the collaborator; failures are logged and the asset stays
    /// `pending` for the sweep to retry.
    pub fn spawn_transcription(self: &Arc<Self>, asset_id: Uuid) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.dispatch_transcription(asset_id).await {
                error!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    asset_id = %asset_id,
                    error_msg = %e,
                    "Transcription dispatch failed"
                );
            }
        });
    }

    /// Issue the transcription request for one asset.
    ///
    /// Guard: re-reads transcript_status immediately before dispatch so two
    /// concurrent triggers cannot both issue a call once one has advanced
    /// the status past pending.
    pub async fn dispatch_transcription(&self, asset_id: Uuid) -> Result<()> {
        let status = self.db.assets.transcript_status(asset_id).await?;
        if status != Some(TranscriptStatus::Pending) {
            debug!(
                subsystem = "pipeline",
                component = "orchestrator",
                asset_id = %asset_id,
                transcript_status = status.map(|s| s.as_str()).unwrap_or("null"),
                "Skipping transcription dispatch, status not pending"
            );
            return Ok(());
        }

        let url = format!(
            "{}/api/transcribe",
            self.config.site_base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).json(&json!({ "assetId": asset_id }));
        if let Some(token) = &self.config.transcribe_auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "transcription collaborator returned {}",
                response.status()
            )));
        }

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            asset_id = %asset_id,
            "Transcription requested"
        );
        Ok(())
    }

    /// Fire-and-forget merge trigger (late rendition reconcile and sweep).
    pub fn spawn_merge(self: &Arc<Self>, user_id: Uuid, asset_id: Uuid) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this
                .merge_engine
                .merge(MergeRequest {
                    user_id,
                    asset_id: Some(asset_id),
                    provider_asset_id: None,
                    transcript: None,
                })
                .await;
            if let Err(e) = result {
                warn!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    asset_id = %asset_id,
                    user_id = %user_id,
                    error_msg = %e,
                    "Background merge failed"
                );
            }
        });
    }

    /// The engine behind the synchronous merge endpoint.
    pub fn merge_engine(&self) -> &Arc<MergeEngine> {
        &self.merge_engine
    }
}
