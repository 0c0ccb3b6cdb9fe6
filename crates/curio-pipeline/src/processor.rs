//! Webhook event processor: store, resolve, plan, apply.
//!
//! The handler acks every parseable delivery with 200; everything here is
//! best-effort. Storage failures are logged and swallowed (the provider
//! retries indefinitely on non-200), resolution misses leave the stored
//! event unprocessed for later reconciliation.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use curio_core::{EventBus, ProcessingStatus, Result, ServerEvent, TranscriptStatus};
use curio_db::Database;

use crate::event::WebhookPayload;
use crate::orchestrator::StageOrchestrator;
use crate::resolver::resolve;
use crate::transitions::{plan, SkipReason, Transition};

/// Applies webhook deliveries against persisted asset state.
pub struct EventProcessor {
    db: Database,
    bus: EventBus,
    orchestrator: Arc<StageOrchestrator>,
}

impl EventProcessor {
    pub fn new(db: Database, bus: EventBus, orchestrator: Arc<StageOrchestrator>) -> Self {
        Self {
            db,
            bus,
            orchestrator,
        }
    }

    /// Ingest one verified delivery. Errors returned here are logged by the
    /// handler; they never change the acknowledgement response.
    pub async fn ingest(&self, payload: &WebhookPayload, raw: JsonValue) -> Result<()> {
        let provider_event_id = payload.provider_event_id();

        // Append before branching so every event type is durable even when
        // later processing is missing or fails.
        match self.db.events.store(payload.store_request(raw)).await {
            Ok(_) => {
                self.bus.emit(ServerEvent::EventStored {
                    provider_event_id: provider_event_id.clone(),
                    event_type: payload.event_type.clone(),
                });
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "processor",
                    event_id = %provider_event_id,
                    event_type = %payload.event_type,
                    error_msg = %e,
                    "Event store append failed; continuing"
                );
            }
        }

        let Some((asset, strategy)) = resolve(&self.db.assets, &payload.keys()).await? else {
            return Ok(());
        };

        let transition = plan(&payload.event(), &asset);
        debug!(
            subsystem = "pipeline",
            component = "processor",
            event_id = %provider_event_id,
            event_type = %payload.event_type,
            asset_id = %asset.id,
            strategy = strategy.as_str(),
            "Applying transition"
        );

        match transition {
            Transition::LinkUpload {
                real_asset_id,
                upload_id,
            } => {
                let migrated = self
                    .db
                    .assets
                    .link_provider_asset(asset.id, &real_asset_id)
                    .await?;
                let backfilled = self
                    .db
                    .scratch_items
                    .backfill_provider_asset_id(asset.user_id, upload_id.as_deref(), &real_asset_id)
                    .await?;
                self.db
                    .events
                    .mark_processed(&provider_event_id, Some(asset.id))
                    .await?;
                if migrated {
                    self.emit_asset_updated(&asset, asset.processing_status, asset.transcript_status);
                }
                info!(
                    subsystem = "pipeline",
                    component = "processor",
                    asset_id = %asset.id,
                    provider_asset_id = %real_asset_id,
                    scratch_count = backfilled,
                    migrated,
                    "Upload linked to provider asset"
                );
            }
            Transition::MarkReady { playback } => {
                let media_url = curio_core::stream_url(&playback.playback_id);
                self.db
                    .assets
                    .mark_ready(asset.id, &playback, &media_url)
                    .await?;
                self.db
                    .events
                    .mark_processed(&provider_event_id, Some(asset.id))
                    .await?;
                self.emit_asset_updated(&asset, ProcessingStatus::Ready, asset.transcript_status);
                info!(
                    subsystem = "pipeline",
                    component = "processor",
                    asset_id = %asset.id,
                    playback_id = %playback.playback_id,
                    "Asset ready"
                );
            }
            Transition::BeginTranscription { pending_audio_url } => {
                let advanced = self
                    .db
                    .assets
                    .begin_transcription(asset.id, &pending_audio_url)
                    .await?;
                self.db
                    .events
                    .mark_processed(&provider_event_id, Some(asset.id))
                    .await?;
                if advanced {
                    self.emit_asset_updated(
                        &asset,
                        asset.processing_status,
                        Some(TranscriptStatus::Pending),
                    );
                    self.orchestrator.spawn_transcription(asset.id);
                } else {
                    // A concurrent delivery won the compare-and-swap.
                    debug!(
                        subsystem = "pipeline",
                        component = "processor",
                        asset_id = %asset.id,
                        "Transcription already begun; not dispatching"
                    );
                }
            }
            Transition::TriggerMerge => {
                self.db
                    .events
                    .mark_processed(&provider_event_id, Some(asset.id))
                    .await?;
                let Some(provider_asset_id) = &asset.provider_asset_id else {
                    return Ok(());
                };
                let scratch_count = self
                    .db
                    .scratch_items
                    .count_for_provider_asset(asset.user_id, provider_asset_id)
                    .await?;
                if scratch_count > 0 {
                    info!(
                        subsystem = "pipeline",
                        component = "processor",
                        asset_id = %asset.id,
                        scratch_count,
                        "Late rendition after completed transcription; reconciling via merge"
                    );
                    self.orchestrator.spawn_merge(asset.user_id, asset.id);
                }
            }
            Transition::Skip(reason) => match reason {
                SkipReason::UnrecognizedEvent => {
                    // Stored but unhandled; stays unprocessed.
                    debug!(
                        subsystem = "pipeline",
                        component = "processor",
                        event_type = %payload.event_type,
                        "No transition for event type"
                    );
                }
                _ => {
                    self.db
                        .events
                        .mark_processed(&provider_event_id, Some(asset.id))
                        .await?;
                    debug!(
                        subsystem = "pipeline",
                        component = "processor",
                        event_id = %provider_event_id,
                        asset_id = %asset.id,
                        skip_reason = reason.as_str(),
                        "Transition skipped"
                    );
                }
            },
        }

        Ok(())
    }

    fn emit_asset_updated(
        &self,
        asset: &curio_core::Asset,
        processing_status: ProcessingStatus,
        transcript_status: Option<TranscriptStatus>,
    ) {
        self.bus.emit(ServerEvent::AssetUpdated {
            user_id: asset.user_id,
            asset_id: asset.id,
            processing_status,
            transcript_status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    use curio_core::{CreateAssetRequest, MediaType};
    use curio_db::test_fixtures::test_pool;
    use curio_inference::MockGenerationBackend;

    use crate::merge::{MergeConfig, MergeEngine};
    use crate::orchestrator::{OrchestratorConfig, StageOrchestrator};

    async fn processor(db: Database) -> EventProcessor {
        let bus = EventBus::new(32);
        let engine = Arc::new(MergeEngine::new(
            db.clone(),
            Arc::new(MockGenerationBackend::new()),
            bus.clone(),
            MergeConfig {
                delete_scratch_after_merge: false,
            },
        ));
        let orchestrator = Arc::new(
            StageOrchestrator::new(
                db.clone(),
                engine,
                OrchestratorConfig {
                    site_base_url: "http://localhost:1".to_string(),
                    transcribe_auth_token: None,
                    dispatch_timeout_secs: 1,
                },
            )
            .unwrap(),
        );
        EventProcessor::new(db, bus, orchestrator)
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_upload_linked_event_migrates_placeholder_and_marks_processed() {
        let db = Database::new(test_pool().await);
        let user_id = Uuid::new_v4();
        let upload_id = format!("up_{}", Uuid::new_v4());
        let real_asset_id = format!("as_{}", Uuid::new_v4());

        let asset_id = db
            .assets
            .insert_placeholder(CreateAssetRequest {
                user_id,
                media_type: MediaType::Video,
                is_source_video: true,
                provider_upload_id: Some(upload_id.clone()),
                provider_correlation_id: None,
            })
            .await
            .unwrap();

        let event_id = format!("evt_{}", Uuid::new_v4());
        let body = json!({
            "id": event_id,
            "type": "video.upload.asset_created",
            "data": {"id": upload_id, "asset_id": real_asset_id}
        });
        let payload = WebhookPayload::parse(&body).unwrap();

        let processor = processor(db.clone()).await;
        processor.ingest(&payload, body).await.unwrap();

        let asset = db.assets.get(asset_id).await.unwrap().unwrap();
        assert_eq!(asset.provider_asset_id.as_deref(), Some(real_asset_id.as_str()));

        let stored = db
            .events
            .get_by_provider_event_id(&event_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.processed);
        assert_eq!(stored.asset_id, Some(asset_id));
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_unresolved_event_is_stored_unprocessed() {
        let db = Database::new(test_pool().await);
        let event_id = format!("evt_{}", Uuid::new_v4());
        let body = json!({
            "id": event_id,
            "type": "video.asset.ready",
            "data": {"id": format!("as_{}", Uuid::new_v4()), "playback_ids": [{"id": "pb_1"}]}
        });
        let payload = WebhookPayload::parse(&body).unwrap();

        let processor = processor(db.clone()).await;
        processor.ingest(&payload, body).await.unwrap();

        let stored = db
            .events
            .get_by_provider_event_id(&event_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.processed);
        assert!(stored.asset_id.is_none());
    }
}
