//! Asset repository: placeholder creation, resolver lookups, conditional
//! state-transition updates, and derived-item persistence.
//!
//! Every transition write is a single-row UPDATE whose WHERE clause restates
//! the transition precondition, so a replayed or racing event degrades to a
//! zero-row no-op instead of a duplicate side effect.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use curio_core::{
    Asset, AssetLookup, CreateAssetRequest, CreateItemRequest, Error, MediaType, PlaybackInfo,
    ProcessingStatus, Result, TranscriptStatus,
};

/// PostgreSQL asset repository.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: Pool<Postgres>,
}

const ASSET_COLUMNS: &str = "id, user_id, media_type, name, description, is_source_video, \
     source_video_id, provider_asset_id, provider_upload_id, provider_correlation_id, \
     processing_status, playback_id, duration, aspect_ratio, max_resolution, media_url, \
     audio_url, transcript_text, transcript_status, item_timestamp, estimated_value, \
     is_processed, room_id, created_at, updated_at";

impl PgAssetRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Asset {
        Asset {
            id: r.get("id"),
            user_id: r.get("user_id"),
            media_type: MediaType::parse(r.get::<String, _>("media_type").as_str()),
            name: r.get("name"),
            description: r.get("description"),
            is_source_video: r.get("is_source_video"),
            source_video_id: r.get("source_video_id"),
            provider_asset_id: r.get("provider_asset_id"),
            provider_upload_id: r.get("provider_upload_id"),
            provider_correlation_id: r.get("provider_correlation_id"),
            processing_status: ProcessingStatus::parse(
                r.get::<String, _>("processing_status").as_str(),
            ),
            playback_id: r.get("playback_id"),
            duration: r.get("duration"),
            aspect_ratio: r.get("aspect_ratio"),
            max_resolution: r.get("max_resolution"),
            media_url: r.get("media_url"),
            audio_url: r.get("audio_url"),
            transcript_text: r.get("transcript_text"),
            transcript_status: r
                .get::<Option<String>, _>("transcript_status")
                .and_then(|s| TranscriptStatus::parse(&s)),
            item_timestamp: r.get("item_timestamp"),
            estimated_value: r.get("estimated_value"),
            is_processed: r.get("is_processed"),
            room_id: r.get("room_id"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }

    /// Create a placeholder asset when the client requests an upload URL.
    ///
    /// The upload id occupies `provider_asset_id` until the upload-linked
    /// event migrates it to the provider's real asset id.
    pub async fn insert_placeholder(&self, req: CreateAssetRequest) -> Result<Uuid> {
        let id = curio_core::new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO asset (id, user_id, media_type, is_source_video, provider_asset_id,
                                provider_upload_id, provider_correlation_id, processing_status,
                                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $8)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(req.media_type.as_str())
        .bind(req.is_source_video)
        .bind(&req.provider_upload_id)
        .bind(&req.provider_correlation_id)
        .bind(ProcessingStatus::Preparing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    /// Get an asset by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!("SELECT {} FROM asset WHERE id = $1", ASSET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    /// Get an asset by ID, enforcing ownership.
    pub async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset WHERE id = $1 AND user_id = $2",
            ASSET_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    /// Find a user's asset by provider asset id (or upload-id placeholder).
    pub async fn find_owned_by_provider_asset_id(
        &self,
        user_id: Uuid,
        provider_asset_id: &str,
    ) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset WHERE user_id = $1 AND provider_asset_id = $2 LIMIT 1",
            ASSET_COLUMNS
        ))
        .bind(user_id)
        .bind(provider_asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    /// Migrate the upload-id placeholder to the provider's real asset id.
    ///
    /// Returns false when the asset already carries the real id (replay).
    pub async fn link_provider_asset(&self, id: Uuid, real_asset_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE asset SET provider_asset_id = $1, updated_at = now()
             WHERE id = $2 AND (provider_asset_id IS NULL OR provider_asset_id <> $1)",
        )
        .bind(real_asset_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply asset-ready playback metadata.
    pub async fn mark_ready(
        &self,
        id: Uuid,
        playback: &PlaybackInfo,
        media_url: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE asset SET processing_status = $1, playback_id = $2, duration = $3,
                              aspect_ratio = $4, max_resolution = $5, media_url = $6,
                              updated_at = now()
             WHERE id = $7",
        )
        .bind(ProcessingStatus::Ready.as_str())
        .bind(&playback.playback_id)
        .bind(playback.duration)
        .bind(&playback.aspect_ratio)
        .bind(&playback.max_resolution)
        .bind(media_url)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Advance transcript status to `pending` and store the sentinel audio
    /// URL, but only if transcription has never started (or previously
    /// errored). Returns false when the compare-and-swap lost — the caller
    /// must not dispatch a transcription request in that case.
    pub async fn begin_transcription(&self, id: Uuid, pending_audio_url: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE asset SET transcript_status = $1, audio_url = $2, updated_at = now()
             WHERE id = $3 AND (transcript_status IS NULL OR transcript_status = 'error')",
        )
        .bind(TranscriptStatus::Pending.as_str())
        .bind(pending_audio_url)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-read the current transcript status (orchestrator dispatch guard).
    pub async fn transcript_status(&self, id: Uuid) -> Result<Option<TranscriptStatus>> {
        let row = sqlx::query("SELECT transcript_status FROM asset WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        let row = row.ok_or(Error::AssetNotFound(id))?;
        Ok(row
            .get::<Option<String>, _>("transcript_status")
            .and_then(|s| TranscriptStatus::parse(&s)))
    }

    /// Persist one merged inventory item as a derived asset row, attaching
    /// tags in the same transaction.
    pub async fn insert_item(&self, req: CreateItemRequest) -> Result<Uuid> {
        let id = curio_core::new_v7();
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO asset (id, user_id, media_type, name, description, is_source_video,
                                source_video_id, processing_status, item_timestamp,
                                estimated_value, room_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, false, $6, $7, $8, $9, $10, $11, $11)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(MediaType::Item.as_str())
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.source_video_id)
        .bind(ProcessingStatus::Ready.as_str())
        .bind(req.item_timestamp)
        .bind(req.estimated_value)
        .bind(req.room_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        for tag_id in &req.tag_ids {
            sqlx::query(
                "INSERT INTO asset_tag (asset_id, tag_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(id)
    }

    /// Mark a source video as processed by the merge engine.
    pub async fn set_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE asset SET is_processed = true, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Source videos whose transcription has sat in `pending` past the
    /// threshold. Candidates for a re-dispatched transcription request.
    pub async fn find_stuck_transcriptions(&self, older_than_secs: i64) -> Result<Vec<Asset>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM asset
             WHERE is_source_video AND transcript_status = 'pending'
               AND updated_at < now() - make_interval(secs => $1)
             ORDER BY updated_at ASC",
            ASSET_COLUMNS
        ))
        .bind(older_than_secs as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    /// Source videos transcribed but never merged, past the threshold.
    pub async fn find_unmerged_transcribed(&self, older_than_secs: i64) -> Result<Vec<Asset>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM asset
             WHERE is_source_video AND transcript_status = 'completed' AND NOT is_processed
               AND updated_at < now() - make_interval(secs => $1)
             ORDER BY updated_at ASC",
            ASSET_COLUMNS
        ))
        .bind(older_than_secs as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    /// Source videos still `preparing` past the threshold. Nothing local to
    /// re-trigger (the stall is provider-side); surfaced for operators.
    pub async fn find_stalled_preparing(&self, older_than_secs: i64) -> Result<Vec<Asset>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM asset
             WHERE is_source_video AND processing_status = 'preparing'
               AND updated_at < now() - make_interval(secs => $1)
             ORDER BY updated_at ASC",
            ASSET_COLUMNS
        ))
        .bind(older_than_secs as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }
}

#[async_trait]
impl AssetLookup for PgAssetRepository {
    async fn find_by_provider_asset_id(&self, provider_asset_id: &str) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset WHERE provider_asset_id = $1 LIMIT 1",
            ASSET_COLUMNS
        ))
        .bind(provider_asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn find_by_correlation_id(&self, correlation_id: &str) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset WHERE provider_correlation_id = $1 LIMIT 1",
            ASSET_COLUMNS
        ))
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{test_pool, video_placeholder};

    // Integration tests against a live Postgres; run with `cargo test -- --ignored`.

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_placeholder_holds_upload_id() {
        let repo = PgAssetRepository::new(test_pool().await);
        let user_id = Uuid::new_v4();
        let id = repo
            .insert_placeholder(video_placeholder(user_id, "up_abc", None))
            .await
            .unwrap();

        let asset = repo.get(id).await.unwrap().expect("asset should exist");
        assert_eq!(asset.provider_asset_id.as_deref(), Some("up_abc"));
        assert_eq!(asset.provider_upload_id.as_deref(), Some("up_abc"));
        assert_eq!(asset.processing_status, ProcessingStatus::Preparing);
        assert!(asset.transcript_status.is_none());
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_link_provider_asset_is_idempotent() {
        let repo = PgAssetRepository::new(test_pool().await);
        let id = repo
            .insert_placeholder(video_placeholder(Uuid::new_v4(), "up_link", None))
            .await
            .unwrap();

        assert!(repo.link_provider_asset(id, "as_real").await.unwrap());
        // Replay: same id again is a no-op.
        assert!(!repo.link_provider_asset(id, "as_real").await.unwrap());

        let asset = repo.get(id).await.unwrap().unwrap();
        assert_eq!(asset.provider_asset_id.as_deref(), Some("as_real"));
        // The upload id column is untouched by the migration.
        assert_eq!(asset.provider_upload_id.as_deref(), Some("up_link"));
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_begin_transcription_cas_wins_once() {
        let repo = PgAssetRepository::new(test_pool().await);
        let id = repo
            .insert_placeholder(video_placeholder(Uuid::new_v4(), "up_cas", None))
            .await
            .unwrap();

        let sentinel = curio_core::pending_audio_url("as_cas", "rend_1", "audio.m4a");
        assert!(repo.begin_transcription(id, &sentinel).await.unwrap());
        // Second rendition event for the same asset must lose the CAS.
        assert!(!repo.begin_transcription(id, &sentinel).await.unwrap());

        assert_eq!(
            repo.transcript_status(id).await.unwrap(),
            Some(TranscriptStatus::Pending)
        );
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_insert_item_links_source_and_tags() {
        let pool = test_pool().await;
        let repo = PgAssetRepository::new(pool.clone());
        let tags = crate::tags::PgTagRepository::new(pool);
        let user_id = Uuid::new_v4();

        let source_id = repo
            .insert_placeholder(video_placeholder(user_id, "up_items", None))
            .await
            .unwrap();
        let tag = tags.create(user_id, "Electronics").await.unwrap();

        let item_id = repo
            .insert_item(CreateItemRequest {
                user_id,
                source_video_id: source_id,
                name: "Dell Laptop".to_string(),
                description: "Work laptop on the desk".to_string(),
                estimated_value: 900.0,
                item_timestamp: Some(12.3),
                room_id: None,
                tag_ids: vec![tag.id],
            })
            .await
            .unwrap();

        let item = repo.get(item_id).await.unwrap().unwrap();
        assert_eq!(item.media_type, MediaType::Item);
        assert_eq!(item.source_video_id, Some(source_id));
        assert_eq!(item.estimated_value, Some(900.0));
        assert_eq!(item.item_timestamp, Some(12.3));
    }
}
