//! Append-only event store for raw inbound provider notifications.
//!
//! Rows are keyed by the provider's event id so redelivered events upsert
//! instead of duplicating. The only later mutation is the processed flag.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use curio_core::{Error, Result, StoreEventRequest, WebhookEvent};

/// PostgreSQL webhook event store.
#[derive(Clone)]
pub struct PgWebhookEventRepository {
    pool: Pool<Postgres>,
}

impl PgWebhookEventRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> WebhookEvent {
        WebhookEvent {
            id: r.get("id"),
            provider_event_id: r.get("provider_event_id"),
            event_type: r.get("event_type"),
            payload: r.get("payload"),
            provider_asset_id: r.get("provider_asset_id"),
            provider_upload_id: r.get("provider_upload_id"),
            provider_correlation_id: r.get("provider_correlation_id"),
            processed: r.get("processed"),
            processed_at: r.get("processed_at"),
            asset_id: r.get("asset_id"),
            received_at: r.get("received_at"),
        }
    }

    /// Append a received event, idempotently.
    ///
    /// A redelivery of an already-stored provider event id refreshes the raw
    /// payload but never resets the processed flag.
    pub async fn store(&self, req: StoreEventRequest) -> Result<Uuid> {
        let id = curio_core::new_v7();
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO webhook_event (id, provider_event_id, event_type, payload,
                                        provider_asset_id, provider_upload_id,
                                        provider_correlation_id, processed, received_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8)
             ON CONFLICT (provider_event_id)
             DO UPDATE SET payload = EXCLUDED.payload
             RETURNING id",
        )
        .bind(id)
        .bind(&req.provider_event_id)
        .bind(&req.event_type)
        .bind(&req.payload)
        .bind(&req.provider_asset_id)
        .bind(&req.provider_upload_id)
        .bind(&req.provider_correlation_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("id"))
    }

    /// Get an event by the provider's event id.
    pub async fn get_by_provider_event_id(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<WebhookEvent>> {
        let row = sqlx::query(
            "SELECT id, provider_event_id, event_type, payload, provider_asset_id,
                    provider_upload_id, provider_correlation_id, processed, processed_at,
                    asset_id, received_at
             FROM webhook_event WHERE provider_event_id = $1",
        )
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    /// Mark an event processed, recording the resolved local asset.
    pub async fn mark_processed(
        &self,
        provider_event_id: &str,
        asset_id: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_event
             SET processed = true, processed_at = now(), asset_id = COALESCE($2, asset_id)
             WHERE provider_event_id = $1",
        )
        .bind(provider_event_id)
        .bind(asset_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Oldest-first unprocessed events, for manual or batch reconciliation.
    pub async fn list_unprocessed(&self, limit: i64) -> Result<Vec<WebhookEvent>> {
        let rows = sqlx::query(
            "SELECT id, provider_event_id, event_type, payload, provider_asset_id,
                    provider_upload_id, provider_correlation_id, processed, processed_at,
                    asset_id, received_at
             FROM webhook_event WHERE NOT processed
             ORDER BY received_at ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::test_pool;

    fn store_request(event_id: &str) -> StoreEventRequest {
        StoreEventRequest {
            provider_event_id: event_id.to_string(),
            event_type: "video.asset.ready".to_string(),
            payload: serde_json::json!({"type": "video.asset.ready", "id": event_id}),
            provider_asset_id: Some("as_1".to_string()),
            provider_upload_id: Some("up_1".to_string()),
            provider_correlation_id: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_store_and_fetch() {
        let repo = PgWebhookEventRepository::new(test_pool().await);
        let event_id = format!("evt_{}", Uuid::new_v4());
        repo.store(store_request(&event_id)).await.unwrap();

        let event = repo
            .get_by_provider_event_id(&event_id)
            .await
            .unwrap()
            .expect("event should exist");
        assert_eq!(event.event_type, "video.asset.ready");
        assert!(!event.processed);
        assert!(event.processed_at.is_none());
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_redelivery_does_not_reset_processed() {
        let repo = PgWebhookEventRepository::new(test_pool().await);
        let event_id = format!("evt_{}", Uuid::new_v4());

        repo.store(store_request(&event_id)).await.unwrap();
        repo.mark_processed(&event_id, None).await.unwrap();

        // Provider redelivers the same event.
        repo.store(store_request(&event_id)).await.unwrap();

        let event = repo
            .get_by_provider_event_id(&event_id)
            .await
            .unwrap()
            .unwrap();
        assert!(event.processed, "redelivery must not clear processed flag");
    }

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_mark_processed_records_asset() {
        let repo = PgWebhookEventRepository::new(test_pool().await);
        let event_id = format!("evt_{}", Uuid::new_v4());
        let asset_id = Uuid::new_v4();

        repo.store(store_request(&event_id)).await.unwrap();
        repo.mark_processed(&event_id, Some(asset_id)).await.unwrap();

        let event = repo
            .get_by_provider_event_id(&event_id)
            .await
            .unwrap()
            .unwrap();
        assert!(event.processed);
        assert_eq!(event.asset_id, Some(asset_id));
        assert!(event.processed_at.is_some());
    }
}
