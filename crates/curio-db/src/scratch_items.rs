//! Scratch item repository: provisional visually-detected inventory entries
//! awaiting consolidation by the merge engine.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use curio_core::{Error, Result, ScratchItem};

/// Request for creating a scratch item during capture.
#[derive(Debug, Clone)]
pub struct CreateScratchItemRequest {
    pub user_id: Uuid,
    /// None during the placeholder identity window.
    pub provider_asset_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub estimated_value: Option<f64>,
    pub detected_at: Option<f64>,
}

/// PostgreSQL scratch item repository.
#[derive(Clone)]
pub struct PgScratchItemRepository {
    pool: Pool<Postgres>,
}

impl PgScratchItemRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> ScratchItem {
        ScratchItem {
            id: r.get("id"),
            user_id: r.get("user_id"),
            provider_asset_id: r.get("provider_asset_id"),
            name: r.get("name"),
            description: r.get("description"),
            estimated_value: r.get("estimated_value"),
            detected_at: r.get("detected_at"),
            created_at: r.get("created_at"),
        }
    }

    /// Insert a new scratch item.
    pub async fn insert(&self, req: CreateScratchItemRequest) -> Result<Uuid> {
        let id = curio_core::new_v7();
        sqlx::query(
            "INSERT INTO scratch_item (id, user_id, provider_asset_id, name, description,
                                       estimated_value, detected_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(&req.provider_asset_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.estimated_value)
        .bind(req.detected_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    /// List a user's scratch items for one provider asset.
    pub async fn list_for_provider_asset(
        &self,
        user_id: Uuid,
        provider_asset_id: &str,
    ) -> Result<Vec<ScratchItem>> {
        let rows = sqlx::query(
            "SELECT id, user_id, provider_asset_id, name, description, estimated_value,
                    detected_at, created_at
             FROM scratch_item
             WHERE user_id = $1 AND provider_asset_id = $2
             ORDER BY detected_at ASC NULLS LAST",
        )
        .bind(user_id)
        .bind(provider_asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    /// Count a user's scratch items for one provider asset.
    pub async fn count_for_provider_asset(
        &self,
        user_id: Uuid,
        provider_asset_id: &str,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM scratch_item
             WHERE user_id = $1 AND provider_asset_id = $2",
        )
        .bind(user_id)
        .bind(provider_asset_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("n"))
    }

    /// Back-fill the provider asset id once the upload-linked event reveals
    /// it. Items captured during the placeholder window carry either the
    /// upload id or no id at all.
    pub async fn backfill_provider_asset_id(
        &self,
        user_id: Uuid,
        upload_id: Option<&str>,
        real_asset_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE scratch_item SET provider_asset_id = $1
             WHERE user_id = $2 AND (provider_asset_id IS NULL OR provider_asset_id = $3)",
        )
        .bind(real_asset_id)
        .bind(user_id)
        .bind(upload_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete a user's scratch items for one provider asset (post-merge
    /// cleanup, only when configured).
    pub async fn delete_for_provider_asset(
        &self,
        user_id: Uuid,
        provider_asset_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM scratch_item WHERE user_id = $1 AND provider_asset_id = $2",
        )
        .bind(user_id)
        .bind(provider_asset_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::test_pool;

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_backfill_targets_null_and_upload_id_rows() {
        let repo = PgScratchItemRepository::new(test_pool().await);
        let user_id = Uuid::new_v4();

        for provider_asset_id in [None, Some("up_1".to_string()), Some("as_other".to_string())] {
            repo.insert(CreateScratchItemRequest {
                user_id,
                provider_asset_id,
                name: "Dell Laptop".to_string(),
                description: None,
                estimated_value: Some(900.0),
                detected_at: Some(11.9),
            })
            .await
            .unwrap();
        }

        let updated = repo
            .backfill_provider_asset_id(user_id, Some("up_1"), "as_1")
            .await
            .unwrap();
        assert_eq!(updated, 2, "null and upload-id rows only");

        let items = repo.list_for_provider_asset(user_id, "as_1").await.unwrap();
        assert_eq!(items.len(), 2);
        let untouched = repo
            .list_for_provider_asset(user_id, "as_other")
            .await
            .unwrap();
        assert_eq!(untouched.len(), 1);
    }
}
