//! Tag repository. Tags form a closed vocabulary for the merge engine:
//! they are matched by name but never auto-created.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use curio_core::{Error, Result, Tag};

/// PostgreSQL tag repository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Tag {
        Tag {
            id: r.get("id"),
            user_id: r.get("user_id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }
    }

    /// Create a tag (user-initiated side path, not the merge engine).
    pub async fn create(&self, user_id: Uuid, name: &str) -> Result<Tag> {
        let id = curio_core::new_v7();
        let now = Utc::now();
        sqlx::query("INSERT INTO tag (id, user_id, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(user_id)
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(Tag {
            id,
            user_id,
            name: name.to_string(),
            created_at: now,
        })
    }

    /// List a user's tags.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, created_at FROM tag WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    /// Case-insensitive lookup by name.
    pub async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, created_at FROM tag
             WHERE user_id = $1 AND lower(name) = lower($2)",
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }
}
