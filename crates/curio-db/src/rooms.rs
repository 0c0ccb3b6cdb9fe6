//! Room repository. Unlike tags, rooms may be invented by the merge engine
//! and are created on demand.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use curio_core::{Error, Result, Room};

/// PostgreSQL room repository.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: Pool<Postgres>,
}

impl PgRoomRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Room {
        Room {
            id: r.get("id"),
            user_id: r.get("user_id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }
    }

    /// List a user's rooms.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, created_at FROM room WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    /// Find a room by name (case-insensitive) or create it.
    ///
    /// Safe under concurrent merges: a lost insert race falls back to the
    /// winner's row.
    pub async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Room> {
        if let Some(room) = self.find_by_name(user_id, name).await? {
            return Ok(room);
        }

        let id = curio_core::new_v7();
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO room (id, user_id, name, created_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, name) DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if inserted.rows_affected() > 0 {
            return Ok(Room {
                id,
                user_id,
                name: name.to_string(),
                created_at: now,
            });
        }

        self.find_by_name(user_id, name)
            .await?
            .ok_or_else(|| Error::Internal(format!("room '{}' vanished after conflict", name)))
    }

    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, created_at FROM room
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::test_pool;

    #[tokio::test]
    #[ignore = "requires Postgres (DATABASE_URL)"]
    async fn test_find_or_create_is_case_insensitive() {
        let repo = PgRoomRepository::new(test_pool().await);
        let user_id = Uuid::new_v4();

        let first = repo.find_or_create(user_id, "Living Room").await.unwrap();
        let second = repo.find_or_create(user_id, "living room").await.unwrap();
        assert_eq!(first.id, second.id);

        let rooms = repo.list(user_id).await.unwrap();
        assert_eq!(rooms.len(), 1);
    }
}
