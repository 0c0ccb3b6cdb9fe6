//! # curio-db
//!
//! PostgreSQL database layer for curio.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for assets, webhook events, scratch items,
//!   tags, and rooms
//! - Conditional (compare-and-swap) transition updates for the asset state
//!   machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use curio_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/curio").await?;
//!     let stuck = db.assets.find_stuck_transcriptions(300).await?;
//!     println!("{} stuck transcriptions", stuck.len());
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod pool;
pub mod rooms;
pub mod scratch_items;
pub mod tags;
pub mod webhook_events;

// Test fixtures for integration tests.
// Always compiled so dependent crates' integration tests can reuse them.
pub mod test_fixtures;

pub use assets::PgAssetRepository;
pub use pool::create_pool;
pub use rooms::PgRoomRepository;
pub use scratch_items::{CreateScratchItemRequest, PgScratchItemRepository};
pub use tags::PgTagRepository;
pub use webhook_events::PgWebhookEventRepository;

// Re-export core types
pub use curio_core::*;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Asset repository: lookups, transitions, item persistence.
    pub assets: PgAssetRepository,
    /// Append-only webhook event store.
    pub events: PgWebhookEventRepository,
    /// Scratch item repository for provisional detections.
    pub scratch_items: PgScratchItemRepository,
    /// Tag repository (closed vocabulary for the merge engine).
    pub tags: PgTagRepository,
    /// Room repository (created on demand during merge).
    pub rooms: PgRoomRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            assets: PgAssetRepository::new(pool.clone()),
            events: PgWebhookEventRepository::new(pool.clone()),
            scratch_items: PgScratchItemRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            rooms: PgRoomRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
