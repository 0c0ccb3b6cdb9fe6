//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use curio_core::{Error, Result};

/// Maximum number of connections in the pool.
pub const MAX_CONNECTIONS: u32 = 10;

/// Connection acquire timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds.
pub const IDLE_TIMEOUT_SECS: u64 = 600;

/// Maximum connection lifetime in seconds.
const MAX_LIFETIME_SECS: u64 = 1800;

/// Create a new PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = MAX_CONNECTIONS,
        connect_timeout_secs = CONNECT_TIMEOUT_SECS,
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(IDLE_TIMEOUT_SECS))
        .max_lifetime(Duration::from_secs(MAX_LIFETIME_SECS))
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}
