//! Structured logging schema and field name constants for curio.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), applied transitions |
//! | DEBUG | Decision points, resolver strategy hits, config choices |
//! | TRACE | Per-item iteration (merged items, parsed events) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → transition → side-effect.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "pipeline", "inference", "sweep"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "resolver", "transitions", "orchestrator", "merge", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "ingest", "resolve", "apply_transition", "dispatch", "merge"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Local asset UUID being operated on.
pub const ASSET_ID: &str = "asset_id";

/// Provider-side event id from the webhook payload.
pub const EVENT_ID: &str = "event_id";

/// Webhook event type string.
pub const EVENT_TYPE: &str = "event_type";

/// Provider-side asset id (or upload-id placeholder).
pub const PROVIDER_ASSET_ID: &str = "provider_asset_id";

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items produced by a merge.
pub const ITEM_COUNT: &str = "item_count";

/// Number of scratch items loaded for a merge.
pub const SCRATCH_COUNT: &str = "scratch_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for extraction.
pub const MODEL: &str = "model";

/// Which recovery rung parsed the model output ("direct", "sanitized",
/// "regex", "scratch_fallback").
pub const PARSE_STRATEGY: &str = "parse_strategy";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
