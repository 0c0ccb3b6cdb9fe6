//! Centralized default constants for the curio system.
//!
//! **This module is the single source of truth** for all shared default values
//! and environment variable names. All crates reference these constants
//! instead of defining their own magic strings.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period (merge endpoint).
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default maximum request body size in bytes (webhook payloads are small;
/// 1 MiB leaves headroom for large rendition metadata).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// WEBHOOK INGESTION
// =============================================================================

/// Header carrying the provider's HMAC signature.
pub const SIGNATURE_HEADER: &str = "provider-signature";

/// Maximum accepted age of a signed webhook timestamp in seconds.
/// Deliveries older than this are treated as replays and rejected.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Shared secret for webhook signature verification.
pub const ENV_WEBHOOK_SECRET: &str = "PROVIDER_WEBHOOK_SECRET";

/// Set to "true"/"1" to bypass signature verification (non-production only).
pub const ENV_WEBHOOK_SIGNATURE_DISABLED: &str = "WEBHOOK_SIGNATURE_DISABLED";

// =============================================================================
// STAGE ORCHESTRATION
// =============================================================================

/// Base URL used to construct outbound collaborator calls.
pub const ENV_SITE_BASE_URL: &str = "SITE_BASE_URL";

/// Default site base URL.
pub const DEFAULT_SITE_BASE_URL: &str = "http://localhost:3000";

/// Bearer token for the transcription collaborator.
pub const ENV_TRANSCRIBE_AUTH_TOKEN: &str = "TRANSCRIBE_AUTH_TOKEN";

/// Timeout for the outbound transcription dispatch in seconds.
pub const TRANSCRIBE_DISPATCH_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// MERGE ENGINE
// =============================================================================

/// Set to "true"/"1" to delete scratch items after a successful merge.
/// Default: retained for auditability.
pub const ENV_SCRATCH_DELETE_AFTER_MERGE: &str = "SCRATCH_DELETE_AFTER_MERGE";

/// AI model used for inventory extraction.
pub const ENV_EXTRACTION_MODEL: &str = "EXTRACTION_MODEL";

/// Default extraction model.
pub const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";

/// Timeout for the generative-AI extraction call in seconds.
pub const EXTRACTION_TIMEOUT_SECS: u64 = 120;

/// Floor price assigned when no value is determinable for an item.
pub const FALLBACK_ITEM_VALUE: f64 = 100.0;

// =============================================================================
// INFERENCE BACKEND
// =============================================================================

/// OpenAI-compatible API base URL.
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// API key for the OpenAI-compatible backend.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

// =============================================================================
// STUCK-ASSET SWEEP
// =============================================================================

/// Enable/disable the stuck-asset sweep.
pub const ENV_SWEEP_ENABLED: &str = "SWEEP_ENABLED";

/// Sweep polling interval in seconds.
pub const ENV_SWEEP_INTERVAL_SECS: &str = "SWEEP_INTERVAL_SECS";

/// Default sweep polling interval in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Age past which a non-terminal asset is considered stuck, in seconds.
pub const ENV_SWEEP_STUCK_AFTER_SECS: &str = "SWEEP_STUCK_AFTER_SECS";

/// Default stuck threshold in seconds.
pub const SWEEP_STUCK_AFTER_SECS: u64 = 300;

// =============================================================================
// EVENT BUS
// =============================================================================

/// Broadcast channel capacity for the realtime event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;
