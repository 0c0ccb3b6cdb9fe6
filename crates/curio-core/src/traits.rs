//! Core traits for curio abstractions.
//!
//! These traits define the seams between the pipeline and its collaborators,
//! enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Asset;

// =============================================================================
// ASSET LOOKUP
// =============================================================================

/// Lookup surface the identity resolver cascade runs against.
///
/// Implemented by the Postgres asset repository; mocked in resolver tests.
#[async_trait]
pub trait AssetLookup: Send + Sync {
    /// Exact match on `provider_asset_id`.
    async fn find_by_provider_asset_id(&self, provider_asset_id: &str) -> Result<Option<Asset>>;

    /// Exact match on `provider_correlation_id`.
    async fn find_by_correlation_id(&self, correlation_id: &str) -> Result<Option<Asset>>;
}

// =============================================================================
// GENERATION
// =============================================================================

/// Backend for structured text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate with system context, requesting JSON output.
    ///
    /// Implementations ask the model for a JSON object/array response but
    /// make no validity guarantee; callers must parse defensively.
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
