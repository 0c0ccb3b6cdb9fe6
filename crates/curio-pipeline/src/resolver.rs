//! Identity resolver: maps a webhook's partial identifiers onto a local
//! asset via an ordered strategy cascade.
//!
//! The provider's asset id is unknown at upload time; the placeholder row
//! stores the upload id in `provider_asset_id` until the upload-linked
//! event migrates it. Strategy order is therefore: real asset id first,
//! then client correlation id, then the upload-id placeholder.

use tracing::{debug, info};

use curio_core::{Asset, AssetLookup, Result};

use crate::event::EventKeys;

/// One lookup strategy in the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// `provider_asset_id` equals the event's nominal asset id.
    ProviderAssetId,
    /// `provider_correlation_id` equals the event's passthrough value.
    CorrelationId,
    /// `provider_asset_id` still holds the upload id placeholder.
    UploadIdPlaceholder,
}

impl ResolveStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderAssetId => "provider_asset_id",
            Self::CorrelationId => "correlation_id",
            Self::UploadIdPlaceholder => "upload_id_placeholder",
        }
    }
}

/// Cascade order, stop at first hit.
pub const DEFAULT_CASCADE: [ResolveStrategy; 3] = [
    ResolveStrategy::ProviderAssetId,
    ResolveStrategy::CorrelationId,
    ResolveStrategy::UploadIdPlaceholder,
];

/// Resolve an event's keys to at most one local asset.
///
/// "Not found" is not an error. The caller leaves the stored event
/// unprocessed for later reconciliation; assets are never guessed.
pub async fn resolve(
    lookup: &dyn AssetLookup,
    keys: &EventKeys,
) -> Result<Option<(Asset, ResolveStrategy)>> {
    for strategy in DEFAULT_CASCADE {
        let hit = match strategy {
            ResolveStrategy::ProviderAssetId => match &keys.provider_asset_id {
                Some(id) => lookup.find_by_provider_asset_id(id).await?,
                None => None,
            },
            ResolveStrategy::CorrelationId => match &keys.provider_correlation_id {
                Some(id) => lookup.find_by_correlation_id(id).await?,
                None => None,
            },
            ResolveStrategy::UploadIdPlaceholder => match &keys.provider_upload_id {
                Some(id) => lookup.find_by_provider_asset_id(id).await?,
                None => None,
            },
        };
        if let Some(asset) = hit {
            debug!(
                subsystem = "pipeline",
                component = "resolver",
                asset_id = %asset.id,
                strategy = strategy.as_str(),
                "Resolved asset"
            );
            return Ok(Some((asset, strategy)));
        }
    }
    info!(
        subsystem = "pipeline",
        component = "resolver",
        provider_asset_id = keys.provider_asset_id.as_deref().unwrap_or("-"),
        provider_upload_id = keys.provider_upload_id.as_deref().unwrap_or("-"),
        "No matching asset; event left unprocessed"
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    use curio_core::{MediaType, ProcessingStatus};

    struct MapLookup {
        by_provider_asset_id: HashMap<String, Asset>,
        by_correlation_id: HashMap<String, Asset>,
    }

    #[async_trait]
    impl AssetLookup for MapLookup {
        async fn find_by_provider_asset_id(
            &self,
            provider_asset_id: &str,
        ) -> Result<Option<Asset>> {
            Ok(self.by_provider_asset_id.get(provider_asset_id).cloned())
        }

        async fn find_by_correlation_id(&self, correlation_id: &str) -> Result<Option<Asset>> {
            Ok(self.by_correlation_id.get(correlation_id).cloned())
        }
    }

    fn asset(provider_asset_id: &str) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            media_type: MediaType::Video,
            name: None,
            description: None,
            is_source_video: true,
            source_video_id: None,
            provider_asset_id: Some(provider_asset_id.to_string()),
            provider_upload_id: None,
            provider_correlation_id: None,
            processing_status: ProcessingStatus::Preparing,
            playback_id: None,
            duration: None,
            aspect_ratio: None,
            max_resolution: None,
            media_url: None,
            audio_url: None,
            transcript_text: None,
            transcript_status: None,
            item_timestamp: None,
            estimated_value: None,
            is_processed: false,
            room_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn keys(
        asset_id: Option<&str>,
        upload_id: Option<&str>,
        correlation_id: Option<&str>,
    ) -> EventKeys {
        EventKeys {
            provider_asset_id: asset_id.map(str::to_string),
            provider_upload_id: upload_id.map(str::to_string),
            provider_correlation_id: correlation_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_asset_id_wins_over_later_strategies() {
        let winner = asset("as_1");
        let decoy = asset("up_1");
        let lookup = MapLookup {
            by_provider_asset_id: HashMap::from([
                ("as_1".to_string(), winner.clone()),
                ("up_1".to_string(), decoy),
            ]),
            by_correlation_id: HashMap::new(),
        };

        let (found, strategy) = resolve(&lookup, &keys(Some("as_1"), Some("up_1"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, winner.id);
        assert_eq!(strategy, ResolveStrategy::ProviderAssetId);
    }

    #[tokio::test]
    async fn test_correlation_id_preferred_over_upload_placeholder() {
        let by_correlation = asset("as_other");
        let by_upload = asset("up_1");
        let lookup = MapLookup {
            by_provider_asset_id: HashMap::from([("up_1".to_string(), by_upload)]),
            by_correlation_id: HashMap::from([("corr_9".to_string(), by_correlation.clone())]),
        };

        let (found, strategy) = resolve(&lookup, &keys(Some("as_1"), Some("up_1"), Some("corr_9")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_correlation.id);
        assert_eq!(strategy, ResolveStrategy::CorrelationId);
    }

    #[tokio::test]
    async fn test_placeholder_window_resolves_by_upload_id() {
        // Placeholder row carries the upload id in provider_asset_id and no
        // correlation id; an event carrying only upload_id must still hit.
        let placeholder = asset("up_1");
        let lookup = MapLookup {
            by_provider_asset_id: HashMap::from([("up_1".to_string(), placeholder.clone())]),
            by_correlation_id: HashMap::new(),
        };

        let (found, strategy) = resolve(&lookup, &keys(None, Some("up_1"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, placeholder.id);
        assert_eq!(strategy, ResolveStrategy::UploadIdPlaceholder);
    }

    #[tokio::test]
    async fn test_not_found_is_none_not_error() {
        let lookup = MapLookup {
            by_provider_asset_id: HashMap::new(),
            by_correlation_id: HashMap::new(),
        };
        let result = resolve(&lookup, &keys(Some("as_1"), Some("up_1"), Some("corr_9")))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_no_keys_resolves_to_none() {
        let lookup = MapLookup {
            by_provider_asset_id: HashMap::from([("as_1".to_string(), asset("as_1"))]),
            by_correlation_id: HashMap::new(),
        };
        assert!(resolve(&lookup, &keys(None, None, None))
            .await
            .unwrap()
            .is_none());
    }
}
