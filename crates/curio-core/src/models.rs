//! Core data model for curio: assets, webhook events, scratch items,
//! tags, and rooms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Generate a new UUIDv7 identifier (time-ordered, used for all new rows).
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Kind of media an asset row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Source video captured by the user.
    Video,
    /// Directly uploaded photo.
    Image,
    /// Inventory item derived from a source video.
    Item,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Item => "item",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "item" => Self::Item,
            _ => Self::Video,
        }
    }
}

/// Provider-side transcode state of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Upload created, provider has not confirmed a playable asset yet.
    Preparing,
    /// Transcode complete, playback metadata populated.
    Ready,
    /// Provider reported a transcode failure.
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ready" => Self::Ready,
            "error" => Self::Error,
            _ => Self::Preparing,
        }
    }
}

/// Transcription progress of a source video.
///
/// Stored nullable: `None` means transcription has never been requested.
/// The status only moves forward; a `Completed` status is never regressed
/// by replayed webhook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    /// Transcription requested, collaborator not yet started.
    Pending,
    /// Collaborator is transcribing.
    Processing,
    /// Transcript text persisted.
    Completed,
    /// Collaborator reported a failure.
    Error,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// True if transcription is underway or done and must not be re-requested.
    pub fn blocks_retrigger(status: Option<Self>) -> bool {
        matches!(
            status,
            Some(Self::Pending) | Some(Self::Processing) | Some(Self::Completed)
        )
    }
}

// =============================================================================
// PENDING AUDIO SENTINEL
// =============================================================================

/// Scheme prefix of the pending audio sentinel.
const PENDING_AUDIO_SCHEME: &str = "pending://";

/// Encode the structured pending-audio sentinel.
///
/// The sentinel is stored in `audio_url` while the static audio rendition is
/// being fetched. It is not a playable URL; downstream code must recognize
/// it via [`is_pending_audio_url`] and replace it once the real URL exists.
pub fn pending_audio_url(asset_id: &str, rendition_id: &str, rendition_name: &str) -> String {
    format!(
        "{}{}/{}/{}",
        PENDING_AUDIO_SCHEME, asset_id, rendition_id, rendition_name
    )
}

/// True if the given `audio_url` value is the pending sentinel.
pub fn is_pending_audio_url(url: &str) -> bool {
    url.starts_with(PENDING_AUDIO_SCHEME)
}

/// Decode a pending sentinel into (asset id, rendition id, rendition name).
pub fn parse_pending_audio_url(url: &str) -> Option<(String, String, String)> {
    let rest = url.strip_prefix(PENDING_AUDIO_SCHEME)?;
    let mut parts = rest.splitn(3, '/');
    let asset = parts.next()?.to_string();
    let rendition = parts.next()?.to_string();
    let name = parts.next()?.to_string();
    Some((asset, rendition, name))
}

/// Build the playable stream URL for a confirmed playback id.
pub fn stream_url(playback_id: &str) -> String {
    format!("https://stream.provider.example/{}.m3u8", playback_id)
}

// =============================================================================
// ASSET
// =============================================================================

/// One media item: a source video, a derived inventory item, or a photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_type: MediaType,
    /// Display name; set by the merge engine for derived items.
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_source_video: bool,
    /// Back-reference to the video an item was extracted from.
    pub source_video_id: Option<Uuid>,
    /// The transcoding provider's id for this media. Deliberately populated
    /// with the *upload* id as a placeholder until the upload-linked event
    /// migrates it to the real asset id.
    pub provider_asset_id: Option<String>,
    pub provider_upload_id: Option<String>,
    /// Client-generated id attached at upload time; survives page reloads.
    pub provider_correlation_id: Option<String>,
    pub processing_status: ProcessingStatus,
    pub playback_id: Option<String>,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub max_resolution: Option<String>,
    pub media_url: Option<String>,
    /// Real audio URL once the static rendition exists; pending sentinel
    /// (see [`pending_audio_url`]) while it is being produced.
    pub audio_url: Option<String>,
    pub transcript_text: Option<String>,
    pub transcript_status: Option<TranscriptStatus>,
    /// Seconds into the source video, for derived items.
    pub item_timestamp: Option<f64>,
    pub estimated_value: Option<f64>,
    /// True once the AI merge has written derived items for this source.
    pub is_processed: bool,
    pub room_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a placeholder asset at upload time.
#[derive(Debug, Clone)]
pub struct CreateAssetRequest {
    pub user_id: Uuid,
    pub media_type: MediaType,
    pub is_source_video: bool,
    /// Upload id, stored in `provider_asset_id` as the placeholder.
    pub provider_upload_id: Option<String>,
    pub provider_correlation_id: Option<String>,
}

/// Request for persisting one merged inventory item as a derived asset row.
#[derive(Debug, Clone)]
pub struct CreateItemRequest {
    pub user_id: Uuid,
    pub source_video_id: Uuid,
    pub name: String,
    pub description: String,
    pub estimated_value: f64,
    pub item_timestamp: Option<f64>,
    pub room_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
}

/// Playback metadata extracted from an asset-ready event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackInfo {
    pub playback_id: String,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub max_resolution: Option<String>,
}

/// A finished inventory item ready to persist as a derived asset row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub name: String,
    pub description: String,
    /// Never None in persisted results; the merge engine assigns a
    /// category-based fallback when no value is determinable.
    pub estimated_value: f64,
    /// Seconds into the source video, normalized to one decimal place.
    pub timestamp: Option<f64>,
    pub tag_names: Vec<String>,
    pub room_name: Option<String>,
}

// =============================================================================
// WEBHOOK EVENT
// =============================================================================

/// One received provider notification, stored append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    /// Provider event id, unique; used for idempotent upsert and lookup.
    pub provider_event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub provider_asset_id: Option<String>,
    pub provider_upload_id: Option<String>,
    pub provider_correlation_id: Option<String>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    /// Resolved local asset id, once known.
    pub asset_id: Option<Uuid>,
    pub received_at: DateTime<Utc>,
}

/// Request for appending a webhook event to the store.
#[derive(Debug, Clone)]
pub struct StoreEventRequest {
    pub provider_event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub provider_asset_id: Option<String>,
    pub provider_upload_id: Option<String>,
    pub provider_correlation_id: Option<String>,
}

// =============================================================================
// SCRATCH ITEM
// =============================================================================

/// A provisional, visually-detected candidate inventory entry produced by
/// real-time frame analysis during upload. Consumed by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchItem {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Initially null; back-filled once the real provider asset id is known.
    pub provider_asset_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub estimated_value: Option<f64>,
    /// Seconds into the source video where the item was detected.
    pub detected_at: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// TAG / ROOM
// =============================================================================

/// User-scoped named tag. Never auto-created by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// User-scoped named room. Created on demand during merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_round_trip() {
        for status in [
            ProcessingStatus::Preparing,
            ProcessingStatus::Ready,
            ProcessingStatus::Error,
        ] {
            assert_eq!(ProcessingStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_processing_status_unknown_defaults_to_preparing() {
        assert_eq!(
            ProcessingStatus::parse("garbage"),
            ProcessingStatus::Preparing
        );
    }

    #[test]
    fn test_transcript_status_round_trip() {
        for status in [
            TranscriptStatus::Pending,
            TranscriptStatus::Processing,
            TranscriptStatus::Completed,
            TranscriptStatus::Error,
        ] {
            assert_eq!(TranscriptStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TranscriptStatus::parse("garbage"), None);
    }

    #[test]
    fn test_transcript_status_blocks_retrigger() {
        assert!(TranscriptStatus::blocks_retrigger(Some(
            TranscriptStatus::Pending
        )));
        assert!(TranscriptStatus::blocks_retrigger(Some(
            TranscriptStatus::Processing
        )));
        assert!(TranscriptStatus::blocks_retrigger(Some(
            TranscriptStatus::Completed
        )));
        assert!(!TranscriptStatus::blocks_retrigger(Some(
            TranscriptStatus::Error
        )));
        assert!(!TranscriptStatus::blocks_retrigger(None));
    }

    #[test]
    fn test_pending_audio_sentinel_round_trip() {
        let url = pending_audio_url("as_123", "rend_9", "audio.m4a");
        assert!(is_pending_audio_url(&url));
        let (asset, rendition, name) = parse_pending_audio_url(&url).unwrap();
        assert_eq!(asset, "as_123");
        assert_eq!(rendition, "rend_9");
        assert_eq!(name, "audio.m4a");
    }

    #[test]
    fn test_pending_audio_sentinel_rejects_real_urls() {
        assert!(!is_pending_audio_url("https://cdn.example/audio.m4a"));
        assert!(parse_pending_audio_url("https://cdn.example/audio.m4a").is_none());
    }

    #[test]
    fn test_stream_url_embeds_playback_id() {
        assert_eq!(
            stream_url("pb_42"),
            "https://stream.provider.example/pb_42.m3u8"
        );
    }

    #[test]
    fn test_media_type_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&MediaType::Video).unwrap(),
            "\"video\""
        );
        assert_eq!(serde_json::to_string(&MediaType::Item).unwrap(), "\"item\"");
    }
}
