//! Inbound webhook payload parsing.
//!
//! The provider posts a discriminated-union JSON body; the `type` field
//! selects the variant. Unrecognized types are still stored in the event
//! store, so parsing never rejects a structurally valid body.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use curio_core::{PlaybackInfo, StoreEventRequest};

/// Upload-linked event type.
pub const TYPE_UPLOAD_ASSET_CREATED: &str = "video.upload.asset_created";
/// Transcode-complete event type.
pub const TYPE_ASSET_READY: &str = "video.asset.ready";
/// Static-rendition event type, long spelling.
pub const TYPE_STATIC_RENDITION_READY: &str = "video.asset.static_rendition.ready";
/// Static-rendition event type, short spelling. The provider has emitted
/// both; they are treated as aliases.
pub const TYPE_STATIC_RENDITION_READY_SHORT: &str = "video.static_rendition.ready";

/// Raw webhook body as posted by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Provider event id. Some test deliveries omit it; see
    /// [`WebhookPayload::provider_event_id`].
    pub id: Option<String>,
    /// Empty when the delivery omitted `type`; such events project to
    /// [`ProviderEvent::Unrecognized`] and are stored, not rejected, so the
    /// provider stops retrying.
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

/// The `data` object. Field meaning depends on the event type, so every
/// field is optional and the typed [`ProviderEvent`] projection decides
/// which ones matter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    /// Upload id for upload events, asset id for asset events, rendition id
    /// for rendition events.
    pub id: Option<String>,
    /// Real asset id on upload-linked and rendition events.
    pub asset_id: Option<String>,
    pub upload_id: Option<String>,
    /// Client-generated correlation id, echoed back by the provider.
    pub passthrough: Option<String>,
    /// Rendition name on rendition events (e.g. `audio.m4a`).
    pub name: Option<String>,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub max_stored_resolution: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackId {
    pub id: String,
}

/// Typed projection of a webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// The provider linked an upload to its real asset id.
    UploadAssetCreated {
        upload_id: String,
        real_asset_id: String,
    },
    /// Transcode finished; playback metadata is available.
    AssetReady {
        provider_asset_id: String,
        playback: Option<PlaybackInfo>,
    },
    /// A static rendition (audio extract) finished.
    StaticRenditionReady {
        provider_asset_id: String,
        rendition_id: String,
        rendition_name: String,
    },
    /// Stored but not acted on.
    Unrecognized { event_type: String },
}

/// Correlation identifiers denormalized into the event store row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventKeys {
    pub provider_asset_id: Option<String>,
    pub provider_upload_id: Option<String>,
    pub provider_correlation_id: Option<String>,
}

impl WebhookPayload {
    pub fn parse(body: &JsonValue) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    /// The delivery's `type` field, `None` when the provider omitted it.
    pub fn declared_type(&self) -> Option<&str> {
        (!self.event_type.is_empty()).then_some(self.event_type.as_str())
    }

    /// Provider event id, synthesized from type and data id when the
    /// delivery omits one. The synthesized form is stable across redelivery
    /// of the same logical event.
    pub fn provider_event_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}",
                self.declared_type().unwrap_or("unknown"),
                self.data.id.as_deref().unwrap_or("unknown")
            ),
        }
    }

    /// Project into the typed event the state machine consumes.
    pub fn event(&self) -> ProviderEvent {
        match self.event_type.as_str() {
            TYPE_UPLOAD_ASSET_CREATED => {
                match (self.data.id.clone(), self.data.asset_id.clone()) {
                    (Some(upload_id), Some(real_asset_id)) => ProviderEvent::UploadAssetCreated {
                        upload_id,
                        real_asset_id,
                    },
                    _ => ProviderEvent::Unrecognized {
                        event_type: self.event_type.clone(),
                    },
                }
            }
            TYPE_ASSET_READY => match self.data.id.clone() {
                Some(provider_asset_id) => ProviderEvent::AssetReady {
                    provider_asset_id,
                    playback: self.playback_info(),
                },
                None => ProviderEvent::Unrecognized {
                    event_type: self.event_type.clone(),
                },
            },
            TYPE_STATIC_RENDITION_READY | TYPE_STATIC_RENDITION_READY_SHORT => {
                match (self.data.asset_id.clone(), self.data.id.clone()) {
                    (Some(provider_asset_id), Some(rendition_id)) => {
                        ProviderEvent::StaticRenditionReady {
                            provider_asset_id,
                            rendition_id,
                            rendition_name: self
                                .data
                                .name
                                .clone()
                                .unwrap_or_else(|| "audio.m4a".to_string()),
                        }
                    }
                    _ => ProviderEvent::Unrecognized {
                        event_type: self.event_type.clone(),
                    },
                }
            }
            _ => ProviderEvent::Unrecognized {
                event_type: self.event_type.clone(),
            },
        }
    }

    /// Correlation keys the resolver cascade runs against, independent of
    /// whether the event type is recognized.
    pub fn keys(&self) -> EventKeys {
        let provider_asset_id = match self.event_type.as_str() {
            TYPE_ASSET_READY => self.data.id.clone(),
            TYPE_UPLOAD_ASSET_CREATED => self.data.asset_id.clone(),
            _ => self.data.asset_id.clone().or_else(|| {
                // Asset-scoped events other than the known three carry the
                // asset id in `data.id`.
                if self.event_type.starts_with("video.asset.") {
                    self.data.id.clone()
                } else {
                    None
                }
            }),
        };
        let provider_upload_id = match self.event_type.as_str() {
            TYPE_UPLOAD_ASSET_CREATED => self.data.id.clone(),
            _ => self.data.upload_id.clone(),
        };
        EventKeys {
            provider_asset_id,
            provider_upload_id,
            provider_correlation_id: self.data.passthrough.clone(),
        }
    }

    /// Build the append-only event store request for this delivery.
    pub fn store_request(&self, raw: JsonValue) -> StoreEventRequest {
        let keys = self.keys();
        StoreEventRequest {
            provider_event_id: self.provider_event_id(),
            event_type: self.event_type.clone(),
            payload: raw,
            provider_asset_id: keys.provider_asset_id,
            provider_upload_id: keys.provider_upload_id,
            provider_correlation_id: keys.provider_correlation_id,
        }
    }

    fn playback_info(&self) -> Option<PlaybackInfo> {
        self.data
            .playback_ids
            .first()
            .map(|playback| PlaybackInfo {
                playback_id: playback.id.clone(),
                duration: self.data.duration,
                aspect_ratio: self.data.aspect_ratio.clone(),
                max_resolution: self.data.max_stored_resolution.clone(),
            })
    }
}

/// True for the canonical audio render. Other renditions (mp4 downloads,
/// thumbnails) never trigger transcription.
pub fn is_audio_rendition(rendition_name: &str) -> bool {
    rendition_name.starts_with("audio")
}
