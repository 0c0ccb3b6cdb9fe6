//! Explicit state transition table for the asset state machine.
//!
//! [`plan`] is a pure function from (event, current persisted state) to a
//! [`Transition`]; the processor applies the plan with conditional updates.
//! Keeping the table pure makes every row unit-testable without a database.

use curio_core::{pending_audio_url, Asset, PlaybackInfo, TranscriptStatus};

use crate::event::{is_audio_rendition, ProviderEvent};

/// Planned effect of one event against one resolved asset.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Migrate the upload-id placeholder to the provider's real asset id
    /// and back-fill scratch items captured during the placeholder window.
    LinkUpload {
        real_asset_id: String,
        upload_id: Option<String>,
    },
    /// Apply playback metadata and flip processing status to ready.
    MarkReady { playback: PlaybackInfo },
    /// Set transcript status to pending with the sentinel audio URL, then
    /// dispatch a transcription request.
    BeginTranscription { pending_audio_url: String },
    /// Late rendition after a completed transcription: reconcile by
    /// re-running the merge if scratch items remain.
    TriggerMerge,
    /// Nothing to apply.
    Skip(SkipReason),
}

/// Why a transition planned to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Replayed upload-linked event; the real id is already in place.
    AlreadyLinked,
    /// Asset-ready delivery without playback metadata.
    MissingPlayback,
    /// Transcription already pending or processing (replay guard).
    TranscriptionInFlight,
    /// Rendition other than the canonical audio render.
    NotAudioRendition,
    /// Event type has no transition.
    UnrecognizedEvent,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyLinked => "already_linked",
            Self::MissingPlayback => "missing_playback",
            Self::TranscriptionInFlight => "transcription_in_flight",
            Self::NotAudioRendition => "not_audio_rendition",
            Self::UnrecognizedEvent => "unrecognized_event",
        }
    }
}

/// Compute the transition for an event against the asset's current state.
pub fn plan(event: &ProviderEvent, asset: &Asset) -> Transition {
    match event {
        ProviderEvent::UploadAssetCreated {
            upload_id,
            real_asset_id,
        } => {
            if asset.provider_asset_id.as_deref() == Some(real_asset_id.as_str()) {
                Transition::Skip(SkipReason::AlreadyLinked)
            } else {
                Transition::LinkUpload {
                    real_asset_id: real_asset_id.clone(),
                    upload_id: Some(upload_id.clone()),
                }
            }
        }
        ProviderEvent::AssetReady { playback, .. } => match playback {
            Some(playback) => Transition::MarkReady {
                playback: playback.clone(),
            },
            None => Transition::Skip(SkipReason::MissingPlayback),
        },
        ProviderEvent::StaticRenditionReady {
            provider_asset_id,
            rendition_id,
            rendition_name,
        } => {
            if !is_audio_rendition(rendition_name) {
                return Transition::Skip(SkipReason::NotAudioRendition);
            }
            match asset.transcript_status {
                Some(TranscriptStatus::Pending) | Some(TranscriptStatus::Processing) => {
                    Transition::Skip(SkipReason::TranscriptionInFlight)
                }
                Some(TranscriptStatus::Completed) => Transition::TriggerMerge,
                None | Some(TranscriptStatus::Error) => Transition::BeginTranscription {
                    pending_audio_url: pending_audio_url(
                        provider_asset_id,
                        rendition_id,
                        rendition_name,
                    ),
                },
            }
        }
        ProviderEvent::Unrecognized { .. } => Transition::Skip(SkipReason::UnrecognizedEvent),
    }
}
