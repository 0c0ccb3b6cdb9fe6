//! # curio-core
//!
//! Shared types for the curio media-inventory pipeline.
//!
//! This crate provides:
//! - The data model (assets, webhook events, scratch items, tags, rooms)
//! - Processing and transcript status enums with forward-only semantics
//! - The pending-audio sentinel helpers
//! - Error taxonomy and `Result` alias
//! - Structured logging field constants
//! - Environment variable names and default constants
//! - The broadcast event bus feeding the realtime change feed

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, ServerEvent};
pub use models::{
    is_pending_audio_url, new_v7, parse_pending_audio_url, pending_audio_url, stream_url, Asset,
    CreateAssetRequest, CreateItemRequest, InventoryItem, MediaType, PlaybackInfo,
    ProcessingStatus, Room, ScratchItem, StoreEventRequest, Tag, TranscriptStatus, WebhookEvent,
};
pub use traits::{AssetLookup, GenerationBackend};
