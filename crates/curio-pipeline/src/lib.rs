//! # curio-pipeline
//!
//! The webhook-driven asset-state reconciliation pipeline.
//!
//! This crate provides:
//! - Typed parsing of provider webhook payloads
//! - The identity resolver cascade (asset id, correlation id, upload-id
//!   placeholder)
//! - An explicit state transition table and the processor that applies it
//! - The stage orchestrator (transcription dispatch, merge trigger)
//! - The AI merge engine with layered output recovery
//! - The stuck-asset sweep

pub mod event;
pub mod merge;
pub mod orchestrator;
pub mod processor;
pub mod resolver;
pub mod sweep;
pub mod transitions;

// Re-export core types
pub use curio_core::*;

pub use event::{ProviderEvent, WebhookPayload};
pub use merge::{MergeConfig, MergeEngine, MergeOutcome, MergeRequest};
pub use orchestrator::{OrchestratorConfig, StageOrchestrator};
pub use processor::EventProcessor;
pub use resolver::{resolve, ResolveStrategy, DEFAULT_CASCADE};
pub use sweep::{SweepConfig, SweepHandle, Sweeper};
pub use transitions::{plan, SkipReason, Transition};
