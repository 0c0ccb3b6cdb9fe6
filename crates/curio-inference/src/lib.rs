//! # curio-inference
//!
//! Generative-AI backend abstraction for curio.
//!
//! This crate provides:
//! - The OpenAI-compatible chat backend used for inventory extraction
//!   (JSON output mode, bounded timeouts)
//! - A scripted mock backend for tests

pub mod mock;
pub mod openai;

// Re-export core types
pub use curio_core::*;

pub use mock::MockGenerationBackend;
pub use openai::{OpenAiBackend, OpenAiConfig};
