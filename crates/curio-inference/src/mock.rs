//! Mock generation backend for deterministic testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use curio_core::{Error, GenerationBackend, Result};

/// Mock generation backend returning a scripted response and recording calls.
#[derive(Clone)]
pub struct MockGenerationBackend {
    response: Arc<Mutex<Option<String>>>,
    fail_with: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// One recorded generation call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(None)),
            fail_with: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the next (and every) response.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        *self.response.lock().unwrap() = Some(response.into());
        self
    }

    /// Make every call fail with the given message.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        *self.fail_with.lock().unwrap() = Some(message.into());
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(Error::Inference(message));
        }

        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "[]".to_string()))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let backend = MockGenerationBackend::new().with_response("[{\"name\":\"Lamp\"}]");
        let out = backend.generate_json("sys", "prompt").await.unwrap();
        assert_eq!(out, "[{\"name\":\"Lamp\"}]");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, "sys");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let backend = MockGenerationBackend::new().with_failure("boom");
        let err = backend.generate_json("", "p").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
