//! Bestiary LLM Provider Layer
//!
//! Implementations of the `ModelClient` and `CredentialProvider` traits from
//! `bestiary-domain`.
//!
//! # Providers
//!
//! - `MockClient`: Deterministic mock for testing
//! - `GeminiClient`: Google Gemini `generateContent` integration
//!
//! # Examples
//!
//! ```
//! use bestiary_llm::MockClient;
//! use bestiary_domain::ModelClient;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let client = MockClient::new("Hello from LLM!");
//! let result = rt.block_on(client.send("test prompt")).unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod credentials;
pub mod gemini;
pub mod usage;

use bestiary_domain::ModelClient;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use credentials::{
    ChainedCredentials, EnvFileCredentials, EnvVarCredentials, StaticCredentials,
};
pub use gemini::{GeminiClient, GeminiConfig};
pub use usage::{UsageEntry, UsageLog};

/// Errors that can occur during model calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response envelope could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Call did not finish in time
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Credential could not be found
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Mock model client for deterministic testing
///
/// Returns pre-configured responses without making any network calls.
/// Lookup order per call: scripted replies (FIFO), then per-prompt
/// responses, then the default response.
///
/// # Examples
///
/// ```
/// use bestiary_llm::MockClient;
/// use bestiary_domain::ModelClient;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
///
/// // Multiple responses
/// let mut client = MockClient::default();
/// client.add_response("prompt1", "response1");
/// client.add_response("prompt2", "response2");
/// assert_eq!(rt.block_on(client.send("prompt1")).unwrap(), "response1");
/// assert_eq!(rt.block_on(client.send("prompt2")).unwrap(), "response2");
/// ```
#[derive(Debug, Clone)]
pub struct MockClient {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, Result<String, ModelError>>>>,
    script: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    /// Create a new MockClient with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), Ok(response.into()));
    }

    /// Configure to return an error for a specific prompt
    pub fn add_error(&mut self, prompt: impl Into<String>, error: ModelError) {
        self.responses
            .lock()
            .unwrap()
            .insert(prompt.into(), Err(error));
    }

    /// Queue a reply for the next call, regardless of prompt
    pub fn push_reply(&self, reply: Result<String, ModelError>) {
        self.script.lock().unwrap().push_back(reply);
    }

    /// Get the number of times send was called
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Reset the call history
    pub fn reset_call_count(&self) {
        self.prompts.lock().unwrap().clear();
    }

    fn reply_for(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(prompt) {
            return response.clone();
        }

        Ok(self.default_response.clone())
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl ModelClient for MockClient {
    type Error = ModelError;

    async fn send(&self, prompt: &str) -> Result<String, Self::Error> {
        self.reply_for(prompt)
    }
}
