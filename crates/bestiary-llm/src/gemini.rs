//! Gemini Provider Implementation
//!
//! Sends rendered prompts to Google's `generateContent` endpoint.
//!
//! # Features
//!
//! - Async HTTP communication via reqwest
//! - Configurable endpoint, temperature and output token budget
//! - Retry logic with exponential backoff for transient failures
//! - Timeout handling
//! - Usage logging per call
//!
//! # Examples
//!
//! ```no_run
//! use bestiary_llm::{GeminiClient, GeminiConfig};
//!
//! let client = GeminiClient::new(GeminiConfig::default(), "api-key").unwrap();
//! ```

use crate::usage::UsageLog;
use crate::ModelError;
use bestiary_domain::{CredentialProvider, ModelClient};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Gemini endpoint
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Default timeout for model requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default credential name
pub const DEFAULT_CREDENTIAL_KEY: &str = "GEMINI_API_KEY";

/// Backoff doubles from 1s up to 2^MAX_BACKOFF_EXPONENT seconds
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Gemini connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Full `generateContent` URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sampling temperature (0.0 for deterministic extraction)
    #[serde(default)]
    pub temperature: f32,

    /// Output token budget per call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// HTTP timeout per request (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request for transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Name of the credential holding the API key
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// Optional JSON-lines usage log file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_log: Option<PathBuf>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            temperature: 0.0,
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            credential_key: default_credential_key(),
            usage_log: None,
        }
    }
}

impl GeminiConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Longest a single `generate` call can run: every attempt hitting the
    /// HTTP timeout plus the backoff pauses between attempts.
    pub fn call_budget(&self) -> Duration {
        let pauses = u64::from(self.max_attempts.max(1) - 1);
        let doubling = pauses.min(u64::from(MAX_BACKOFF_EXPONENT));
        let backoff = ((1u64 << doubling) - 1)
            .saturating_add((pauses - doubling).saturating_mul(1u64 << MAX_BACKOFF_EXPONENT));

        let requests = self.timeout_secs.saturating_mul(u64::from(self.max_attempts.max(1)));
        Duration::from_secs(requests.saturating_add(backoff))
    }
}

/// Pause after the `attempt`-th failed attempt: 1s, 2s, 4s, ... capped at 64s
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(1u64 << exponent)
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_max_output_tokens() -> u32 {
    5000
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_credential_key() -> String {
    DEFAULT_CREDENTIAL_KEY.to_string()
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    client: reqwest::Client,
    usage: UsageLog,
}

/// Request body for the generateContent API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Response from the generateContent API
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is blank, the settings are invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::MissingCredential(config.credential_key.clone()));
        }
        config.validate().map_err(ModelError::Other)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Other(format!("Failed to build HTTP client: {}", e)))?;

        let usage = match &config.usage_log {
            Some(path) => UsageLog::with_file(path),
            None => UsageLog::new(),
        };

        Ok(Self {
            config,
            api_key,
            client,
            usage,
        })
    }

    /// Create a client whose API key is looked up by `config.credential_key`
    pub fn from_credentials(
        config: GeminiConfig,
        credentials: &impl CredentialProvider,
    ) -> Result<Self, ModelError> {
        let api_key = credentials
            .lookup(&config.credential_key)
            .ok_or_else(|| ModelError::MissingCredential(config.credential_key.clone()))?;
        Self::new(config, api_key)
    }

    /// Connection settings
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Usage log shared by all clones of this client
    pub fn usage(&self) -> &UsageLog {
        &self.usage
    }

    /// Generate text for a prompt
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The endpoint is unreachable or times out
    /// - The model is not available
    /// - The API answers with a non-success status
    /// - The response envelope carries no text
    pub async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let result = self.generate_with_retries(prompt).await;
        match &result {
            Ok(text) => self.usage.record(text.chars().count(), true),
            Err(_) => self.usage.record(0, false),
        }
        result
    }

    async fn generate_with_retries(&self, prompt: &str) -> Result<String, ModelError> {
        let body = build_request(prompt, &self.config);
        let max_attempts = self.config.max_attempts.max(1);

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_attempts {
            match self
                .client
                .post(&self.config.endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await.map_err(|e| {
                            ModelError::InvalidResponse(format!(
                                "Failed to read response: {}",
                                e.without_url()
                            ))
                        })?;
                        return response_text(&text);
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ModelError::ModelNotAvailable(self.config.endpoint.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ModelError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        let error =
                            ModelError::Communication(format!("HTTP {}: {}", status, error_text));
                        if !status.is_server_error() {
                            return Err(error);
                        }
                        last_error = Some(error);
                    }
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(ModelError::Timeout(self.config.timeout_secs));
                }
                Err(e) => {
                    last_error = Some(ModelError::Communication(format!(
                        "Request failed: {}",
                        e.without_url()
                    )));
                }
            }

            attempts += 1;
            if attempts < max_attempts {
                let delay = backoff_delay(attempts);
                if let Some(error) = &last_error {
                    warn!("Gemini attempt {} failed ({}), retrying in {:?}", attempts, error, delay);
                }
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| ModelError::Communication("Max retries exceeded".to_string())))
    }
}

impl ModelClient for GeminiClient {
    type Error = ModelError;

    async fn send(&self, prompt: &str) -> Result<String, Self::Error> {
        self.generate(prompt).await
    }
}

fn build_request<'a>(prompt: &'a str, config: &GeminiConfig) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        },
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a response body
fn response_text(body: &str) -> Result<String, ModelError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let text = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ModelError::InvalidResponse("No text in first candidate".to_string()))?;

    debug!("Gemini response length: {} chars", text.len());
    Ok(text)
}
