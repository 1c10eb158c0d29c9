//! Configuration for the BatchReconciler

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the BatchReconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Records per model call in the initial pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retry rounds for records missing from the model output
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum time for a single model call (seconds), including any
    /// retries the client makes on its own
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Model calls allowed in flight at once within a round
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
}

impl ReconcilerConfig {
    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.max_concurrent_batches == 0 {
            return Err("max_concurrent_batches must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_batches: default_max_concurrent_batches(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    90
}

fn default_max_concurrent_batches() -> usize {
    1
}
