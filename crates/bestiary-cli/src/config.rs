//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use bestiary_extractor::{PromptFactory, ReconcilerConfig};
use bestiary_llm::GeminiConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model connection settings
    #[serde(default)]
    pub model: ModelSettings,

    /// Batching and retry settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Template settings
    #[serde(default)]
    pub prompts: PromptSettings,

    /// Output settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// Model settings: the Gemini connection plus where credentials live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Gemini connection
    #[serde(flatten)]
    pub gemini: GeminiConfig,

    /// File scanned for `NAME=value` credentials
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

/// Template settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Directory with one `<task>.j2` per task; built-in templates if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,

    /// Instruction prefixed to every prompt; empty disables it
    #[serde(default = "default_language_directive")]
    pub language_directive: String,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Result file
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            env_file: default_env_file(),
        }
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template_dir: None,
            language_directive: default_language_directive(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_language_directive() -> String {
    "Antworte ausschließlich auf Deutsch.".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("gemini_output.json")
}

impl AppConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    CliError::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration.
    ///
    /// The reconciler's per-call timeout must cover every attempt the Gemini
    /// client makes, otherwise its retries are cut off.
    pub fn validate(&self) -> Result<()> {
        self.reconciler.validate().map_err(CliError::Config)?;
        self.model.gemini.validate().map_err(CliError::Config)?;

        let budget = self.model.gemini.call_budget();
        if self.reconciler.request_timeout() < budget {
            return Err(CliError::Config(format!(
                "reconciler.request_timeout_secs ({}) must be at least {} to cover {} attempts of {}s plus backoff",
                self.reconciler.request_timeout_secs,
                budget.as_secs(),
                self.model.gemini.max_attempts,
                self.model.gemini.timeout_secs
            )));
        }
        Ok(())
    }

    /// Build the prompt factory described by the `[prompts]` section.
    pub fn prompt_factory(&self) -> Result<PromptFactory> {
        let factory = match &self.prompts.template_dir {
            Some(dir) => PromptFactory::from_dir(dir)?,
            None => PromptFactory::builtin()?,
        };
        Ok(factory.with_language_directive(self.prompts.language_directive.clone()))
    }
}
