//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Prompt registry or pipeline setup error
    #[error(transparent)]
    Extractor(#[from] bestiary_extractor::ExtractorError),

    /// Model client setup error
    #[error("Model error: {0}")]
    Model(#[from] bestiary_llm::ModelError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No API key found under the configured name
    #[error("Credential '{0}' not found in the environment or the env file")]
    MissingCredential(String),
}

impl From<bestiary_extractor::PromptError> for CliError {
    fn from(e: bestiary_extractor::PromptError) -> Self {
        CliError::Extractor(e.into())
    }
}
