//! Error types for the Extractor

use thiserror::Error;

/// Errors raised while building or rendering a prompt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Task name is not in the registry
    #[error("Unknown task '{task}', valid tasks: {}", valid.join(", "))]
    UnknownTask {
        /// Requested task name
        task: String,
        /// Registered task names
        valid: Vec<String>,
    },

    /// Builder was finished without all required context keys
    #[error("Missing context keys for task '{task}': {}", missing.join(", "))]
    MissingContext {
        /// Task being built
        task: String,
        /// Required keys that were never set
        missing: Vec<String>,
    },

    /// Template for a registered task could not be loaded
    #[error("Template not found for task '{task}': {path}")]
    TemplateNotFound {
        /// Task whose template is missing
        task: String,
        /// Location that was searched
        path: String,
    },

    /// Template references a key the context does not hold
    #[error("Template '{template}' references undefined key '{key}'")]
    UndefinedPlaceholder {
        /// Template name
        template: String,
        /// Placeholder key
        key: String,
    },

    /// Template syntax could not be parsed
    #[error("Template '{template}' is malformed: {reason}")]
    Malformed {
        /// Template name
        template: String,
        /// What went wrong
        reason: String,
    },
}

/// Errors that can occur while setting up or running the pipeline
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Prompt registry or rendering error
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
