//! Bestiary Extractor
//!
//! Batch extraction of catalogue records through a language model, with
//! reconciliation of what the model drops or duplicates.
//!
//! # Architecture
//!
//! ```text
//! CSV rows → RecordExtractor → BatchReconciler ─┬→ PromptFactory → ModelClient
//!                                                └← RobustJsonExtractor ← reply
//! ```
//!
//! - [`RecordExtractor`] turns raw rows into [`Record`](bestiary_domain::Record)s.
//! - [`PromptFactory`] renders task templates from [`ContextFragment`]s.
//! - [`RobustJsonExtractor`] recovers a JSON array from untrusted model text.
//! - [`BatchReconciler`] chunks, dispatches, deduplicates by natural key and
//!   retries missing records in smaller batches.
//!
//! # Example Usage
//!
//! ```no_run
//! use bestiary_extractor::{BatchReconciler, PromptFactory, RecordExtractor, ReconcilerConfig};
//! use bestiary_llm::MockClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let rows = vec![
//!     vec!["Affen:".to_string()],
//!     vec!["Pan troglodytes".to_string(), "".to_string(), "Шимпанзе".to_string()],
//! ];
//! let records = RecordExtractor::new().extract(&rows);
//!
//! let client = MockClient::new("[]");
//! let reconciler = BatchReconciler::new(client, PromptFactory::builtin()?, ReconcilerConfig::default())?;
//!
//! let outcome = reconciler.run(&records).await;
//! println!("{} results, {} missing", outcome.results.len(), outcome.missing.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod catalogue;
mod chunking;
mod config;
mod error;
mod parser;
mod prompt;
mod reconciler;
mod rows;
mod types;

#[cfg(test)]
mod tests;

pub use catalogue::{default_example, default_schema};
pub use chunking::{chunk_records, retry_batch_size, RETRY_BATCH_FLOOR};
pub use config::ReconcilerConfig;
pub use error::{ExtractorError, PromptError};
pub use parser::{strip_fence, RobustJsonExtractor, Strategy};
pub use prompt::{
    ContextFragment, Prompt, PromptBuilder, PromptContext, PromptFactory, PromptTemplate,
    RenderedPrompt, TaskKind, TaskSpec, TEMPLATE_EXTENSION,
};
pub use reconciler::BatchReconciler;
pub use rows::{RecordExtractor, DEFAULT_CATEGORY_DELIMITER};
pub use types::{
    key_of, record_to_json, BatchFailure, BatchOutcome, ReconciliationOutcome,
    ReconciliationState,
};
