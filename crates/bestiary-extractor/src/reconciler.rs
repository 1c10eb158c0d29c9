//! Batch dispatch with deduplication and retry of missing records

use crate::catalogue::{default_example, default_schema};
use crate::chunking::{chunk_records, retry_batch_size};
use crate::config::ReconcilerConfig;
use crate::error::{ExtractorError, PromptError};
use crate::parser::RobustJsonExtractor;
use crate::prompt::{ContextFragment, PromptFactory, RenderedPrompt, TaskKind};
use crate::types::{record_to_json, BatchFailure, BatchOutcome, ReconciliationOutcome, ReconciliationState};
use bestiary_domain::traits::ModelClient;
use bestiary_domain::Record;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sends records to the model in batches and retries the ones that go missing
///
/// Every record should come back exactly once. The model may drop records,
/// duplicate them or reply with garbage; the reconciler merges what it can
/// recover by natural key (first seen wins) and re-sends the remainder in
/// smaller batches for up to `max_retries` rounds. Batch failures are
/// recorded on the outcome and never abort the run.
pub struct BatchReconciler<C: ModelClient> {
    client: C,
    factory: PromptFactory,
    extractor: RobustJsonExtractor,
    config: ReconcilerConfig,
    schema: Value,
    example: Option<ContextFragment>,
    cancel: CancellationToken,
}

impl<C: ModelClient> BatchReconciler<C> {
    /// Create a reconciler using the default catalogue schema and example
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] if the configuration is invalid.
    pub fn new(
        client: C,
        factory: PromptFactory,
        config: ReconcilerConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        Ok(Self {
            client,
            factory,
            extractor: RobustJsonExtractor::new(),
            config,
            schema: default_schema(),
            example: Some(default_example()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the target schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Replace or remove the few-shot example
    pub fn with_example(mut self, example: Option<ContextFragment>) -> Self {
        self.example = example;
        self
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Get the model client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Render the extraction prompt for one batch of records
    pub fn build_prompt(&self, batch: &[Record]) -> Result<RenderedPrompt, PromptError> {
        let payload = Value::Array(batch.iter().map(record_to_json).collect());

        let mut fragments = vec![ContextFragment::Schema(self.schema.clone())];
        if let Some(example) = &self.example {
            fragments.push(example.clone());
        }
        fragments.push(ContextFragment::Payload(payload));

        self.factory
            .create_prompt(TaskKind::JsonExtraction.name(), &fragments)
    }

    /// Reconcile `input` against the model
    ///
    /// Runs an initial pass, then retry rounds over the records no result
    /// covers. Returns early with `cancelled` set if the token fires.
    pub async fn run(&self, input: &[Record]) -> ReconciliationOutcome {
        let mut state = ReconciliationState::new(input);
        let mut batches = Vec::new();

        info!(
            "Reconciling {} records in batches of {}",
            input.len(),
            self.config.batch_size
        );

        let mut cancelled = self
            .run_round(&mut state, &mut batches, 0, input, self.config.batch_size)
            .await;
        state.recompute_missing(input);

        while !cancelled
            && !state.missing().is_empty()
            && state.retry_round() < self.config.max_retries
        {
            let round = state.next_round();
            let size = retry_batch_size(self.config.batch_size);
            let pending = state.missing().to_vec();

            info!(
                "Retry round {}/{}: {} missing records in batches of {}",
                round,
                self.config.max_retries,
                pending.len(),
                size
            );

            cancelled = self
                .run_round(&mut state, &mut batches, round, &pending, size)
                .await;
            state.recompute_missing(input);
        }

        if cancelled {
            warn!("Reconciliation cancelled");
        }
        if !state.missing().is_empty() {
            warn!(
                "{} of {} records still missing after {} retry rounds",
                state.missing().len(),
                input.len(),
                state.retry_round()
            );
        }
        info!(
            "Reconciliation finished: {} results for {} records",
            state.results().len(),
            input.len()
        );

        state.into_outcome(batches, cancelled)
    }

    /// Dispatch one round and merge in batch order; returns whether it was cancelled
    async fn run_round(
        &self,
        state: &mut ReconciliationState,
        batches: &mut Vec<BatchOutcome>,
        round: u32,
        records: &[Record],
        batch_size: usize,
    ) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }

        let chunks = chunk_records(records, batch_size);
        debug!("Round {}: dispatching {} batches", round, chunks.len());

        // `buffered` yields in input order, so the merge is deterministic
        let replies: Vec<(BatchOutcome, Vec<Value>)> = stream::iter(
            chunks
                .into_iter()
                .enumerate()
                .map(|(index, chunk)| self.dispatch(round, index, chunk)),
        )
        .buffered(self.config.max_concurrent_batches.max(1))
        .collect()
        .await;

        let mut cancelled = false;
        for (mut outcome, items) in replies {
            cancelled |= outcome.failure == Some(BatchFailure::Cancelled);
            outcome.merged = state.merge(items);
            batches.push(outcome);
        }

        cancelled || self.cancel.is_cancelled()
    }

    async fn dispatch(&self, round: u32, index: usize, batch: &[Record]) -> (BatchOutcome, Vec<Value>) {
        let mut outcome = BatchOutcome {
            round,
            index,
            size: batch.len(),
            recovered: 0,
            merged: 0,
            failure: None,
        };

        let prompt = match self.build_prompt(batch) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Batch {}/{}: {}", round, index, e);
                outcome.failure = Some(BatchFailure::PromptBuild(e.to_string()));
                return (outcome, Vec::new());
            }
        };

        debug!(
            "Batch {}/{}: sending {} records ({} chars)",
            round,
            index,
            batch.len(),
            prompt.as_str().len()
        );

        let call = timeout(self.config.request_timeout(), self.client.send(prompt.as_str()));
        let reply = tokio::select! {
            _ = self.cancel.cancelled() => {
                outcome.failure = Some(BatchFailure::Cancelled);
                return (outcome, Vec::new());
            }
            reply = call => reply,
        };

        let text = match reply {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Batch {}/{}: model call failed: {}", round, index, e);
                outcome.failure = Some(BatchFailure::Transport(e.to_string()));
                return (outcome, Vec::new());
            }
            Err(_) => {
                warn!(
                    "Batch {}/{}: model call timed out after {}s",
                    round, index, self.config.request_timeout_secs
                );
                outcome.failure = Some(BatchFailure::Timeout(self.config.request_timeout_secs));
                return (outcome, Vec::new());
            }
        };

        let items = self.extractor.extract(&text);
        outcome.recovered = items.len();
        if items.is_empty() {
            warn!(
                "Batch {}/{}: nothing recoverable from {} chars of reply",
                round,
                index,
                text.len()
            );
            outcome.failure = Some(BatchFailure::NothingRecoverable);
        } else {
            debug!("Batch {}/{}: recovered {} items", round, index, items.len());
        }

        (outcome, items)
    }
}
