//! Reconciliation state and per-run reports

use bestiary_domain::{NaturalKey, Record};
use serde_json::{json, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Why a batch contributed nothing
///
/// These are values recorded on a [`BatchOutcome`], never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchFailure {
    /// The prompt could not be built or rendered
    #[error("prompt build failed: {0}")]
    PromptBuild(String),

    /// The model call returned an error
    #[error("model call failed: {0}")]
    Transport(String),

    /// The model call did not finish in time
    #[error("model call timed out after {0}s")]
    Timeout(u64),

    /// The reply held no JSON array
    #[error("no JSON array recoverable from reply")]
    NothingRecoverable,

    /// The run was cancelled while this batch was in flight
    #[error("cancelled")]
    Cancelled,
}

/// Report for one dispatched batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// 0 for the initial pass, then 1.. for retry rounds
    pub round: u32,
    /// Position of the batch within its round
    pub index: usize,
    /// Records sent
    pub size: usize,
    /// Array entries recovered from the reply
    pub recovered: usize,
    /// Entries with a new natural key that entered the results
    pub merged: usize,
    /// Set when the batch contributed nothing
    pub failure: Option<BatchFailure>,
}

impl BatchOutcome {
    /// Check whether the batch produced usable output
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Final result of a reconciliation run
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationOutcome {
    /// Deduplicated model results in first-insertion order
    pub results: Vec<Value>,
    /// Input records no result covers
    pub missing: Vec<Record>,
    /// Retry rounds actually run
    pub retry_rounds: u32,
    /// Every dispatched batch, in dispatch order
    pub batches: Vec<BatchOutcome>,
    /// Whether the run stopped on cancellation
    pub cancelled: bool,
}

impl ReconciliationOutcome {
    /// All input records are accounted for
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Batches that contributed nothing
    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| !b.is_success())
    }
}

/// Accumulated results, seen keys and still-missing records
///
/// `results` never holds two entries with the same natural key: the first
/// entry seen for a key is kept and later ones are dropped.
#[derive(Debug, Clone)]
pub struct ReconciliationState {
    results: Vec<Value>,
    seen: HashSet<NaturalKey>,
    missing: Vec<Record>,
    retry_round: u32,
}

impl ReconciliationState {
    /// Fresh state where every input record is missing
    pub fn new(input: &[Record]) -> Self {
        Self {
            results: Vec::new(),
            seen: HashSet::new(),
            missing: input.to_vec(),
            retry_round: 0,
        }
    }

    /// Merge recovered entries, returning how many were new
    ///
    /// Entries that are not JSON objects are dropped.
    pub fn merge(&mut self, items: Vec<Value>) -> usize {
        let mut merged = 0;
        for item in items {
            if !item.is_object() {
                continue;
            }
            if self.seen.insert(key_of(&item)) {
                self.results.push(item);
                merged += 1;
            }
        }
        merged
    }

    /// Recompute which input records no result covers
    pub fn recompute_missing(&mut self, input: &[Record]) {
        let seen = &self.seen;
        self.missing = input
            .iter()
            .filter(|record| {
                let key = record.key();
                let covered = seen.contains(&key)
                    || (key.has_blank() && seen.iter().any(|s| key.covers(s)));
                !covered
            })
            .cloned()
            .collect();
    }

    /// Records still missing after the last recompute
    pub fn missing(&self) -> &[Record] {
        &self.missing
    }

    /// Results so far
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    /// Current retry round (0 during the initial pass)
    pub fn retry_round(&self) -> u32 {
        self.retry_round
    }

    /// Enter the next retry round
    pub fn next_round(&mut self) -> u32 {
        self.retry_round += 1;
        self.retry_round
    }

    /// Consume the state into a final outcome
    pub fn into_outcome(self, batches: Vec<BatchOutcome>, cancelled: bool) -> ReconciliationOutcome {
        ReconciliationOutcome {
            results: self.results,
            missing: self.missing,
            retry_rounds: self.retry_round,
            batches,
            cancelled,
        }
    }
}

/// Natural key of a model result; missing or non-string fields read as ""
pub fn key_of(item: &Value) -> NaturalKey {
    let field = |name: &str| item.get(name).and_then(Value::as_str).unwrap_or("");
    NaturalKey::new(field("latin"), field("russian"), field("german"))
}

/// JSON form of a record as sent in a payload
pub fn record_to_json(record: &Record) -> Value {
    json!({
        "category": record.category,
        "latin": record.latin,
        "german": record.german,
        "russian": record.russian,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(latin: &str, russian: &str, german: &str) -> Record {
        Record::new("Affen", latin, german, russian)
    }

    #[test]
    fn test_key_of_reads_fields() {
        let item = json!({"latin": " Pan troglodytes ", "russian": "Шимпанзе", "german": 5});
        assert_eq!(key_of(&item), NaturalKey::new("Pan troglodytes", "Шимпанзе", ""));
        assert_eq!(key_of(&json!(1)), NaturalKey::new("", "", ""));
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let input = vec![record("A", "a", "x")];
        let mut state = ReconciliationState::new(&input);

        let merged = state.merge(vec![
            json!({"latin": "A", "russian": "a", "german": "x", "score": 1}),
            json!({"latin": "A", "russian": "a", "german": "x", "score": 2}),
        ]);
        assert_eq!(merged, 1);
        assert_eq!(state.merge(vec![json!({"latin": "A", "russian": "a", "german": "x", "score": 3})]), 0);
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.results()[0]["score"], 1);
    }

    #[test]
    fn test_merge_drops_non_objects() {
        let mut state = ReconciliationState::new(&[]);
        assert_eq!(state.merge(vec![json!(1), json!("x"), json!([]), json!({"latin": "A"})]), 1);
    }

    #[test]
    fn test_recompute_missing() {
        let input = vec![record("A", "a", "x"), record("B", "b", "y")];
        let mut state = ReconciliationState::new(&input);
        assert_eq!(state.missing().len(), 2);

        state.merge(vec![json!({"latin": "B", "russian": "b", "german": "y"})]);
        state.recompute_missing(&input);
        assert_eq!(state.missing(), &[record("A", "a", "x")]);
    }

    #[test]
    fn test_blank_input_column_is_covered_by_filled_result() {
        let input = vec![record("Pan troglodytes", "Шимпанзе", "")];
        let mut state = ReconciliationState::new(&input);

        state.merge(vec![json!({
            "latin": "Pan troglodytes",
            "russian": "Шимпанзе",
            "german": "Schimpanse"
        })]);
        state.recompute_missing(&input);
        assert!(state.missing().is_empty());
    }

    #[test]
    fn test_changed_component_is_not_covered() {
        let input = vec![record("Pan troglodytes", "Шимпанзе", "Schimpanse")];
        let mut state = ReconciliationState::new(&input);
        state.merge(vec![json!({"latin": "Pan troglodytes", "russian": "Шимпанзе", "german": "Affe"})]);
        state.recompute_missing(&input);
        assert_eq!(state.missing().len(), 1);
    }

    #[test]
    fn test_into_outcome() {
        let input = vec![record("A", "a", "x")];
        let mut state = ReconciliationState::new(&input);
        assert_eq!(state.next_round(), 1);

        let outcome = state.into_outcome(Vec::new(), false);
        assert_eq!(outcome.retry_rounds, 1);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failed_batches().count(), 0);
    }

    #[test]
    fn test_record_to_json() {
        let value = record_to_json(&Record::new("Affen", "Pan", "Schimpanse", "Шимпанзе"));
        assert_eq!(
            value,
            json!({"category": "Affen", "latin": "Pan", "german": "Schimpanse", "russian": "Шимпанзе"})
        );
    }
}
