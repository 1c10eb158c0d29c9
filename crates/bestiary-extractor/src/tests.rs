//! Scenario tests for the BatchReconciler

#[cfg(test)]
mod tests {
    use crate::{
        BatchFailure, BatchReconciler, PromptFactory, ReconcilerConfig, RobustJsonExtractor,
    };
    use bestiary_domain::traits::ModelClient;
    use bestiary_domain::{NaturalKey, Record};
    use bestiary_llm::{MockClient, ModelError};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Replies by transforming the payload found in the prompt
    struct EchoClient<F> {
        calls: AtomicUsize,
        reply: F,
    }

    impl<F> EchoClient<F>
    where
        F: Fn(usize, Vec<Value>) -> Result<String, String> + Send + Sync,
    {
        fn new(reply: F) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<F> ModelClient for EchoClient<F>
    where
        F: Fn(usize, Vec<Value>) -> Result<String, String> + Send + Sync,
    {
        type Error = String;

        async fn send(&self, prompt: &str) -> Result<String, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(call, payload_of(prompt))
        }
    }

    fn payload_of(prompt: &str) -> Vec<Value> {
        let (_, payload) = prompt.rsplit_once("Payload:\n").expect("payload section");
        serde_json::from_str(payload.trim()).expect("payload array")
    }

    fn echo(_: usize, payload: Vec<Value>) -> Result<String, String> {
        Ok(serde_json::to_string(&payload).unwrap())
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(
                    "Affen",
                    format!("Species {}", i),
                    format!("Art {}", i),
                    format!("Вид {}", i),
                )
            })
            .collect()
    }

    fn config(batch_size: usize, max_retries: u32) -> ReconcilerConfig {
        ReconcilerConfig {
            batch_size,
            max_retries,
            ..ReconcilerConfig::default()
        }
    }

    fn reconciler<C: ModelClient>(client: C, config: ReconcilerConfig) -> BatchReconciler<C> {
        BatchReconciler::new(client, PromptFactory::builtin().unwrap(), config)
            .unwrap()
            .with_example(None)
    }

    fn keys(results: &[Value]) -> BTreeSet<NaturalKey> {
        results.iter().map(crate::key_of).collect()
    }

    #[tokio::test]
    async fn test_all_batches_succeed() {
        let input = records(45);
        let client = EchoClient::new(echo);
        let reconciler = reconciler(client, config(20, 1));

        let outcome = reconciler.run(&input).await;

        assert_eq!(outcome.results.len(), 45);
        assert!(outcome.is_complete());
        assert_eq!(outcome.retry_rounds, 0);
        assert!(!outcome.cancelled);
        assert_eq!(
            outcome.batches.iter().map(|b| b.size).collect::<Vec<_>>(),
            vec![20, 20, 5]
        );
        assert_eq!(reconciler.client().calls(), 3);
        assert_eq!(outcome.results[0]["latin"], "Species 0");
        assert_eq!(outcome.results[44]["latin"], "Species 44");
    }

    #[tokio::test]
    async fn test_key_set_independent_of_batch_size() {
        let input = records(37);
        let expected: BTreeSet<NaturalKey> = input.iter().map(Record::key).collect();

        for batch_size in [1, 3, 10, 20, 37, 100] {
            let reconciler = reconciler(EchoClient::new(echo), config(batch_size, 0));
            let outcome = reconciler.run(&input).await;
            assert_eq!(keys(&outcome.results), expected, "batch size {}", batch_size);
        }
    }

    #[tokio::test]
    async fn test_always_empty_model_runs_exactly_max_retries() {
        let input = records(25);

        for max_retries in [0, 1, 3] {
            let client = MockClient::new("I'm sorry, I cannot help with that.");
            let reconciler = reconciler(client, config(20, max_retries));
            let outcome = reconciler.run(&input).await;

            assert_eq!(outcome.retry_rounds, max_retries);
            assert_eq!(outcome.missing, input);
            assert!(outcome.results.is_empty());
            // 2 initial batches of 20, then 3 retry batches of 10 per round
            let expected_calls = 2 + 3 * max_retries as usize;
            assert_eq!(reconciler.client().call_count(), expected_calls);
            assert!(outcome
                .failed_batches()
                .all(|b| b.failure == Some(BatchFailure::NothingRecoverable)));
        }
    }

    #[tokio::test]
    async fn test_retry_batches_use_reduced_size() {
        let input = records(25);
        let reconciler = reconciler(MockClient::new("[]"), config(20, 1));
        let outcome = reconciler.run(&input).await;

        let retry_sizes: Vec<usize> = outcome
            .batches
            .iter()
            .filter(|b| b.round == 1)
            .map(|b| b.size)
            .collect();
        assert_eq!(retry_sizes, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_dropped_records_are_retried() {
        let input = records(30);
        // The first call loses its last two records
        let client = EchoClient::new(|call, mut payload: Vec<Value>| {
            if call == 0 {
                payload.truncate(payload.len() - 2);
            }
            Ok(serde_json::to_string(&payload).unwrap())
        });
        let reconciler = reconciler(client, config(20, 1));
        let outcome = reconciler.run(&input).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.retry_rounds, 1);
        assert_eq!(outcome.results.len(), 30);

        let retries: Vec<_> = outcome.batches.iter().filter(|b| b.round == 1).collect();
        assert_eq!(retries.len(), 1);
        assert_eq!(retries[0].size, 2);
        assert_eq!(retries[0].merged, 2);
    }

    #[tokio::test]
    async fn test_first_seen_wins_across_batches() {
        let input = records(4);
        // Every reply repeats Species 0 with its own call number
        let client = EchoClient::new(|call, payload: Vec<Value>| {
            let mut items: Vec<Value> = payload
                .into_iter()
                .map(|mut item| {
                    item["call"] = json!(call);
                    item
                })
                .collect();
            items.push(json!({
                "latin": "Species 0",
                "russian": "Вид 0",
                "german": "Art 0",
                "call": call
            }));
            Ok(serde_json::to_string(&items).unwrap())
        });
        let reconciler = reconciler(client, config(2, 0));
        let outcome = reconciler.run(&input).await;

        assert_eq!(outcome.results.len(), 4);
        let species_zero: Vec<&Value> = outcome
            .results
            .iter()
            .filter(|r| r["latin"] == "Species 0")
            .collect();
        assert_eq!(species_zero.len(), 1);
        assert_eq!(species_zero[0]["call"], 0);
        assert_eq!(outcome.batches[1].recovered, 3);
        assert_eq!(outcome.batches[1].merged, 2);
    }

    #[tokio::test]
    async fn test_fenced_reply_with_filled_column() {
        let input = vec![Record::new("Affen", "Pan troglodytes", "", "Шимпанзе")];
        let client = MockClient::new(
            "```json\n[{\"latin\":\"Pan troglodytes\",\"russian\":\"Шимпанзе\",\"german\":\"Schimpanse\"}]\n```",
        );
        let reconciler = reconciler(client, config(20, 1));
        let outcome = reconciler.run(&input).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0]["german"], "Schimpanse");
        assert!(outcome.missing.is_empty());
        assert_eq!(outcome.retry_rounds, 0);
        assert_eq!(reconciler.client().call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_recovered_as_empty() {
        let input = records(3);
        let client = MockClient::new("[]");
        client.push_reply(Err(ModelError::RateLimitExceeded));
        client.push_reply(Ok(serde_json::to_string(&json!([
            {"latin": "Species 0", "russian": "Вид 0", "german": "Art 0"},
            {"latin": "Species 1", "russian": "Вид 1", "german": "Art 1"},
            {"latin": "Species 2", "russian": "Вид 2", "german": "Art 2"}
        ]))
        .unwrap()));

        let reconciler = reconciler(client, config(20, 1));
        let outcome = reconciler.run(&input).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.retry_rounds, 1);
        assert!(matches!(
            outcome.batches[0].failure,
            Some(BatchFailure::Transport(_))
        ));
        assert!(outcome.batches[1].is_success());
    }

    #[tokio::test]
    async fn test_non_object_entries_are_dropped() {
        let input = records(1);
        let client = MockClient::new(
            r#"[1, "text", {"latin": "Species 0", "russian": "Вид 0", "german": "Art 0"}]"#,
        );
        let reconciler = reconciler(client, config(20, 0));
        let outcome = reconciler.run(&input).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.batches[0].recovered, 3);
        assert_eq!(outcome.batches[0].merged, 1);
    }

    struct SlowClient;

    impl ModelClient for SlowClient {
        type Error = String;

        async fn send(&self, _prompt: &str) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("[]".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_batch_failure() {
        let input = records(2);
        let config = ReconcilerConfig {
            request_timeout_secs: 1,
            ..config(20, 0)
        };
        let reconciler = reconciler(SlowClient, config);
        let start = tokio::time::Instant::now();
        let outcome = reconciler.run(&input).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(30));
        assert_eq!(outcome.batches[0].failure, Some(BatchFailure::Timeout(1)));
        assert_eq!(outcome.missing.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let input = records(5);
        let token = CancellationToken::new();
        token.cancel();

        let reconciler = reconciler(MockClient::new("[]"), config(20, 3)).with_cancellation(token);
        let outcome = reconciler.run(&input).await;

        assert!(outcome.cancelled);
        assert!(outcome.batches.is_empty());
        assert_eq!(outcome.retry_rounds, 0);
        assert_eq!(outcome.missing, input);
        assert_eq!(reconciler.client().call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_call() {
        let input = records(2);
        let token = CancellationToken::new();
        let reconciler = reconciler(SlowClient, config(20, 3)).with_cancellation(token.clone());

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        let outcome = reconciler.run(&input).await;
        cancel.await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.retry_rounds, 0);
        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(outcome.batches[0].failure, Some(BatchFailure::Cancelled));
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_matches_sequential() {
        let input = records(50);

        let sequential = reconciler(EchoClient::new(echo), config(7, 0)).run(&input).await;
        let concurrent = reconciler(
            EchoClient::new(echo),
            ReconcilerConfig {
                max_concurrent_batches: 4,
                ..config(7, 0)
            },
        )
        .run(&input)
        .await;

        assert_eq!(sequential.results, concurrent.results);
        assert_eq!(sequential.batches, concurrent.batches);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let reconciler = reconciler(MockClient::new("[]"), config(20, 2));
        let outcome = reconciler.run(&[]).await;

        assert!(outcome.results.is_empty());
        assert!(outcome.is_complete());
        assert!(outcome.batches.is_empty());
        assert_eq!(reconciler.client().call_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_schema_example_and_payload() {
        let client = MockClient::new("[]");
        let reconciler = BatchReconciler::new(
            client,
            PromptFactory::builtin().unwrap(),
            config(20, 0),
        )
        .unwrap();

        reconciler.run(&records(1)).await;
        let prompts = reconciler.client().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Wissenschaftlicher Name"));
        assert!(prompts[0].contains("Example input"));
        assert!(prompts[0].contains("Species 0"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = BatchReconciler::new(
            MockClient::default(),
            PromptFactory::builtin().unwrap(),
            config(0, 1),
        );
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_extract_never_panics(text in ".*") {
            let _ = RobustJsonExtractor::new().extract(&text);
        }

        #[test]
        fn prop_extract_idempotent_on_own_output(
            prefix in "[a-zA-Z ]{0,20}",
            names in proptest::collection::vec("[a-zA-Z]{1,12}", 1..8),
            suffix in "[a-zA-Z ]{0,20}",
        ) {
            let items: Vec<Value> = names.iter().map(|n| json!({"latin": n})).collect();
            let text = format!("{}{}{}", prefix, serde_json::to_string(&items).unwrap(), suffix);

            let extractor = RobustJsonExtractor::new();
            let first = extractor.extract(&text);
            prop_assert_eq!(&first, &items);

            let again = extractor.extract(&serde_json::to_string(&first).unwrap());
            prop_assert_eq!(first, again);
        }
    }
}
