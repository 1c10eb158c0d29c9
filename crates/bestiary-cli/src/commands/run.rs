//! Run command implementation.

use crate::cli::RunArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::input::load_records;
use crate::output::{write_results, Formatter};
use bestiary_domain::traits::ModelClient;
use bestiary_domain::Record;
use bestiary_extractor::{BatchReconciler, PromptFactory, ReconcilerConfig, ReconciliationOutcome};
use bestiary_llm::{
    ChainedCredentials, EnvFileCredentials, EnvVarCredentials, GeminiClient, ModelError,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute the run command.
pub async fn execute_run(
    args: RunArgs,
    config: &AppConfig,
    formatter: &Formatter,
    cancel: CancellationToken,
) -> Result<()> {
    let records = load_records(&args.input.csv, args.input.delimiter)?;
    let output = args.output.clone().unwrap_or_else(|| config.output.path.clone());

    // Nothing to send: no credential or client is needed
    if records.is_empty() {
        warn!("No records found in the input");
        write_results(&output, &[])?;
        if args.print_json {
            println!("[]");
        }
        eprintln!("{}", formatter.warning("No records found in the input"));
        return Ok(());
    }

    let mut settings = config.reconciler.clone();
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }

    let env_file = args.env_file.as_deref().unwrap_or(config.model.env_file.as_path());
    let client = connect(config, env_file)?;
    let factory = config.prompt_factory()?;

    let outcome = reconcile(client, factory, settings, &records, cancel).await?;

    // Partial results of a cancelled run are still written
    write_results(&output, &outcome.results)?;
    info!("Wrote {} results to {}", outcome.results.len(), output.display());

    if args.print_json {
        println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    }

    eprintln!("{}", formatter.outcome_summary(&outcome, records.len()));
    for record in &outcome.missing {
        eprintln!("{}", formatter.warning(&format!("Missing {}", record.key())));
    }

    Ok(())
}

/// Run the reconciler over `records` with any model client.
pub async fn reconcile<C: ModelClient>(
    client: C,
    factory: PromptFactory,
    settings: ReconcilerConfig,
    records: &[Record],
    cancel: CancellationToken,
) -> Result<ReconciliationOutcome> {
    let reconciler = BatchReconciler::new(client, factory, settings)?.with_cancellation(cancel);
    Ok(reconciler.run(records).await)
}

/// Create the Gemini client; the environment wins over the env file.
fn connect(config: &AppConfig, env_file: &Path) -> Result<GeminiClient> {
    let credentials = ChainedCredentials::new()
        .push(EnvVarCredentials)
        .push(EnvFileCredentials::new(env_file));

    GeminiClient::from_credentials(config.model.gemini.clone(), &credentials).map_err(|e| match e {
        ModelError::MissingCredential(key) => CliError::MissingCredential(key),
        other => CliError::Model(other),
    })
}
