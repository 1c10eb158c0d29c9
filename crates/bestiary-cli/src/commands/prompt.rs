//! Prompt command implementation.

use crate::cli::PromptArgs;
use crate::config::AppConfig;
use crate::error::Result;
use crate::input::load_records;
use bestiary_domain::Record;
use bestiary_extractor::{
    default_example, default_schema, record_to_json, ContextFragment, RenderedPrompt,
};
use serde_json::Value;
use std::fs;

/// Execute the prompt command.
pub fn execute_prompt(args: PromptArgs, config: &AppConfig) -> Result<()> {
    let records = load_records(&args.input.csv, args.input.delimiter)?;
    let batch_size = args.batch_size.unwrap_or(config.reconciler.batch_size).max(1);
    let batch = &records[..records.len().min(batch_size)];

    let reference = match &args.reference {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };

    let prompt = render_prompt(config, &args.task, batch, reference)?;
    println!("{}", prompt);
    Ok(())
}

/// Render the prompt for `task` over one batch.
///
/// The validation task additionally needs `reference` values.
pub fn render_prompt(
    config: &AppConfig,
    task: &str,
    batch: &[Record],
    reference: Option<Value>,
) -> Result<RenderedPrompt> {
    let payload = Value::Array(batch.iter().map(record_to_json).collect());

    let mut fragments = vec![
        ContextFragment::Schema(default_schema()),
        default_example(),
        ContextFragment::Payload(payload),
    ];
    if let Some(reference) = reference {
        fragments.push(ContextFragment::CrossValidation(reference));
    }

    Ok(config.prompt_factory()?.create_prompt(task, &fragments)?)
}
