//! CLI command definitions and argument parsing.

use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bestiary - Complete and translate an animal catalogue with a language model.
#[derive(Debug, Parser)]
#[command(name = "bestiary")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "BESTIARY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for record listings
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send the catalogue to the model and write the reconciled results
    Run(RunArgs),

    /// Print the records parsed from the CSV input
    Rows(RowsArgs),

    /// Render the prompt for the first batch without calling the model
    Prompt(PromptArgs),
}

/// CSV input shared by all commands.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// CSV files (columns: latin, german, russian), merged in order
    #[arg(long = "csv", required = true, num_args = 1..)]
    pub csv: Vec<PathBuf>,

    /// Suffix that marks a category header row
    #[arg(long, default_value_t = ':')]
    pub delimiter: char,
}

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Records per model call
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Retry rounds for missing records
    #[arg(short = 'r', long)]
    pub max_retries: Option<u32>,

    /// Output file (defaults to the configured path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also print the result JSON to stdout
    #[arg(long)]
    pub print_json: bool,

    /// File holding `NAME=value` credentials
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

/// Arguments for the rows command.
#[derive(Debug, Args)]
pub struct RowsArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Arguments for the prompt command.
#[derive(Debug, Args)]
pub struct PromptArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Task to render
    #[arg(short, long, default_value = "json_extraction")]
    pub task: String,

    /// Records in the rendered batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// JSON file with reference values for the validation task
    #[arg(long)]
    pub reference: Option<PathBuf>,
}
