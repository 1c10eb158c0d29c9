//! Bestiary CLI - Complete an animal catalogue through a language model.

use bestiary_cli::commands;
use bestiary_cli::{AppConfig, Cli, Command, Formatter};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,bestiary_cli=debug,bestiary_extractor=debug,bestiary_llm=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> bestiary_cli::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Command::Run(args) => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
            });

            commands::execute_run(args, &config, &formatter, cancel).await
        }
        Command::Rows(args) => commands::execute_rows(args, &formatter),
        Command::Prompt(args) => commands::execute_prompt(args, &config),
    }
}
