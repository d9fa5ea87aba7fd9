use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;
mod batch_scorer;
mod builder;
mod config;
mod console;
#[cfg(test)]
mod fakes;
mod llm;
mod models;
mod normalizer;
mod orchestrator;
mod output;
mod pairwise;
mod prompts;
mod runner;
mod sampler;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::runner::Runner;

/// Rubric validation CLI - check that an AI judge agrees with human pairwise judgments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - show progress for each scored item
    #[arg(short, long)]
    verbose: bool,

    /// Build the rubric interactively before validating it
    #[arg(long)]
    build: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "eval_prompt_validator=info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.run_file)?;
    let runner = Runner::new(config, args.verbose)?;

    let report = runner.run_interactive(args.build).await?;

    output::print_results(&report, args.output);

    Ok(())
}
