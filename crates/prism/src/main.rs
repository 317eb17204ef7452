//! Prism CLI - fan out listing enrichment prompts to multiple LLM providers.
//!
//! Prism renders one prompt per enrichment task for every product listing,
//! sends it to all configured providers concurrently, and collects the
//! answers keyed by task and provider. Outputs can be scored by an LLM judge
//! and by human reviewers.
//!
//! # Usage
//!
//! ```bash
//! # Enrich a CSV of listings
//! prism enrich items.csv --output results.jsonl
//!
//! # Serve the HTTP API
//! prism serve --port 8080
//!
//! # Score earlier results with the configured judge
//! prism evaluate results.jsonl --items items.csv --save
//!
//! # Manage the database
//! prism db import-guides guides.csv
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;
mod server;

/// Prism - multi-provider LLM enrichment for product listings.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (TOML or JSON, chosen by extension)
    #[arg(long, global = true, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides general.database_path)
    #[arg(long, global = true, env = "PRISM_DATABASE")]
    database: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich listings from a CSV file with every configured provider
    Enrich(cli::enrich::EnrichArgs),

    /// Serve the HTTP API
    Serve(cli::serve::ServeArgs),

    /// Score enrichment results with the configured judge
    Evaluate(cli::evaluate::EvaluateArgs),

    /// Manage the task, template and styling guide database
    Db(cli::db::DbArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let ctx = match cli::AppContext::load(cli.config.as_deref(), cli.database.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) if cli.config.is_none() => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            cli::AppContext::with_defaults(cli.database.as_deref())
        }
        Err(e) => return Err(e),
    };
    logging::init_from_config(&ctx.config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Enrich(args) => cli::enrich::execute(args, ctx).await,
        Commands::Serve(args) => cli::serve::execute(args, ctx).await,
        Commands::Evaluate(args) => cli::evaluate::execute(args, ctx).await,
        Commands::Db(args) => cli::db::execute(args, ctx).await,
        Commands::Config(args) => cli::config::execute(args, ctx).await,
    }
}
