//! The `prism evaluate` command: judge earlier enrichment results.

use super::AppContext;
use clap::Args;
use prism_core::output::read_jsonl;
use prism_core::{
    csv_io, EnrichmentResponse, EvaluationReport, ItemContext, OutputFormat, OutputWriter, Prism,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Arguments for the `evaluate` command.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSONL results written by `prism enrich`
    pub results: PathBuf,

    /// The items CSV the results were produced from
    #[arg(long)]
    pub items: PathBuf,

    /// Store judgements in the database
    #[arg(long)]
    pub save: bool,

    /// Write judgements here as JSONL (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the evaluate command.
pub async fn execute(args: EvaluateArgs, ctx: AppContext) -> anyhow::Result<()> {
    let responses: Vec<EnrichmentResponse> =
        read_jsonl(BufReader::new(File::open(&args.results)?))?;
    let items = index_items(csv_io::read_items(&args.items)?);
    tracing::info!(
        "Evaluating {} result(s) against {} item(s)",
        responses.len(),
        items.len()
    );

    let db = if args.save {
        Some(ctx.open_database().await?)
    } else {
        None
    };
    let guides = ctx.install_guides(db.as_ref()).await?;
    let prism = Prism::new(ctx.config, guides)?;
    let Some(judge) = prism.judge() else {
        anyhow::bail!(
            "No judge configured.\n\n  Hint: set [evaluation.judge] in the config file."
        );
    };
    tracing::info!("Judging with {}", judge.key());

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = OutputWriter::new(sink, OutputFormat::JsonLines, false);

    let mut saved = 0;
    for response in &responses {
        let Some(item) = items.get(&response.item_key) else {
            tracing::warn!("No item for result {}; skipping", response.item_key);
            continue;
        };
        let report: EvaluationReport = prism.evaluate(item, response).await?;
        if let Some(db) = &db {
            saved += prism
                .save_judgements(db.pool(), response, &report.judgements)
                .await?;
        }
        writer.write(&report)?;
    }
    writer.flush()?;

    eprintln!("Evaluated {} result(s)", writer.items_written());
    if args.save {
        eprintln!("Saved {saved} judgement(s)");
    }
    Ok(())
}

fn index_items(items: Vec<ItemContext>) -> HashMap<String, ItemContext> {
    items
        .into_iter()
        .map(|item| (item.item_key(), item))
        .collect()
}
