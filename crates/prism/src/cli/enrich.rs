//! The `prism enrich` command: batch enrichment of a listings CSV.

use super::AppContext;
use clap::{Args, ValueEnum};
use prism_core::store::TaskRepository;
use prism_core::{
    csv_io, EnrichmentResponse, ItemContext, OutputFormat as CoreOutputFormat, OutputWriter,
    Prism, PrismError, RunStats,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the `enrich` command.
#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// CSV file of listings (item_title, short_description, ...)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Only run these tasks (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tasks: Vec<String>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to the output file's extension, else jsonl)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum concurrent provider calls
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Use task definitions stored in the database instead of the config
    #[arg(long)]
    pub tasks_from_db: bool,
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line
    Jsonl,
    /// One row per item, task and provider
    Csv,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
            OutputFormat::Csv => CoreOutputFormat::Csv,
        }
    }
}

/// Execute the enrich command.
pub async fn execute(args: EnrichArgs, mut ctx: AppContext) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!(
            "Input file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }
    if let Some(parallel) = args.parallel {
        if parallel == 0 {
            anyhow::bail!("--parallel must be at least 1");
        }
        ctx.config.fanout.max_concurrent = parallel;
    }

    let format = resolve_format(&args);
    let items = csv_io::read_items(&args.input)?;
    if items.is_empty() {
        tracing::warn!("No items found in {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Loaded {} item(s) from {:?}", items.len(), args.input);

    let db = if args.tasks_from_db || ctx.config.database_path().exists() {
        Some(ctx.open_database().await?)
    } else {
        None
    };
    let guides = ctx.install_guides(db.as_ref()).await?;

    let mut prism = Prism::new(ctx.config, guides)?;
    if let Some(db) = db.as_ref().filter(|_| args.tasks_from_db) {
        let definitions = TaskRepository::definitions(db.pool()).await?;
        if definitions.is_empty() {
            anyhow::bail!(
                "No tasks with templates in the database. Run `prism db import-tasks` first."
            );
        }
        prism = prism.with_tasks(definitions)?;
    }
    check_task_filter(&prism, &args.tasks)?;
    if prism.provider_keys().is_empty() {
        anyhow::bail!(
            "No providers could be initialised. Check API keys with `prism config show`."
        );
    }

    let filter = (!args.tasks.is_empty()).then_some(args.tasks.as_slice());
    let (responses, stats) = run(&prism, &items, filter, &args, format).await?;

    if let Some(path) = &args.output {
        match format {
            CoreOutputFormat::Csv => csv_io::write_results(path, &responses)?,
            CoreOutputFormat::Json => {
                let file = BufWriter::new(File::create(path)?);
                let mut writer = OutputWriter::new(file, format, true);
                writer.write_all(&responses)?;
                writer.flush()?;
            }
            CoreOutputFormat::JsonLines => {}
        }
        tracing::info!("Output written to {:?}", path);
    } else {
        match format {
            CoreOutputFormat::Csv => {
                csv_io::write_results_to(std::io::stdout().lock(), &responses)?
            }
            CoreOutputFormat::Json => println!("{}", serde_json::to_string_pretty(&responses)?),
            CoreOutputFormat::JsonLines => {}
        }
    }

    print_summary(&stats);
    Ok(())
}

fn resolve_format(args: &EnrichArgs) -> CoreOutputFormat {
    match (args.format, &args.output) {
        (Some(format), _) => format.into(),
        (None, Some(path)) => CoreOutputFormat::from_path(path),
        (None, None) => CoreOutputFormat::JsonLines,
    }
}

/// Fail fast on task names the engine doesn't know.
fn check_task_filter(prism: &Prism, tasks: &[String]) -> anyhow::Result<()> {
    let known: Vec<String> = prism.tasks().into_iter().map(|t| t.name).collect();
    if let Some(unknown) = tasks.iter().find(|t| !known.contains(t)) {
        anyhow::bail!(
            "Unknown task '{unknown}'. Available tasks: {}",
            known.join(", ")
        );
    }
    Ok(())
}

/// Enrich every item. JSONL is streamed as items finish; other formats are
/// collected and returned.
async fn run(
    prism: &Prism,
    items: &[ItemContext],
    filter: Option<&[String]>,
    args: &EnrichArgs,
    format: CoreOutputFormat,
) -> anyhow::Result<(Vec<EnrichmentResponse>, RunStats)> {
    let stream: Option<Box<dyn Write>> = match (format, &args.output) {
        (CoreOutputFormat::JsonLines, Some(path)) => {
            Some(Box::new(BufWriter::new(File::create(path)?)))
        }
        (CoreOutputFormat::JsonLines, None) => Some(Box::new(std::io::stdout())),
        _ => None,
    };
    let mut stream = stream.map(|w| OutputWriter::new(w, CoreOutputFormat::JsonLines, false));

    let progress = create_progress_bar(items.len() as u64);
    let mut stats = RunStats::default();
    let mut responses = Vec::new();
    let start_time = Instant::now();

    for item in items {
        match prism.enrich_item(item, filter).await {
            Ok(response) => {
                stats.record(&response);
                if let Some(writer) = &mut stream {
                    writer.write(&response)?;
                } else {
                    responses.push(response);
                }
            }
            Err(e @ (PrismError::Template(_) | PrismError::InvalidInput(_))) => {
                stats.skipped += 1;
                tracing::error!("Skipping {}: {e}", item.item_key());
            }
            Err(e) => return Err(e.into()),
        }

        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!(
                "{:.1} items/sec, {} failed calls",
                (stats.items + stats.skipped) as f64 / elapsed,
                stats.failed
            ));
        }
    }

    if let Some(writer) = &mut stream {
        writer.flush()?;
    }
    progress.finish_and_clear();
    stats.finish(start_time.elapsed());
    Ok((responses, stats))
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

fn print_summary(stats: &RunStats) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Items:        {:>8}", stats.items);
    if stats.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", stats.skipped);
    }
    eprintln!("    Calls OK:     {:>8}", stats.succeeded);
    if stats.failed > 0 {
        eprintln!("    Calls failed: {:>8}", stats.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", stats.total_seconds);
    eprintln!("    Rate:         {:>7.1} items/sec", stats.items_per_second);
    eprintln!("  ====================================");
}
