//! The `prism db` command: schema setup, imports and reports.

use super::AppContext;
use clap::{Args, Subcommand};
use prism_core::csv_io;
use prism_core::store::{
    DatabasePool, EvaluationRepository, StylingGuideRepository, TaskRepository, TemplateRepository,
};
use prism_core::TaskDefinition;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for the `db` command.
#[derive(Args, Debug)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Create the database and apply migrations
    Init,

    /// Import styling guides from a CSV file (product_type,guide)
    ImportGuides {
        /// CSV file with product_type and guide columns
        csv: PathBuf,
    },

    /// Store the configured tasks and their templates
    ImportTasks,

    /// List stored tasks with their latest template version
    ListTasks,

    /// Export stored tasks as a TOML `tasks` table
    ExportTemplates {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show mean scores per task, provider (with temperature) and source
    Scores,
}

/// Execute the db command.
pub async fn execute(args: DbArgs, ctx: AppContext) -> anyhow::Result<()> {
    let db = ctx.open_database().await?;
    let pool = db.pool();

    match args.command {
        DbCommand::Init => {
            db.health_check().await?;
            println!("Database ready at {}", ctx.config.database_path().display());
        }

        DbCommand::ImportGuides { csv } => {
            let (saved, unchanged) = import_guides(pool, &csv).await?;
            println!("Imported {saved} styling guide(s), {unchanged} unchanged");
        }

        DbCommand::ImportTasks => {
            let (tasks, versions) = import_tasks(pool, &ctx.config.tasks).await?;
            println!("Synced {tasks} task(s), {versions} new template version(s)");
        }

        DbCommand::ListTasks => {
            let tasks = TaskRepository::list(pool).await?;
            if tasks.is_empty() {
                println!("No tasks stored. Run `prism db import-tasks` first.");
            }
            for task in tasks {
                let latest = TemplateRepository::latest_for_task(pool, task.id).await?;
                let (version, placeholders) = match latest {
                    Some(template) => (
                        format!("v{}", template.version),
                        TemplateRepository::placeholders(pool, template.id).await?,
                    ),
                    None => ("-".to_string(), Vec::new()),
                };
                println!(
                    "{:<28} {:<11} {:<5} {:<4} {}",
                    task.name,
                    task.kind,
                    task.output_format,
                    version,
                    placeholders.join(", ")
                );
            }
        }

        DbCommand::ExportTemplates { output } => {
            let content = export_templates(pool).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    eprintln!("Templates written to {}", path.display());
                }
                None => print!("{content}"),
            }
        }

        DbCommand::Scores => {
            let rows = EvaluationRepository::score_summary(pool).await?;
            if rows.is_empty() {
                println!("No evaluations recorded yet.");
            }
            for row in rows {
                let mean = row
                    .mean_score
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".to_string());
                let provider = match (&row.provider, row.temperature) {
                    (Some(key), Some(temperature)) => format!("{key}@{temperature}"),
                    (Some(key), None) => key.clone(),
                    (None, _) => "(unknown)".to_string(),
                };
                println!(
                    "{:<28} {:<40} {:<6} n={:<5} mean={}",
                    row.task,
                    provider,
                    row.source,
                    row.count,
                    mean
                );
            }
        }
    }

    db.close().await;
    Ok(())
}

/// Save each guide as a new version unless it matches the latest one.
/// Returns (saved, unchanged).
async fn import_guides(pool: &DatabasePool, path: &Path) -> anyhow::Result<(usize, usize)> {
    let rows = csv_io::read_styling_guides(path)?;
    let (mut saved, mut unchanged) = (0, 0);
    for (product_type, guide) in rows {
        let latest = StylingGuideRepository::latest(pool, &product_type).await?;
        if latest.is_some_and(|g| g.guide == guide) {
            unchanged += 1;
            continue;
        }
        let row = StylingGuideRepository::save(pool, &product_type, &guide).await?;
        tracing::debug!("Saved guide {} v{}", row.product_type, row.version);
        saved += 1;
    }
    Ok((saved, unchanged))
}

/// Returns (tasks synced, template versions created).
async fn import_tasks(
    pool: &DatabasePool,
    definitions: &[TaskDefinition],
) -> anyhow::Result<(usize, usize)> {
    let mut versions = 0;
    for definition in definitions {
        let (task, template) = TaskRepository::sync_definition(pool, definition).await?;
        if let Some(template) = template {
            tracing::info!("Task {} now at template v{}", task.name, template.version);
            versions += 1;
        }
    }
    Ok((definitions.len(), versions))
}

#[derive(Serialize)]
struct TaskFile {
    tasks: Vec<TaskDefinition>,
}

async fn export_templates(pool: &DatabasePool) -> anyhow::Result<String> {
    let tasks = TaskRepository::definitions(pool).await?;
    Ok(toml::to_string_pretty(&TaskFile { tasks })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::testing::memory_database;
    use prism_core::Config;

    #[tokio::test]
    async fn test_import_guides_skips_unchanged() {
        let db = memory_database().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guides.csv");
        std::fs::write(
            &path,
            "product_type,guide\nShirt,Lead with fabric.\nLamp,Mention wattage.\n",
        )
        .unwrap();

        assert_eq!(import_guides(db.pool(), &path).await.unwrap(), (2, 0));
        assert_eq!(import_guides(db.pool(), &path).await.unwrap(), (0, 2));

        std::fs::write(&path, "product_type,guide\nShirt,Lead with fit.\n").unwrap();
        assert_eq!(import_guides(db.pool(), &path).await.unwrap(), (1, 0));
        let latest = StylingGuideRepository::latest(db.pool(), "shirt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!((latest.version, latest.guide.as_str()), (2, "Lead with fit."));
    }

    #[tokio::test]
    async fn test_import_then_export_tasks() {
        let db = memory_database().await;
        let definitions = Config::default().tasks;

        let (tasks, versions) = import_tasks(db.pool(), &definitions).await.unwrap();
        assert_eq!((tasks, versions), (definitions.len(), definitions.len()));
        let (_, versions) = import_tasks(db.pool(), &definitions).await.unwrap();
        assert_eq!(versions, 0);

        let exported = export_templates(db.pool()).await.unwrap();
        let config = Config::from_toml_str(&exported).unwrap();
        assert_eq!(config.tasks.len(), definitions.len());
        assert!(config.task("attribute_extraction").is_some());
    }
}
