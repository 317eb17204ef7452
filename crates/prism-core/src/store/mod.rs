//! SQLite persistence for providers, tasks, templates, styling guides and
//! evaluation results.
//!
//! Repositories are stateless: each operation takes the pool it runs on.

mod evaluations;
mod models;
mod providers;
mod styling_guides;
mod tasks;
mod templates;

pub use evaluations::EvaluationRepository;
pub use models::{
    EvaluationResult, EvaluationSource, NewEvaluation, Placeholder, Provider, ScoreSummary,
    StylingGuide, Task, Template,
};
pub use providers::ProviderRepository;
pub use styling_guides::StylingGuideRepository;
pub use tasks::TaskRepository;
pub use templates::TemplateRepository;

use crate::error::StoreResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Connection pool type shared by all repositories.
pub type DatabasePool = SqlitePool;

/// Handle to the Prism database.
#[derive(Clone)]
pub struct Database {
    pool: DatabasePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub async fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        tracing::debug!("Opened database at {:?}", path);
        Ok(Self { pool })
    }

    /// A private in-memory database.
    ///
    /// Limited to one connection that is never recycled, since each
    /// in-memory connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Apply embedded migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
