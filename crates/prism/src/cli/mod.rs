//! Command implementations and the state they share.

pub mod config;
pub mod db;
pub mod enrich;
pub mod evaluate;
pub mod serve;

use prism_core::store::StylingGuideRepository;
use prism_core::{Config, Database, StylingGuides};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded configuration plus where it came from.
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

impl AppContext {
    /// Load from `config_path` (or the default location) and apply the
    /// `--database` override.
    pub fn load(config_path: Option<&Path>, database: Option<&Path>) -> anyhow::Result<Self> {
        let (config, config_path) = match config_path {
            Some(path) => {
                let path = expand(path);
                (Config::load_from(&path)?, path)
            }
            None => (Config::load()?, Config::default_path()),
        };
        Ok(Self::assemble(config, config_path, database))
    }

    /// Default configuration, used when the default config file is unreadable.
    pub fn with_defaults(database: Option<&Path>) -> Self {
        Self::assemble(Config::default(), Config::default_path(), database)
    }

    fn assemble(mut config: Config, config_path: PathBuf, database: Option<&Path>) -> Self {
        if let Some(path) = database {
            config.general.database_path = expand(path);
        }
        Self {
            config,
            config_path,
        }
    }

    /// Open the configured database and apply migrations.
    pub async fn open_database(&self) -> anyhow::Result<Database> {
        let path = self.config.database_path();
        let db = Database::new(&path).await?;
        db.run_migrations().await?;
        tracing::debug!("Database ready at {:?}", path);
        Ok(db)
    }

    /// Build the styling guide table and install it process-wide.
    ///
    /// Guides stored in `db` are loaded first; a configured CSV file
    /// overrides them per product type.
    pub async fn install_guides(
        &self,
        db: Option<&Database>,
    ) -> anyhow::Result<Arc<StylingGuides>> {
        let mut guides = match db {
            Some(db) => StylingGuideRepository::load(db.pool()).await?,
            None => StylingGuides::new(),
        };
        if let Some(path) = self.config.styling_guides_path() {
            let from_csv = StylingGuides::from_csv(&path)?;
            for product_type in from_csv.product_types() {
                guides.insert(product_type, from_csv.guide_for(product_type));
            }
        }
        tracing::info!("Loaded {} styling guide(s)", guides.len());

        StylingGuides::install(Arc::new(guides));
        Ok(StylingGuides::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_override() {
        let ctx = AppContext::with_defaults(Some(Path::new("/tmp/other.db")));
        assert_eq!(ctx.config.database_path(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_load_explicit_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.json");
        std::fs::write(
            &path,
            r#"{"providers": [{"name": "openai", "model": "gpt-4o", "temperature": 0.5}]}"#,
        )
        .unwrap();
        let ctx = AppContext::load(Some(&path), None).unwrap();
        assert_eq!(ctx.config_path, path);
        assert_eq!(ctx.config.providers.len(), 1);
        assert_eq!(ctx.config.providers[0].key(), "openai/gpt-4o");
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppContext::load(Some(&dir.path().join("missing.toml")), None).is_err());
    }
}
