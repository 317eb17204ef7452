//! Styling guides: per-product-type copy guidance injected into prompts.

use crate::csv_io;
use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Product type used when a listing's own type has no guide.
pub const DEFAULT_PRODUCT_TYPE: &str = "default";

static GLOBAL: OnceLock<Arc<StylingGuides>> = OnceLock::new();

/// Lookup table from product type to guide text.
///
/// Keys are normalised (trimmed, lower-cased) on insert and lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylingGuides {
    guides: HashMap<String, String>,
}

fn normalize(product_type: &str) -> String {
    product_type.trim().to_lowercase()
}

impl StylingGuides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(product_type, guide)` pairs. Later rows win.
    pub fn from_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut guides = Self::new();
        for (product_type, guide) in rows {
            guides.insert(product_type.as_ref(), guide);
        }
        guides
    }

    /// Load a `product_type,guide` CSV file.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let rows = csv_io::read_styling_guides(path)?;
        tracing::debug!("Loaded {} styling guides from {:?}", rows.len(), path);
        Ok(Self::from_rows(rows))
    }

    pub fn insert(&mut self, product_type: &str, guide: impl Into<String>) {
        self.guides.insert(normalize(product_type), guide.into());
    }

    /// Exact (normalised) lookup with no fallback.
    pub fn get(&self, product_type: &str) -> Option<&str> {
        self.guides.get(&normalize(product_type)).map(String::as_str)
    }

    /// Guide for `product_type`, else the default guide, else empty.
    pub fn guide_for(&self, product_type: &str) -> &str {
        self.get(product_type)
            .or_else(|| self.get(DEFAULT_PRODUCT_TYPE))
            .unwrap_or("")
    }

    /// Known product types, sorted.
    pub fn product_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.guides.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.guides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guides.is_empty()
    }

    /// Install the process-wide table. Returns `false` if one was
    /// already installed; the first installation is kept.
    pub fn install(guides: Arc<StylingGuides>) -> bool {
        let installed = GLOBAL.set(guides).is_ok();
        if !installed {
            tracing::warn!("Styling guides already installed, ignoring new table");
        }
        installed
    }

    /// The process-wide table, or an empty one if never installed.
    pub fn global() -> Arc<StylingGuides> {
        GLOBAL.get().cloned().unwrap_or_default()
    }
}
