use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_DEPTS: &[&str] = &["MATH", "COGS", "ECE", "CSE"];

/// Runtime settings. Every field can be overridden with a `CATALOG_`
/// environment variable, e.g. `CATALOG_DB_PATH=/tmp/c.sqlite`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub db_path: String,
    pub max_course_number: u32,
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("CATALOG"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .set_default("base_url", "https://www.ucsd.edu/catalog/courses")?
            .set_default("db_path", "data/catalog.sqlite")?
            .set_default("max_course_number", 189)?
            .set_default("concurrency", 4)?
            .set_default("max_retries", 3)?
            .set_default("backoff_ms", 2000)?
            .add_source(source)
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid CATALOG_* setting")
    }
}
