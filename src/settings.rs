use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::model::UNIVERSITIES;
use crate::pipeline::retention::DEFAULT_RETENTION_DAYS;

pub const CONFIG_FILE: &str = "hkacadjobs.toml";

/// Run settings: built-in defaults, then `hkacadjobs.toml`, then `HKAJ_*`
/// environment variables. Command-line flags are applied on top by `main`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Dataset path. Also the previous snapshot.
    pub output: PathBuf,
    pub retention_days: u64,
    /// University keys, harvested in this order.
    pub sources: Vec<String>,
    /// Listing pages fetched at once per source.
    pub concurrency: usize,
    pub max_retries: u32,
    pub spider_api_key: Option<String>,
    /// Read page dumps from here instead of calling spider.cloud.
    pub offline_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(file: &Path) -> Result<Self> {
        let sources: Vec<&str> = UNIVERSITIES.iter().map(|u| u.key).collect();

        Config::builder()
            .set_default("output", "jobs.csv")?
            .set_default("retention_days", DEFAULT_RETENTION_DAYS as i64)?
            .set_default("sources", sources)?
            .set_default("concurrency", 4)?
            .set_default("max_retries", 3)?
            .add_source(File::from(file).required(false))
            .add_source(
                Environment::with_prefix("HKAJ")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sources"),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}
