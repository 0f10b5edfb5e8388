use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::fetch::RetryPolicy;

const DEFAULT_CONFIG_FILE: &str = "ofac_sync";
const ENV_PREFIX: &str = "OFAC_SYNC";

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    let builder = Config::builder()
        .set_default("ledger_path", "data.csv")?
        .set_default("checkpoint_path", "log.txt")?
        .set_default(
            "index_url",
            "https://ofac.treasury.gov/recent-actions/sanctions-list-updates",
        )?
        .set_default("search_url", "https://sanctionssearch.ofac.treas.gov/")?
        .set_default("address_type", "Digital Currency Address - ETH")?
        .set_default("request_timeout_secs", 30)?
        .set_default("max_retries", 3)?
        .set_default("base_backoff_ms", 2000)?
        .set_default("max_index_pages", 500)?;
    Ok(builder)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub ledger_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub index_url: String,
    pub search_url: String,
    /// Identification type whose value is recorded as the address.
    pub address_type: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_index_pages: u32,
}

impl Settings {
    /// Defaults, then `ofac_sync.{toml,json,yaml}` (or `config_file`), then
    /// `OFAC_SYNC_*` environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let builder = match config_file {
            Some(path) => with_defaults()?.add_source(File::from(path)),
            None => with_defaults()?
                .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    /// Built-in defaults only, ignoring files and the environment.
    #[cfg(test)]
    pub fn defaults() -> Self {
        let settings: Self = with_defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        settings.validate().unwrap()
    }

    fn validate(self) -> Result<Self> {
        if self.max_index_pages == 0 {
            return Err(ConfigError::Message("max_index_pages must be at least 1".into()).into());
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Tests ──
