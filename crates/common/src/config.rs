use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{Chain, SortOrder};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub provider: Provider,
    pub fetch: Fetch,
    pub batch: Batch,
    pub report: Report,
    #[serde(default)]
    pub observability: Observability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub api_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fetch {
    /// Chains to query, in report column order.
    pub chains: Vec<Chain>,
    #[serde(default)]
    pub order: SortOrder,
    pub page_limit: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

fn default_max_pages() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Batch {
    pub max_concurrent_wallets: usize,
    pub wallet_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    pub addresses_path: String,
    pub output_path: String,
    #[serde(default)]
    pub mark_unavailable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Observability {
    pub prometheus_port: Option<u16>,
}

impl Provider {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Fetch {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Batch {
    pub fn wallet_timeout(&self) -> Option<Duration> {
        self.wallet_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "config/default.toml";

    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.fetch.chains.is_empty(), "fetch.chains must not be empty");
        let mut seen = HashSet::new();
        for chain in &self.fetch.chains {
            anyhow::ensure!(seen.insert(chain), "fetch.chains lists {chain} twice");
        }
        anyhow::ensure!(self.fetch.page_limit > 0, "fetch.page_limit must be > 0");
        anyhow::ensure!(self.fetch.max_pages > 0, "fetch.max_pages must be > 0");
        anyhow::ensure!(
            self.batch.max_concurrent_wallets > 0,
            "batch.max_concurrent_wallets must be > 0"
        );
        anyhow::ensure!(
            !self.provider.api_url.trim().is_empty(),
            "provider.api_url must not be empty"
        );
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
