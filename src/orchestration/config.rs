//! Run configuration: JSON input merged with CLI flags, validated once.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::crawler::ControllerConfig;
use crate::models::Quota;
use crate::url_utils;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read input file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid input JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No shop URL given (use --shop-url or shopUrl in the input file)")]
    NoSeeds,

    #[error("Invalid shop URL: {0}")]
    InvalidSeed(String),

    #[error("Worker count must be at least 1")]
    ZeroWorkers,

    #[error("maxRequestsPerCrawl must be at least 1")]
    ZeroMaxRequests,
}

/// Run input as supplied by the host, in its camelCase JSON layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub shop_url: Option<String>,
    #[serde(default)]
    pub shop_urls: Vec<String>,
    #[serde(default)]
    pub max_requests_per_crawl: Option<u64>,
    #[serde(default)]
    pub quota: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
}

impl RunInput {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn seeds(&self) -> Vec<String> {
        self.shop_url
            .iter()
            .chain(self.shop_urls.iter())
            .cloned()
            .collect()
    }

    /// Fields set here win over `base`.
    pub fn merged_over(self, base: RunInput) -> RunInput {
        let seeds = self.seeds();
        let (shop_url, shop_urls) = if seeds.is_empty() {
            (base.shop_url, base.shop_urls)
        } else {
            (None, seeds)
        };
        RunInput {
            shop_url,
            shop_urls,
            max_requests_per_crawl: self.max_requests_per_crawl.or(base.max_requests_per_crawl),
            quota: self.quota.or(base.quota),
            workers: self.workers.or(base.workers),
        }
    }
}

/// Transport settings that never come from the run input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub same_domain_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            user_agent: Config::USER_AGENT.to_string(),
            timeout_secs: Config::REQUEST_TIMEOUT_SECS,
            same_domain_delay: Duration::from_secs(Config::SAME_DOMAIN_DELAY_SECS),
        }
    }
}

/// Immutable configuration for one harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestConfig {
    pub seeds: Vec<String>,
    pub quota: Quota,
    pub workers: usize,
    pub max_requests: Option<u64>,
    pub data_dir: PathBuf,
    pub transport: TransportSettings,
}

impl HarvestConfig {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            quota: self.quota,
            workers: self.workers,
            max_requests: self.max_requests,
        }
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join(Config::STATE_DB_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(Config::DATASET_FILE)
    }
}

/// Validate a merged run input into a [`HarvestConfig`].
pub fn build_harvest_config(
    input: RunInput,
    data_dir: PathBuf,
    transport: TransportSettings,
) -> Result<HarvestConfig, ConfigError> {
    let seeds: Vec<String> = input
        .seeds()
        .iter()
        .map(|s| url_utils::normalize_url_for_cli(s))
        .collect();
    if seeds.is_empty() {
        return Err(ConfigError::NoSeeds);
    }
    if let Some(bad) = seeds.iter().find(|s| !url_utils::is_valid_seed(s)) {
        return Err(ConfigError::InvalidSeed(bad.clone()));
    }

    let workers = input.workers.unwrap_or(Config::DEFAULT_WORKERS);
    if workers == 0 {
        return Err(ConfigError::ZeroWorkers);
    }
    if input.max_requests_per_crawl == Some(0) {
        return Err(ConfigError::ZeroMaxRequests);
    }

    Ok(HarvestConfig {
        seeds,
        quota: Quota::from_option(input.quota),
        workers,
        max_requests: input.max_requests_per_crawl,
        data_dir,
        transport,
    })
}
