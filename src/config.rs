//! TOML configuration.
//!
//! Every section is optional. A missing configuration file yields
//! [`Config::default`], so the CLI works out of the box with nothing but a
//! database path and a Shodan key.
//!
//! ```toml
//! [search]
//! api_key = "..."
//! base_query = "product:elastic"
//!
//! [pipeline]
//! workers = 4
//!
//! [exclusions]
//! patterns = ["^\\.", "^kibana_sample_data"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::exclusion::ExclusionFilter;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub exclusions: ExclusionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Engine-level busy timeout, waited out inside each attempt before
    /// [`crate::db::with_busy_retry`] sees the contention. Zero disables it.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    250
}

/// Retry policy for writes that hit SQLITE_BUSY / SQLITE_LOCKED.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_shodan_url")]
    pub base_url: String,
    #[serde(default = "default_base_query")]
    pub base_query: String,
    #[serde(default = "default_page_retries")]
    pub page_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_shodan_url(),
            base_query: default_base_query(),
            page_retries: default_page_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_shodan_url() -> String {
    "https://api.shodan.io".to_string()
}
fn default_base_query() -> String {
    "product:elastic".to_string()
}
fn default_page_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_scheme() -> String {
    "http".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_sample_count")]
    pub default_sample_count: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_sample_count: default_sample_count(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_sample_count() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExclusionConfig {
    #[serde(default = "default_exclusion_patterns")]
    pub patterns: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            patterns: default_exclusion_patterns(),
        }
    }
}

fn default_exclusion_patterns() -> Vec<String> {
    vec![r"^\.".to_string(), "^kibana_sample_data".to_string()]
}

impl Config {
    /// Build the exclusion filter described by `[exclusions]`.
    pub fn exclusion_filter(&self) -> Result<ExclusionFilter> {
        ExclusionFilter::new(&self.exclusions.patterns)
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.pipeline.workers == 0 {
        bail!("pipeline.workers must be >= 1");
    }
    if config.retry.attempts == 0 {
        bail!("retry.attempts must be >= 1");
    }
    if config.db.max_connections == 0 {
        bail!("db.max_connections must be >= 1");
    }
    match config.elasticsearch.scheme.as_str() {
        "http" | "https" => {}
        other => bail!(
            "Unknown elasticsearch.scheme: '{}'. Must be http or https.",
            other
        ),
    }
    config
        .exclusion_filter()
        .with_context(|| "Invalid [exclusions] pattern")?;
    Ok(())
}
