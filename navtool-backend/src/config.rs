use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;

/// Default NOAA ENC coverage layer (ArcGIS REST query endpoint)
pub const DEFAULT_QUERY_URL: &str =
    "https://encdirect.noaa.gov/arcgis/rest/services/encdirect/enc_coverage/MapServer/0/query";

/// Base URL for ENC cell archives (`<base>/<CELL>.zip`)
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://charts.noaa.gov/ENCs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavtoolConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Working directory for downloads and the store snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_query_url")]
    pub query_url: String,

    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    /// Records requested per catalog page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Safety cap on records collected across all pages
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Requests allowed per rate window
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: usize,

    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Retries for transient failures (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_chart_ttl_hours")]
    pub chart_ttl_hours: u64,

    #[serde(default = "default_index_ttl_days")]
    pub index_ttl_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Minimum share of a state's area a chart must cover, in percent
    #[serde(default = "default_coverage_threshold_percent")]
    pub coverage_threshold_percent: f64,

    #[serde(default = "default_state_cache_ttl_minutes")]
    pub state_cache_ttl_minutes: u64,

    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

fn default_download_base_url() -> String {
    DEFAULT_DOWNLOAD_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_max_records() -> usize {
    20_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    "NavTool/1.0 (NOAA ENC Data Downloader)".to_string()
}

fn default_requests_per_window() -> usize {
    5
}

fn default_rate_window_ms() -> u64 {
    1000
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_min_delay_ms() -> u64 {
    1000
}

fn default_chart_ttl_hours() -> u64 {
    24
}

fn default_index_ttl_days() -> u64 {
    7
}

fn default_coverage_threshold_percent() -> f64 {
    1.0
}

fn default_state_cache_ttl_minutes() -> u64 {
    60
}

fn default_refresh_interval_hours() -> u64 {
    24
}

impl Default for NavtoolConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
            catalog: CatalogConfig::default(),
            cache: CacheConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            query_url: default_query_url(),
            download_base_url: default_download_base_url(),
            page_size: default_page_size(),
            max_records: default_max_records(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            requests_per_window: default_requests_per_window(),
            rate_window_ms: default_rate_window_ms(),
            max_retries: default_max_retries(),
            retry_min_delay_ms: default_retry_min_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            chart_ttl_hours: default_chart_ttl_hours(),
            index_ttl_days: default_index_ttl_days(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            coverage_threshold_percent: default_coverage_threshold_percent(),
            state_cache_ttl_minutes: default_state_cache_ttl_minutes(),
            refresh_interval_hours: default_refresh_interval_hours(),
        }
    }
}

impl NavtoolConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: NavtoolConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn retry_min_delay(&self) -> Duration {
        Duration::from_millis(self.retry_min_delay_ms)
    }
}

impl CacheConfig {
    pub fn chart_ttl(&self) -> Duration {
        Duration::from_secs(self.chart_ttl_hours * 60 * 60)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_days * 24 * 60 * 60)
    }
}

impl DiscoveryConfig {
    pub fn state_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.state_cache_ttl_minutes * 60)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 60 * 60)
    }
}

pub static CONFIG: OnceLock<NavtoolConfig> = OnceLock::new();

/// Load the process-wide configuration. A missing file falls back to defaults.
pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<&'static NavtoolConfig> {
    let path = path.as_ref();
    let config = if path.exists() {
        NavtoolConfig::from_file(path)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        NavtoolConfig::default()
    };

    Ok(CONFIG.get_or_init(|| config))
}
