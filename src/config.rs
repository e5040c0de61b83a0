use std::path::PathBuf;

use tracing::trace;

use crate::util;

/// Persisted-slot configuration: where the externally-read report files live
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    /// Path of the "current report" slot
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Path of the "history window" slot
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            report_path: default_report_path(),
            history_path: default_history_path(),
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("assets/data/health_report.json")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("assets/data/health_history.json")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub monitor: MonitorConfig,

    /// Persisted slots (optional - defaults next to the data feed)
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Base URL of the monitored site. Falls back to the MONITOR_URL
    /// environment variable when absent.
    pub base_url: Option<String>,

    /// Endpoints sampled by the response-time probe
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Data-API endpoints checked for valid, non-empty JSON
    #[serde(default = "default_api_endpoints")]
    pub api_endpoints: Vec<String>,

    /// JSON data feed carrying the `last_update` timestamp
    #[serde(default = "default_data_feed")]
    pub data_feed: String,

    /// Sampled outbound links for the affiliate-link probe.
    /// The probe is only registered when this is non-empty.
    #[serde(default)]
    pub affiliate_links: Vec<String>,

    /// Seconds between monitoring cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Where alerts go; without it, qualifying cycles are only logged
    pub alert: Option<Alert>,
}

impl MonitorConfig {
    /// The effective base URL (config value, then MONITOR_URL).
    pub fn base_url(&self) -> Option<String> {
        self.base_url.clone().or_else(util::get_monitor_url)
    }
}

/// Per-concern thresholds, loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Thresholds {
    /// % - availability below this is unacceptable
    #[serde(default = "default_availability")]
    pub availability: f64,
    /// seconds - mean response time over the sampled endpoints
    #[serde(default = "default_response_time")]
    pub response_time: f64,
    /// % - share of API endpoints returning valid, non-empty payloads
    #[serde(default = "default_api_health")]
    pub api_health: f64,
    /// hours since the data feed's last update
    #[serde(default = "default_content_freshness")]
    pub content_freshness: f64,
    /// % - share of sampled links resolving acceptably
    #[serde(default = "default_affiliate_links")]
    pub affiliate_links: f64,
    /// % CPU utilization
    #[serde(default = "default_cpu_usage")]
    pub cpu_usage: f64,
    /// % memory utilization
    #[serde(default = "default_memory_usage")]
    pub memory_usage: f64,
    /// % disk utilization
    #[serde(default = "default_disk_usage")]
    pub disk_usage: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            availability: default_availability(),
            response_time: default_response_time(),
            api_health: default_api_health(),
            content_freshness: default_content_freshness(),
            affiliate_links: default_affiliate_links(),
            cpu_usage: default_cpu_usage(),
            memory_usage: default_memory_usage(),
            disk_usage: default_disk_usage(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Webhook(Webhook),
    Log,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

fn default_endpoints() -> Vec<String> {
    vec![
        "/".to_string(),
        default_data_feed(),
        "/manifest.json".to_string(),
    ]
}

fn default_api_endpoints() -> Vec<String> {
    vec![
        default_data_feed(),
        "/assets/data/content_suggestions.json".to_string(),
    ]
}

fn default_data_feed() -> String {
    "/assets/data/quantum_data.json".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_availability() -> f64 {
    99.0
}

fn default_response_time() -> f64 {
    3.0
}

fn default_api_health() -> f64 {
    90.0
}

fn default_content_freshness() -> f64 {
    6.0
}

fn default_affiliate_links() -> f64 {
    80.0
}

fn default_cpu_usage() -> f64 {
    80.0
}

fn default_memory_usage() -> f64 {
    85.0
}

fn default_disk_usage() -> f64 {
    80.0
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))?;
    validate(&config)?;
    trace!("loaded config: {config:?}");
    Ok(config)
}

/// Refuse to start with an unusable configuration instead of monitoring
/// against undefined thresholds or an unparseable target.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    let monitor = &config.monitor;

    let Some(base_url) = monitor.base_url() else {
        anyhow::bail!("no base URL configured (set monitor.base_url or MONITOR_URL)");
    };

    if reqwest::Url::parse(&base_url).is_err() {
        anyhow::bail!("invalid base URL: {base_url}");
    }

    if monitor.interval == 0 {
        anyhow::bail!("cycle interval must be greater than zero");
    }

    if monitor.probe_timeout == 0 || monitor.probe_timeout >= monitor.interval {
        anyhow::bail!(
            "probe timeout ({}s) must be non-zero and shorter than the cycle interval ({}s)",
            monitor.probe_timeout,
            monitor.interval
        );
    }

    for endpoint in monitor
        .endpoints
        .iter()
        .chain(monitor.api_endpoints.iter())
        .chain(std::iter::once(&monitor.data_feed))
    {
        if !endpoint.starts_with('/') {
            anyhow::bail!("endpoint must be an absolute path: {endpoint}");
        }
    }

    let t = &monitor.thresholds;
    for (name, value) in [
        ("availability", t.availability),
        ("response_time", t.response_time),
        ("api_health", t.api_health),
        ("content_freshness", t.content_freshness),
        ("affiliate_links", t.affiliate_links),
        ("cpu_usage", t.cpu_usage),
        ("memory_usage", t.memory_usage),
        ("disk_usage", t.disk_usage),
    ] {
        if !value.is_finite() || value <= 0.0 {
            anyhow::bail!("threshold {name} must be a positive number, got {value}");
        }
    }

    Ok(())
}
