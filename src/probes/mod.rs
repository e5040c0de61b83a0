//! Health probes
//!
//! Each probe tests one concern and produces exactly one [`HealthMetric`]
//! per cycle. Probes never propagate errors past their boundary: an
//! internal failure becomes the probe's worst-case metric via
//! [`HealthMetric::failed`], and the collector substitutes the same
//! worst case when a probe exceeds its timeout.

pub mod affiliate;
pub mod api_health;
pub mod availability;
pub mod freshness;
pub mod resources;
pub mod response_time;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::HealthMetric;
use crate::config::MonitorConfig;

pub use affiliate::AffiliateLinksProbe;
pub use api_health::ApiHealthProbe;
pub use availability::AvailabilityProbe;
pub use freshness::ContentFreshnessProbe;
pub use resources::{CpuProbe, DiskProbe, MemoryProbe};
pub use response_time::ResponseTimeProbe;

/// Shared state handed to every probe in a cycle.
#[derive(Clone)]
pub struct ProbeContext {
    /// HTTP client (reused across probes and cycles for efficiency)
    pub client: reqwest::Client,

    /// HTTP client that does not follow redirects, for probes that judge
    /// the redirect status code itself rather than its destination
    pub redirect_client: reqwest::Client,

    /// Monitoring configuration (base URL, endpoint lists, thresholds)
    pub config: Arc<MonitorConfig>,

    /// Fully-qualified base URL of the monitored site
    pub base_url: String,
}

impl ProbeContext {
    /// Build a context from a validated configuration.
    ///
    /// The client timeout matches the per-probe timeout so a single hung
    /// request can never outlive its probe's budget.
    pub fn new(config: Arc<MonitorConfig>) -> anyhow::Result<Self> {
        let base_url = config
            .base_url()
            .ok_or_else(|| anyhow::anyhow!("no base URL configured"))?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout))
            .build()?;

        let redirect_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            redirect_client,
            config,
            base_url,
        })
    }

    /// Absolute URL for a site-relative endpoint.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

/// A single health-check operation.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Metric name, unique within the registry.
    fn name(&self) -> &'static str;

    /// Take one measurement. Must always return a metric; internal
    /// failures are reported as the worst case, not as errors.
    async fn run(&self, cx: &ProbeContext) -> HealthMetric;

    /// The metric this probe reports when it cannot measure at all
    /// (used by the collector when the probe times out).
    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric;
}

/// The fixed, ordered set of probes for one process.
///
/// The affiliate-link probe only joins the registry when sample links are
/// configured; everything else always runs.
pub fn registry(config: &MonitorConfig) -> Vec<Box<dyn Probe>> {
    let t = &config.thresholds;

    let mut probes: Vec<Box<dyn Probe>> = vec![
        Box::new(AvailabilityProbe::new(t.availability)),
        Box::new(ResponseTimeProbe::new(
            config.endpoints.clone(),
            t.response_time,
        )),
        Box::new(ApiHealthProbe::new(
            config.api_endpoints.clone(),
            t.api_health,
        )),
        Box::new(ContentFreshnessProbe::new(
            config.data_feed.clone(),
            t.content_freshness,
        )),
    ];

    if !config.affiliate_links.is_empty() {
        probes.push(Box::new(AffiliateLinksProbe::new(
            config.affiliate_links.clone(),
            t.affiliate_links,
        )));
    }

    probes.push(Box::new(CpuProbe::new(t.cpu_usage)));
    probes.push(Box::new(MemoryProbe::new(t.memory_usage)));
    probes.push(Box::new(DiskProbe::new(t.disk_usage)));

    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    fn config_with_links(links: Vec<String>) -> MonitorConfig {
        serde_json::from_value(serde_json::json!({
            "base_url": "https://example.com",
            "affiliate_links": links,
        }))
        .unwrap()
    }

    #[test]
    fn test_registry_names_are_unique() {
        let config = config_with_links(vec!["https://example.com/out".to_string()]);
        let probes = registry(&config);

        let mut names: Vec<_> = probes.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), probes.len());
        assert_eq!(probes.len(), 8);
    }

    #[test]
    fn test_affiliate_probe_skipped_without_links() {
        let config = config_with_links(vec![]);
        let probes = registry(&config);

        assert_eq!(probes.len(), 7);
        assert!(probes.iter().all(|p| p.name() != "affiliate_links"));
    }

    #[test]
    fn test_worst_cases_are_critical() {
        let config = config_with_links(vec!["https://example.com/out".to_string()]);
        let now = Utc::now();

        for probe in registry(&config) {
            let metric = probe.worst_case(now);
            assert_eq!(metric.status, Severity::Critical, "{}", probe.name());
            assert_eq!(metric.name, probe.name());
            assert_eq!(metric.timestamp, now);
        }
    }
}
