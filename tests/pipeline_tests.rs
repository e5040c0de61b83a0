//! End-to-end cycle tests against mock HTTP endpoints
//!
//! These drive a full probe -> aggregate -> persist -> alert cycle through
//! the MonitorLoop using wiremock-backed site, feed and webhook endpoints.

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use sitewatch::config::Config;
use sitewatch::monitor::MonitorHandle;
use sitewatch::{HealthReport, Severity};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A healthy site: every GET answers quickly with a fresh data feed.
async fn healthy_site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "last_update": Utc::now().to_rfc3339(),
            "products": [1, 2, 3],
        })))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn config_json(site: &MockServer, dir: &std::path::Path) -> serde_json::Value {
    serde_json::json!({
        "monitor": {
            "base_url": site.uri(),
            "interval": 300,
            "probe_timeout": 5,
            "affiliate_links": [format!("{}/partner", site.uri())],
        },
        "storage": {
            "report_path": dir.join("health_report.json"),
            "history_path": dir.join("health_history.json"),
        }
    })
}

#[tokio::test]
async fn test_healthy_site_cycle_end_to_end() {
    let site = healthy_site().await;
    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(config_json(&site, dir.path())).unwrap();

    let (handle, join) = MonitorHandle::spawn(&config).unwrap();
    let report = handle.run_now().await.unwrap();

    // full registry: 8 probes, 8 metrics, one per probe
    assert_eq!(report.metrics.len(), 8);
    for name in [
        "availability",
        "response_time",
        "api_health",
        "content_freshness",
        "affiliate_links",
        "cpu_usage",
        "memory_usage",
        "disk_usage",
    ] {
        assert!(report.metrics.contains_key(name), "missing metric {name}");
    }

    // site-facing probes must all be healthy against the mock
    assert_eq!(
        report.metrics["availability"].status,
        Severity::Healthy,
        "availability"
    );
    assert_eq!(report.metrics["api_health"].status, Severity::Healthy);
    assert_eq!(
        report.metrics["content_freshness"].status,
        Severity::Healthy
    );
    assert_eq!(report.metrics["affiliate_links"].status, Severity::Healthy);

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn test_persisted_slots_match_report_shape() {
    let site = healthy_site().await;
    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(config_json(&site, dir.path())).unwrap();

    let (handle, join) = MonitorHandle::spawn(&config).unwrap();
    let report = handle.run_now().await.unwrap();
    handle.run_now().await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("health_report.json")).unwrap();
    let current: HealthReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(current.metrics.len(), report.metrics.len());

    let raw = std::fs::read_to_string(dir.path().join("health_history.json")).unwrap();
    let history: Vec<HealthReport> = serde_json::from_str(&raw).unwrap();
    assert!(history.len() >= 2);
    assert!(
        history
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    );

    // the current slot is the newest history entry
    assert_eq!(
        history.last().unwrap().timestamp,
        current.timestamp
    );

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_site_fires_critical_webhook_alert() {
    // the webhook endpoint is alive, the monitored site is not
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alert"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&hook)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(serde_json::json!({
        "monitor": {
            "base_url": "http://127.0.0.1:1",
            "interval": 300,
            "probe_timeout": 3,
            "alert": { "webhook": { "url": format!("{}/alert", hook.uri()) } },
        },
        "storage": {
            "report_path": dir.path().join("report.json"),
            "history_path": dir.path().join("history.json"),
        }
    }))
    .unwrap();

    let (handle, join) = MonitorHandle::spawn(&config).unwrap();
    let report = handle.run_now().await.unwrap();

    // availability, api_health and content_freshness all fail to measure
    assert_eq!(report.metrics["availability"].status, Severity::Critical);
    assert_eq!(report.metrics["availability"].value, 0.0);
    assert_eq!(report.metrics["api_health"].status, Severity::Critical);
    assert_eq!(
        report.metrics["content_freshness"].status,
        Severity::Critical
    );

    handle.shutdown();
    join.await.unwrap();

    // at least the RunNow cycle posted a critical alert
    let requests = hook.received_requests().await.unwrap();
    assert!(!requests.is_empty(), "no webhook alert was delivered");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["severity"], "critical");
    assert!(
        body["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["name"] == "availability")
    );
}

#[tokio::test]
async fn test_slow_endpoint_is_cut_off_by_probe_timeout() {
    let site = MockServer::start().await;
    // everything answers, but only after 30s - far beyond the probe budget
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(serde_json::json!({
        "monitor": {
            "base_url": site.uri(),
            "interval": 300,
            "probe_timeout": 2,
        },
        "storage": {
            "report_path": dir.path().join("report.json"),
            "history_path": dir.path().join("history.json"),
        }
    }))
    .unwrap();

    let start = std::time::Instant::now();
    let (handle, join) = MonitorHandle::spawn(&config).unwrap();
    let report = handle.run_now().await.unwrap();

    // the batch is complete and arrived within the cycle budget, not after 30s
    assert_eq!(report.metrics.len(), 7);
    assert!(start.elapsed() < Duration::from_secs(20));
    assert_eq!(report.metrics["availability"].status, Severity::Critical);

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn test_degraded_site_scores_between_extremes() {
    let site = MockServer::start().await;
    // root answers, the data feed is stale, other endpoints 404
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/data/quantum_data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "last_update": (Utc::now() - chrono::TimeDelta::hours(48)).to_rfc3339(),
        })))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config: Config = serde_json::from_value(serde_json::json!({
        "monitor": {
            "base_url": site.uri(),
            "interval": 300,
            "probe_timeout": 5,
        },
        "storage": {
            "report_path": dir.path().join("report.json"),
            "history_path": dir.path().join("history.json"),
        }
    }))
    .unwrap();

    let (handle, join) = MonitorHandle::spawn(&config).unwrap();
    let report = handle.run_now().await.unwrap();

    assert_eq!(report.metrics["availability"].status, Severity::Healthy);
    assert_eq!(
        report.metrics["content_freshness"].status,
        Severity::Warning
    );
    assert!(report.overall_score < 100.0);
    assert!(report.overall_score > 0.0);

    handle.shutdown();
    join.await.unwrap();
}
