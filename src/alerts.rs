//! Alert classification and dispatch
//!
//! Every cycle the freshest batch is evaluated on its own - there is no
//! hysteresis or debounce, so a sustained outage fires again on every
//! qualifying cycle. Escalation policy:
//!
//! - any critical metric -> critical alert carrying all critical metrics
//! - more than two warning metrics -> warning alert carrying all of them
//! - otherwise no alert

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::config::{Alert, Webhook};
use crate::{HealthMetric, Severity};

/// How many warning metrics a cycle tolerates before alerting.
const WARNING_TOLERANCE: usize = 2;

/// The outcome of evaluating one batch.
#[derive(Debug, Clone)]
pub struct AlertDecision {
    pub severity: Severity,
    pub metrics: Vec<HealthMetric>,
}

/// Classify a batch and decide whether an alert fires this cycle.
pub fn evaluate(batch: &[HealthMetric]) -> Option<AlertDecision> {
    let critical: Vec<_> = batch
        .iter()
        .filter(|m| m.status == Severity::Critical)
        .cloned()
        .collect();

    if !critical.is_empty() {
        return Some(AlertDecision {
            severity: Severity::Critical,
            metrics: critical,
        });
    }

    let warnings: Vec<_> = batch
        .iter()
        .filter(|m| m.status == Severity::Warning)
        .cloned()
        .collect();

    if warnings.len() > WARNING_TOLERANCE {
        return Some(AlertDecision {
            severity: Severity::Warning,
            metrics: warnings,
        });
    }

    None
}

/// Delivery capability for alerts. Transport is out of scope for the
/// monitoring core; a notifier may fail independently and the loop keeps
/// running.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, severity: Severity, metrics: &[HealthMetric]) -> anyhow::Result<()>;
}

/// Posts the alert as JSON to a configured webhook.
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(webhook: Webhook) -> Self {
        Self {
            client: Client::new(),
            webhook,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(severity = %severity))]
    async fn notify(&self, severity: Severity, metrics: &[HealthMetric]) -> anyhow::Result<()> {
        let payload = json!({
            "message": format_alert_message(severity, metrics),
            "severity": severity,
            "metrics": metrics,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.webhook.url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("webhook alert failed with status: {}", response.status());
        }

        info!("successfully sent webhook alert");
        Ok(())
    }
}

/// Writes the alert to the operator-visible log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, metrics: &[HealthMetric]) -> anyhow::Result<()> {
        warn!("ALERT: {}", format_alert_message(severity, metrics));
        Ok(())
    }
}

pub fn build_notifier(alert: &Alert) -> Box<dyn Notifier> {
    match alert {
        Alert::Webhook(webhook) => Box::new(WebhookNotifier::new(webhook.clone())),
        Alert::Log => Box::new(LogNotifier),
    }
}

fn format_alert_message(severity: Severity, metrics: &[HealthMetric]) -> String {
    let mut message = match severity {
        Severity::Critical => "🚨 **Health Alert - CRITICAL**".to_string(),
        Severity::Warning => "⚠️ **Health Alert - WARNING**".to_string(),
        Severity::Healthy => "✅ Health update".to_string(),
    };

    for metric in metrics {
        message.push_str(&format!(
            "\n- `{}`: {:.2} (threshold: {}) -> {}",
            metric.name, metric.value, metric.threshold, metric.status
        ));
    }

    message
}

/// Dispatches alert decisions to the configured notifier.
///
/// A failed notification is logged and dropped, never retried
/// synchronously - a monitoring system must not stall on its own alert
/// path.
pub struct AlertDispatcher {
    notifier: Option<Box<dyn Notifier>>,
}

impl AlertDispatcher {
    pub fn new(alert: Option<&Alert>) -> Self {
        Self {
            notifier: alert.map(build_notifier),
        }
    }

    #[instrument(skip_all, fields(severity = %decision.severity))]
    pub async fn dispatch(&self, decision: &AlertDecision) {
        let Some(notifier) = &self.notifier else {
            warn!(
                "no notifier configured, dropping {} alert ({} metrics)",
                decision.severity,
                decision.metrics.len()
            );
            return;
        };

        if let Err(e) = notifier.notify(decision.severity, &decision.metrics).await {
            error!("failed to send alert: {e:#}");
        }
    }
}
