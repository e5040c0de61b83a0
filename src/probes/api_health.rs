use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

/// Checks that each data-API endpoint answers with valid, non-empty JSON.
///
/// The metric value is the percentage of endpoints that passed.
pub struct ApiHealthProbe {
    endpoints: Vec<String>,
    threshold: f64,
}

impl ApiHealthProbe {
    pub fn new(endpoints: Vec<String>, threshold: f64) -> Self {
        Self {
            endpoints,
            threshold,
        }
    }

    async fn check_endpoint(&self, cx: &ProbeContext, endpoint: &str) -> bool {
        let url = cx.url(endpoint);

        let response = match cx.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("{url}: unexpected status {}", response.status());
                return false;
            }
            Err(e) => {
                warn!("{url}: request failed: {e}");
                return false;
            }
        };

        match response.json::<serde_json::Value>().await {
            Ok(payload) => {
                let healthy = !is_empty_payload(&payload);
                trace!("{url}: valid JSON, non-empty: {healthy}");
                healthy
            }
            Err(e) => {
                warn!("{url}: invalid JSON payload: {e}");
                false
            }
        }
    }
}

/// An empty payload is no payload: null, `{}`, `[]` and `""` all fail the check.
fn is_empty_payload(payload: &serde_json::Value) -> bool {
    match payload {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl Probe for ApiHealthProbe {
    fn name(&self) -> &'static str {
        "api_health"
    }

    #[instrument(skip_all)]
    async fn run(&self, cx: &ProbeContext) -> HealthMetric {
        if self.endpoints.is_empty() {
            return self.worst_case(Utc::now());
        }

        let results = join_all(
            self.endpoints
                .iter()
                .map(|endpoint| self.check_endpoint(cx, endpoint)),
        )
        .await;

        let healthy = results.iter().filter(|ok| **ok).count();
        let percentage = 100.0 * healthy as f64 / results.len() as f64;

        HealthMetric::measured(self.name(), percentage, self.threshold, Comparison::AtLeast)
    }

    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
        HealthMetric::failed(self.name(), 0.0, self.threshold, now)
    }
}
