use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

/// Fixed penalty (seconds) charged for an endpoint that fails to answer.
///
/// Failures stay in the mean instead of being dropped, so an outage moves
/// the average up rather than silently shrinking the sample.
pub const FAILURE_PENALTY_SECS: f64 = 10.0;

/// Measures the mean response time over a set of endpoints.
pub struct ResponseTimeProbe {
    endpoints: Vec<String>,
    threshold: f64,
}

impl ResponseTimeProbe {
    pub fn new(endpoints: Vec<String>, threshold: f64) -> Self {
        Self {
            endpoints,
            threshold,
        }
    }

    async fn time_endpoint(&self, cx: &ProbeContext, endpoint: &str) -> f64 {
        let url = cx.url(endpoint);
        let start = Instant::now();

        match cx.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let elapsed = start.elapsed().as_secs_f64();
                trace!("{url}: responded in {elapsed:.3}s");
                elapsed
            }
            Ok(response) => {
                warn!("{url}: unexpected status {}", response.status());
                FAILURE_PENALTY_SECS
            }
            Err(e) => {
                warn!("{url}: request failed: {e}");
                FAILURE_PENALTY_SECS
            }
        }
    }
}

#[async_trait]
impl Probe for ResponseTimeProbe {
    fn name(&self) -> &'static str {
        "response_time"
    }

    #[instrument(skip_all)]
    async fn run(&self, cx: &ProbeContext) -> HealthMetric {
        if self.endpoints.is_empty() {
            return self.worst_case(Utc::now());
        }

        let samples = join_all(
            self.endpoints
                .iter()
                .map(|endpoint| self.time_endpoint(cx, endpoint)),
        )
        .await;

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;

        HealthMetric::measured(self.name(), mean, self.threshold, Comparison::AtMost)
    }

    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
        HealthMetric::failed(self.name(), FAILURE_PENALTY_SECS, self.threshold, now)
    }
}
