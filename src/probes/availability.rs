use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

/// Checks that the site's base URL answers with a success status.
///
/// Availability is all-or-nothing: a success response scores 100, anything
/// else (error status, network failure) is a critical 0. There is no
/// warning band for this concern.
pub struct AvailabilityProbe {
    threshold: f64,
}

impl AvailabilityProbe {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl Probe for AvailabilityProbe {
    fn name(&self) -> &'static str {
        "availability"
    }

    #[instrument(skip_all)]
    async fn run(&self, cx: &ProbeContext) -> HealthMetric {
        trace!("checking availability of {}", cx.base_url);

        match cx.client.get(&cx.base_url).send().await {
            Ok(response) if response.status().is_success() => {
                HealthMetric::measured(self.name(), 100.0, self.threshold, Comparison::AtLeast)
            }
            Ok(response) => {
                warn!("availability check got status {}", response.status());
                self.worst_case(Utc::now())
            }
            Err(e) => {
                warn!("availability check failed: {e}");
                self.worst_case(Utc::now())
            }
        }
    }

    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
        HealthMetric::failed(self.name(), 0.0, self.threshold, now)
    }
}
