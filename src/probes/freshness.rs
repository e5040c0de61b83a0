use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

/// Sentinel reported when freshness cannot be measured: assume a full day stale.
const STALE_SENTINEL_HOURS: f64 = 24.0;

/// The part of the data feed this probe cares about. Any well-formed
/// document carrying a `last_update` timestamp satisfies it; the rest of
/// the schema is someone else's business.
#[derive(Debug, Deserialize)]
struct DataFeed {
    last_update: String,
}

/// Bare ISO 8601 timestamps without a UTC offset, as the feed producers
/// write them.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Parses a feed timestamp. Offset-carrying RFC 3339 is accepted as
/// well, but the feed itself writes offset-less local-ish timestamps
/// that are treated as UTC.
fn parse_last_update(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Checks how long ago the content data feed was last updated.
pub struct ContentFreshnessProbe {
    data_feed: String,
    threshold: f64,
}

impl ContentFreshnessProbe {
    pub fn new(data_feed: String, threshold: f64) -> Self {
        Self {
            data_feed,
            threshold,
        }
    }

    async fn hours_since_update(&self, cx: &ProbeContext) -> anyhow::Result<f64> {
        let url = cx.url(&self.data_feed);

        let response = cx.client.get(&url).send().await?.error_for_status()?;
        let feed: DataFeed = response.json().await?;
        let last_update = parse_last_update(feed.last_update.trim()).ok_or_else(|| {
            anyhow::anyhow!("unparseable last_update timestamp: {:?}", feed.last_update)
        })?;

        let age = Utc::now().signed_duration_since(last_update);
        Ok(age.num_seconds() as f64 / 3600.0)
    }
}

#[async_trait]
impl Probe for ContentFreshnessProbe {
    fn name(&self) -> &'static str {
        "content_freshness"
    }

    #[instrument(skip_all)]
    async fn run(&self, cx: &ProbeContext) -> HealthMetric {
        match self.hours_since_update(cx).await {
            Ok(hours) => {
                trace!("data feed last updated {hours:.1}h ago");
                HealthMetric::measured(self.name(), hours, self.threshold, Comparison::Below)
            }
            Err(e) => {
                warn!("content freshness check failed: {e:#}");
                self.worst_case(Utc::now())
            }
        }
    }

    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
        HealthMetric::failed(self.name(), STALE_SENTINEL_HOURS, self.threshold, now)
    }
}
