//! Probe fan-out for one monitoring cycle
//!
//! All registered probes run concurrently, each bounded by the per-probe
//! timeout, so a cycle costs as much as its slowest single probe instead
//! of the sum of all of them. A probe that exceeds its budget is
//! force-resolved to its worst-case metric; the batch always has exactly
//! one metric per registered probe.

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{instrument, trace, warn};

use crate::HealthMetric;
use crate::probes::{Probe, ProbeContext};

/// Run every probe in the registry once and gather the full batch.
///
/// The output has the same cardinality and order as the registry,
/// regardless of individual probe outcomes.
#[instrument(skip_all, fields(probes = registry.len()))]
pub async fn collect(
    registry: &[Box<dyn Probe>],
    cx: &ProbeContext,
    probe_timeout: Duration,
) -> Vec<HealthMetric> {
    trace!("starting probe fan-out");

    let batch = join_all(registry.iter().map(|probe| async move {
        match timeout(probe_timeout, probe.run(cx)).await {
            Ok(metric) => metric,
            Err(_) => {
                warn!("probe {} exceeded its {probe_timeout:?} budget", probe.name());
                probe.worst_case(Utc::now())
            }
        }
    }))
    .await;

    trace!("collected {} metrics", batch.len());

    batch
}
