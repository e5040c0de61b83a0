//! Host resource probes (CPU, memory, disk)
//!
//! `sysinfo` refreshes are blocking, and a meaningful CPU reading needs
//! two refreshes separated by the minimum update interval, so each probe
//! takes its measurement inside `spawn_blocking`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sysinfo::{Disks, System};
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

fn cpu_usage_percent() -> f64 {
    let mut sys = System::new_all();
    sys.refresh_all();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_all();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        return 0.0;
    }

    let usage_sum = cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>();
    usage_sum / cpus.len() as f64
}

fn memory_usage_percent() -> f64 {
    let mut sys = System::new_all();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return 0.0;
    }

    100.0 * sys.used_memory() as f64 / total as f64
}

fn disk_usage_percent() -> f64 {
    let disks = Disks::new_with_refreshed_list();

    let (total, available) = disks.iter().fold((0u64, 0u64), |(total, available), disk| {
        (
            total + disk.total_space(),
            available + disk.available_space(),
        )
    });

    if total == 0 {
        return 0.0;
    }

    100.0 * (total - available) as f64 / total as f64
}

async fn measure_blocking<F>(name: &'static str, f: F) -> Option<f64>
where
    F: FnOnce() -> f64 + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => {
            trace!("{name}: {value:.1}%");
            Some(value)
        }
        Err(e) => {
            warn!("{name} measurement task failed: {e}");
            None
        }
    }
}

macro_rules! resource_probe {
    ($probe:ident, $name:literal, $measure:path) => {
        pub struct $probe {
            threshold: f64,
        }

        impl $probe {
            pub fn new(threshold: f64) -> Self {
                Self { threshold }
            }
        }

        #[async_trait]
        impl Probe for $probe {
            fn name(&self) -> &'static str {
                $name
            }

            #[instrument(skip_all)]
            async fn run(&self, _cx: &ProbeContext) -> HealthMetric {
                match measure_blocking($name, $measure).await {
                    Some(value) => HealthMetric::measured(
                        self.name(),
                        value,
                        self.threshold,
                        Comparison::Below,
                    ),
                    None => self.worst_case(Utc::now()),
                }
            }

            fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
                HealthMetric::failed(self.name(), 100.0, self.threshold, now)
            }
        }
    };
}

resource_probe!(CpuProbe, "cpu_usage", cpu_usage_percent);
resource_probe!(MemoryProbe, "memory_usage", memory_usage_percent);
resource_probe!(DiskProbe, "disk_usage", disk_usage_percent);
