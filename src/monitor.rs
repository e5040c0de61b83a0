//! MonitorLoop - drives the probe/aggregate/alert/retain cycle
//!
//! One long-lived loop triggers a cycle on a fixed interval. Within a
//! cycle all probes fan out concurrently (see [`crate::collector`]); no
//! two cycles ever overlap - an overrunning cycle delays the next tick
//! instead of racing it, which keeps the history store single-writer.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick -> collect batch -> aggregate report -> history append
//!                                      |                  |
//!                                      v                  v
//!                               alert evaluate      persist slots
//!                                      |
//!                                      v
//!                                  notifier
//!     ^
//!     +--- Commands (RunNow, Shutdown) + watch-based shutdown signal
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{self, AlertDispatcher};
use crate::collector::collect;
use crate::config::Config;
use crate::history::HistoryStore;
use crate::persist::ReportStore;
use crate::probes::{self, Probe, ProbeContext};
use crate::{HealthMetric, HealthReport, Severity};

/// Commands that can be sent to a running MonitorLoop
#[derive(Debug)]
pub enum MonitorCommand {
    /// Trigger an immediate cycle (bypassing the interval timer)
    ///
    /// Used for testing and manual refresh operations.
    RunNow {
        respond_to: oneshot::Sender<HealthReport>,
    },

    /// Gracefully shut down the loop after the current cycle
    Shutdown,
}

/// The monitoring loop: owns the probe registry, the history window and
/// the persisted slots. No process-wide state; everything the loop needs
/// arrives through its constructor.
pub struct MonitorLoop {
    registry: Vec<Box<dyn Probe>>,
    cx: ProbeContext,
    history: HistoryStore,
    store: ReportStore,
    dispatcher: AlertDispatcher,
    interval_duration: Duration,
    probe_timeout: Duration,
    command_rx: mpsc::Receiver<MonitorCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MonitorLoop {
    pub fn new(
        config: &Config,
        command_rx: mpsc::Receiver<MonitorCommand>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let monitor = Arc::new(config.monitor.clone());
        let registry = probes::registry(&monitor);
        let cx = ProbeContext::new(monitor.clone()).context("failed to build probe context")?;
        let dispatcher = AlertDispatcher::new(monitor.alert.as_ref());
        let store = ReportStore::new(config.storage.clone().unwrap_or_default());

        Ok(Self {
            registry,
            cx,
            history: HistoryStore::new(),
            store,
            dispatcher,
            interval_duration: Duration::from_secs(monitor.interval),
            probe_timeout: Duration::from_secs(monitor.probe_timeout),
            command_rx,
            shutdown_rx,
        })
    }

    /// Run until shut down.
    ///
    /// A shutdown signal received mid-cycle aborts the in-flight probe
    /// calls; the last fully completed cycle remains the persisted state.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting monitor loop ({} probes, every {:?})",
            self.registry.len(),
            self.interval_duration
        );

        let mut ticker = interval(self.interval_duration);
        // an overrunning cycle delays the next tick, never overlaps it
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // cloned once so an un-consumed change notification survives
        // across iterations; the cycle borrows self, so the receiver has
        // to live outside of it
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.raced_cycle(&mut shutdown).await.is_none() {
                        break;
                    }
                }

                _ = shutdown.changed() => {
                    debug!("received shutdown signal");
                    break;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            match self.raced_cycle(&mut shutdown).await {
                                Some(report) => {
                                    let _ = respond_to.send(report);
                                }
                                None => break,
                            }
                        }

                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("monitor loop stopped");
    }

    /// One full cycle with its probe phase raced against shutdown.
    ///
    /// Only the probe phase is abortable; once a batch is in, the
    /// persist-and-alert phase runs to completion so the current-report
    /// slot and the history slot never drift apart. Returns `None` when
    /// shutdown won the race.
    async fn raced_cycle(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<HealthReport> {
        let batch = tokio::select! {
            batch = collect(&self.registry, &self.cx, self.probe_timeout) => batch,
            _ = shutdown.changed() => {
                debug!("shutdown signal aborted in-flight cycle");
                return None;
            }
        };

        Some(self.finish_cycle(batch).await)
    }

    /// Aggregate, retain, persist, alert.
    ///
    /// Persistence and notifier failures are logged and skipped; the loop
    /// must not go dark because its own write or alert path failed.
    #[instrument(skip_all)]
    async fn finish_cycle(&mut self, batch: Vec<HealthMetric>) -> HealthReport {
        let report = HealthReport::aggregate(&batch, Utc::now());

        info!(
            "health score: {:.1}% ({})",
            report.overall_score, report.overall_status
        );

        self.history.append(report.clone());

        if let Err(e) = self.store.write_current(&report).await {
            error!("failed to write current report slot: {e}");
        }

        let window: Vec<_> = self.history.all().collect();
        if let Err(e) = self.store.write_history(&window).await {
            error!("failed to write history slot: {e}");
        }

        if let Some(decision) = alerts::evaluate(&batch) {
            if decision.severity == Severity::Critical {
                warn!(
                    "critical degradation in {} metric(s)",
                    decision.metrics.len()
                );
            }
            self.dispatcher.dispatch(&decision).await;
        }

        report
    }
}

/// Handle for controlling a spawned MonitorLoop
///
/// Cloneable; commands go over mpsc, shutdown over a watch channel so it
/// can interrupt an in-flight cycle.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Spawn the monitor loop as a tokio task and return a handle plus
    /// the task's join handle.
    pub fn spawn(config: &Config) -> Result<(Self, tokio::task::JoinHandle<()>)> {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let actor = MonitorLoop::new(config, cmd_rx, shutdown_rx)?;
        let join = tokio::spawn(actor.run());

        Ok((
            Self {
                sender: cmd_tx,
                shutdown_tx,
            },
            join,
        ))
    }

    /// Trigger an immediate cycle and wait for its report.
    pub async fn run_now(&self) -> Result<HealthReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Signal shutdown, aborting any in-flight cycle.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
