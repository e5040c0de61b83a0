//! Time-windowed report history
//!
//! Append-only sequence of [`HealthReport`]s ordered by timestamp, pruned
//! to a 24h window on every write. Owned exclusively by the monitor loop;
//! readers get a snapshot via [`HistoryStore::all`] and never observe a
//! half-pruned window because append and prune are one `&mut self` step.

use std::collections::VecDeque;

use chrono::TimeDelta;
use tracing::trace;

use crate::HealthReport;

/// How far back the window reaches from the most recent write.
const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Default)]
pub struct HistoryStore {
    window: VecDeque<HealthReport>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a report in timestamp order and drop everything that fell
    /// out of the retention window.
    pub fn append(&mut self, report: HealthReport) {
        // cycles produce ascending timestamps, so this is almost always
        // a plain push_back
        let at = self
            .window
            .iter()
            .rposition(|r| r.timestamp <= report.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.window.insert(at, report);

        if let Some(newest) = self.window.back().map(|r| r.timestamp) {
            let cutoff = newest - TimeDelta::hours(RETENTION_HOURS);
            while self.window.front().is_some_and(|r| r.timestamp < cutoff) {
                self.window.pop_front();
            }
        }

        trace!("history window now holds {} reports", self.window.len());
    }

    /// The most recent report, if any.
    pub fn latest(&self) -> Option<&HealthReport> {
        self.window.back()
    }

    /// The full retained window, oldest first.
    pub fn all(&self) -> impl Iterator<Item = &HealthReport> {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
