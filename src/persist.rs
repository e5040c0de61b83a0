//! Persisted report slots
//!
//! Two externally-read JSON slots: the current report and the retained
//! history window. Both are replaced atomically (write to a temp file in
//! the same directory, then rename) so dashboard readers never observe a
//! partially written document.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use crate::HealthReport;
use crate::config::StorageConfig;

/// Result type alias for slot writes
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while writing a slot
#[derive(Debug)]
pub enum StoreError {
    /// I/O error (file access, rename)
    Io(std::io::Error),

    /// Report serialization error
    Serialization(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "I/O error: {}", err),
            StoreError::Serialization(err) => write!(f, "report serialization error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

/// Writer for the current-report and history slots.
pub struct ReportStore {
    report_path: PathBuf,
    history_path: PathBuf,
}

impl ReportStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            report_path: config.report_path,
            history_path: config.history_path,
        }
    }

    /// Replace the "current report" slot.
    pub async fn write_current(&self, report: &HealthReport) -> StoreResult<()> {
        write_slot(&self.report_path, report).await
    }

    /// Replace the "history window" slot with the full retained window.
    pub async fn write_history(&self, window: &[&HealthReport]) -> StoreResult<()> {
        write_slot(&self.history_path, &window).await
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

async fn write_slot<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    // rename within the same directory is the atomic replace
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await?;
    tokio::fs::rename(&tmp_path, path).await?;

    trace!("wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

impl fmt::Debug for ReportStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportStore")
            .field("report_path", &self.report_path)
            .field("history_path", &self.history_path)
            .finish()
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        debug!("no storage configured, using default slot paths");
        Self::new(StorageConfig::default())
    }
}
