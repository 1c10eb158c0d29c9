//! Request usage tracking for cost and request accounting

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// One model call as seen by the usage log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Seconds since Unix epoch
    pub timestamp: u64,

    /// Length of the response text in characters (0 on failure)
    pub response_length: usize,

    /// Whether the call produced usable text
    pub success: bool,
}

/// Append-only usage log shared between clones of a client
///
/// Entries are kept in memory and, when a file is configured, appended to it
/// as JSON lines. A failing write is logged and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct UsageLog {
    entries: Arc<Mutex<Vec<UsageEntry>>>,
    file: Option<PathBuf>,
}

impl UsageLog {
    /// In-memory log only
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that also appends JSON lines to `path`
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            file: Some(path.into()),
        }
    }

    /// Record one call
    pub fn record(&self, response_length: usize, success: bool) {
        let entry = UsageEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            response_length,
            success,
        };

        if let Some(path) = &self.file {
            let written = serde_json::to_string(&entry)
                .map_err(std::io::Error::other)
                .and_then(|line| {
                    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                    writeln!(file, "{}", line)
                });
            if let Err(e) = written {
                warn!("Usage logging to {} failed: {}", path.display(), e);
            }
        }

        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<UsageEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of calls that produced usable text
    pub fn successes(&self) -> usize {
        self.entries().iter().filter(|e| e.success).count()
    }
}
