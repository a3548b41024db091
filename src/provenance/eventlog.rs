//! SF-015: Append-only JSONL provisioning event log.
//!
//! One file per schema at `<state_dir>/<schema>/events.jsonl`, one
//! [`TimestampedEvent`] per line.

use crate::core::types::{ProvisionEvent, TimestampedEvent};
use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// RFC 3339 UTC timestamp, second precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run ID from the wall clock: `r-YYYYMMDDTHHMMSS-micros`.
pub fn generate_run_id() -> String {
    Utc::now().format("r-%Y%m%dT%H%M%S-%6f").to_string()
}

/// Event sink bound to one schema.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(state_dir: impl AsRef<Path>, schema: &str) -> Self {
        Self {
            path: state_dir.as_ref().join(schema).join("events.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, creating the schema directory on first use.
    pub fn append(&self, event: ProvisionEvent) -> Result<(), String> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
        }

        let mut line = serde_json::to_vec(&TimestampedEvent {
            ts: now_rfc3339(),
            event,
        })
        .map_err(|e| format!("cannot encode event: {}", e))?;
        line.push(b'\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(&line))
            .map_err(|e| format!("cannot append to {}: {}", self.path.display(), e))
    }

    /// Append, logging instead of failing. Provisioning never aborts on the log.
    pub fn record(&self, event: ProvisionEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!("event log: {}", e);
        }
    }

    /// Every event, oldest first. A log that was never written reads as empty.
    pub fn read(&self) -> Result<Vec<TimestampedEvent>, String> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("cannot read {}: {}", self.path.display(), e)),
        };

        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| format!("cannot read {}: {}", self.path.display(), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let te = serde_json::from_str(&line)
                .map_err(|e| format!("{} line {}: {}", self.path.display(), n + 1, e))?;
            events.push(te);
        }
        Ok(events)
    }
}
