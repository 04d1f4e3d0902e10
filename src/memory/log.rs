//! Bounded JSON interaction log.
//!
//! The file holds a JSON array of [`InteractionEntry`] values, oldest first,
//! capped at `max_entries`. Every write goes to a sibling `.tmp` file that is
//! renamed over the log, so a crash mid-write leaves the previous contents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::emotion::EmotionState;
use crate::error::PipelineError;

const RETRY_BASE_DELAY_MS: u64 = 25;

/// One completed turn as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    /// RFC 3339 timestamp of the turn.
    pub timestamp: String,
    /// Reply text produced for the turn.
    pub reflection: String,
    /// Emotion state after the turn's update.
    pub emotion: EmotionState,
    /// Id of the turn that produced the entry. Absent in logs written before it was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Milliseconds from receipt to the log write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl InteractionEntry {
    pub fn now(reflection: impl Into<String>, emotion: EmotionState) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            reflection: reflection.into(),
            emotion,
            trace_id: None,
            latency_ms: None,
        }
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, latency_ms: u64) -> Self {
        self.trace_id = Some(trace_id.into());
        self.latency_ms = Some(latency_ms);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: Option<PathBuf>,
    max_entries: usize,
    io_retries: u32,
}

impl InteractionLog {
    /// Open the log at `path`, creating the file (as `[]`) and its parent directories if absent.
    pub fn open(
        path: impl Into<PathBuf>,
        max_entries: usize,
        io_retries: u32,
    ) -> Result<Self, PipelineError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = Self {
            path: Some(path),
            max_entries: max_entries.max(1),
            io_retries,
        };
        if let Some(path) = log.path.as_deref() {
            if !path.exists() {
                log.write_with_retries(path, &[])?;
                tracing::info!(path = %path.display(), "interaction log created");
            }
        }
        Ok(log)
    }

    pub fn from_config(config: &MemoryConfig, path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        Self::open(path, config.max_entries, config.io_retries)
    }

    /// A log that records nothing. Used when memory is turned off.
    pub fn disabled() -> Self {
        Self {
            path: None,
            max_entries: 0,
            io_retries: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All retained entries, oldest first. A missing or blank file reads as empty.
    pub fn load(&self) -> Result<Vec<InteractionEntry>, PipelineError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Persistence(format!(
                "interaction log at {} is corrupt: {e}",
                path.display()
            ))
        })
    }

    /// Append one entry, evicting the oldest beyond `max_entries`.
    ///
    /// Fails without touching the file when the existing contents don't parse.
    pub fn append(&self, entry: InteractionEntry) -> Result<(), PipelineError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let mut entries = self.load()?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.write_with_retries(path, &entries)?;
        tracing::debug!(entries = entries.len(), "interaction log appended");
        Ok(())
    }

    fn write_with_retries(&self, path: &Path, entries: &[InteractionEntry]) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(entries)?;
        let mut attempt = 0u32;
        loop {
            match write_atomic(path, &json) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.io_retries => {
                    let delay = RETRY_BASE_DELAY_MS << attempt.min(6);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay,
                        "interaction log write failed, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}
