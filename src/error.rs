//! Error taxonomy for the turn pipeline.
//!
//! None of these escape [`ReflectionOrchestrator::submit`](crate::orchestrator::ReflectionOrchestrator::submit):
//! each stage maps its error to a fallback value and records the stage as degraded.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or over-length user text. Surfaced as a safety block, never as a failure.
    #[error("input rejected: {0}")]
    Input(String),

    /// Embedding provider, vector store, or reply generator could not serve the request.
    #[error("{backend} unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Disk or database write/read failure.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Threat policy file missing or corrupt.
    #[error("policy load failed for {}: {reason}", path.display())]
    PolicyLoad { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn backend(backend: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(format!("sqlite: {e}"))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(format!("json: {e}"))
    }
}
