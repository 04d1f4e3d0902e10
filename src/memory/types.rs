//! Core memory type definitions.

use serde::{Deserialize, Serialize};

use crate::emotion::EmotionState;

/// A stored interaction, matching the `memories` table joined with its vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// The user text as it was submitted.
    pub content: String,
    /// 384-dim vector. Empty when a listing query skipped the vector table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Largest channel value of the emotion snapshot taken at write time, in `[0.0, 1.0]`.
    pub emotional_intensity: f64,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
    /// Emotion snapshot taken at write time.
    pub emotion: EmotionState,
    /// Name of the provider that produced `embedding` (e.g. `"all-MiniLM-L6-v2"`, `"hashed-384"`).
    pub embedding_source: String,
    pub metadata: Option<serde_json::Value>,
}

/// A candidate scored by the retrieval ranker.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMemory {
    pub record: MemoryRecord,
    /// L2 distance from the query vector (lower is closer).
    pub distance: f64,
    /// `temporal_weight * emotional_intensity`.
    pub score: f64,
}
