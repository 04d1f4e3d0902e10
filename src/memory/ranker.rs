//! Recency-and-intensity ranking for retrieved memories.
//!
//! A record's weight decays geometrically with age: after `h` hours the
//! temporal weight is `1 / decay_base^(h / 24)`, so one day of age divides the
//! weight by `decay_base` (φ by default). The final score multiplies that by
//! the record's emotional intensity.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::RetrievalConfig;
use crate::memory::types::{MemoryRecord, RankedMemory};

#[derive(Debug, Clone, Copy)]
pub struct RetrievalRanker {
    decay_base: f64,
}

impl RetrievalRanker {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self::with_decay_base(config.decay_base)
    }

    pub fn with_decay_base(decay_base: f64) -> Self {
        Self { decay_base }
    }

    /// Age-based weight in `(0, 1]`. Future and unparseable timestamps weigh 1.0.
    pub fn temporal_weight(&self, timestamp: &str, now: DateTime<Utc>) -> f64 {
        let Some(ts) = parse_timestamp(timestamp) else {
            return 1.0;
        };
        let hours = ((now - ts).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
        1.0 / self.decay_base.powf(hours / 24.0)
    }

    pub fn score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        self.temporal_weight(&record.timestamp, now) * record.emotional_intensity
    }

    /// Score and order candidates, highest score first.
    ///
    /// The sort is stable; equal scores are broken by the most recent
    /// parseable timestamp, and records without one sort after those with one.
    pub fn rank(&self, candidates: Vec<(MemoryRecord, f64)>, now: DateTime<Utc>) -> Vec<RankedMemory> {
        let mut ranked: Vec<(RankedMemory, Option<DateTime<Utc>>)> = candidates
            .into_iter()
            .map(|(record, distance)| {
                let score = self.score(&record, now);
                let parsed = parse_timestamp(&record.timestamp);
                (
                    RankedMemory {
                        record,
                        distance,
                        score,
                    },
                    parsed,
                )
            })
            .collect();

        ranked.sort_by(|(a, a_ts), (b, b_ts)| {
            b.score.total_cmp(&a.score).then_with(|| b_ts.cmp(a_ts))
        });

        ranked.into_iter().map(|(r, _)| r).collect()
    }
}

/// Accepts RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
