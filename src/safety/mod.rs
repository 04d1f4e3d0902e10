//! Input screening: the threat screen and the self-harm safeguard.
//!
//! [`ThreatScreen::protect`] turns raw user text into a [`SafetyVerdict`].
//! [`CrisisSafeguard`] recognises self-harm language and supplies a supportive
//! reply template that bypasses normal reply generation.

pub mod crisis;
pub mod threat;

pub use crisis::CrisisSafeguard;
pub use threat::{ThreatCategory, ThreatPattern, ThreatScreen};

use serde::Serialize;

/// Admit/block decision for one piece of user text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    /// Risk score in `[0.0, 1.0]`.
    pub risk_level: f64,
    pub reason: String,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            risk_level: 0.0,
            reason: "Safe".into(),
        }
    }

    pub fn blocked(risk_level: f64, reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            risk_level: risk_level.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }
}
