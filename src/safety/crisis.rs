//! Self-harm safeguard.
//!
//! Runs ahead of the threat screen. A match produces a supportive reply that
//! always points to a helpline, and the turn is blocked without emotion or
//! memory updates.

use super::SafetyVerdict;

const TRIGGERS: &[&str] = &[
    "kill myself",
    "killing myself",
    "suicide",
    "suicidal",
    "end it all",
    "end my life",
    "want to die",
    "hurt myself",
    "hurting myself",
    "ไม่อยากอยู่",
    "อยากหายไป",
];

/// Detects self-harm language and supplies the safe reply template.
#[derive(Debug, Clone)]
pub struct CrisisSafeguard {
    helpline: String,
}

impl CrisisSafeguard {
    pub fn new(helpline: impl Into<String>) -> Self {
        Self {
            helpline: helpline.into(),
        }
    }

    /// Returns the supportive template when `text` contains a self-harm trigger.
    pub fn check(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let trigger = TRIGGERS.iter().find(|t| lowered.contains(*t))?;
        tracing::warn!(trigger, "self-harm risk detected");
        Some(self.template())
    }

    /// Verdict attached to a turn blocked by this safeguard.
    pub fn verdict() -> SafetyVerdict {
        SafetyVerdict::blocked(1.0, "Self-harm risk detected")
    }

    fn template(&self) -> String {
        format!(
            "What you are feeling right now matters. If you feel you might hurt yourself, \
             please pause and reach out to someone you trust, or contact {} right away. \
             I am here to listen and we can think this through together.",
            self.helpline
        )
    }
}
