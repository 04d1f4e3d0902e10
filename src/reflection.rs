//! Reply generation.
//!
//! [`ReplyGenerator`] is the seam for an external language model. The built-in
//! [`ReflectionComposer`] needs no model: it derives a moral index from the
//! calm and compassion channels, picks a tone from it, and prefixes the user's
//! words with that tone.

use serde::{Deserialize, Serialize};

use crate::config::GOLDEN_RATIO;
use crate::emotion::{Channel, EmotionState};

/// Everything a generator may draw on for one reply.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub text: String,
    pub emotion: EmotionState,
    pub coherence: f64,
    /// Contents of the recalled memories, best first.
    pub context: Vec<String>,
}

/// Register of the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Compassionate,
    Calm,
    Neutral,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compassionate => "compassionate",
            Self::Calm => "calm",
            Self::Neutral => "neutral",
        }
    }

    /// `compassionate` above 0.6, `calm` above 0.4, otherwise `neutral`.
    pub fn from_moral_index(moral_index: f64) -> Self {
        if moral_index > 0.6 {
            Self::Compassionate
        } else if moral_index > 0.4 {
            Self::Calm
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    pub text: String,
    pub tone: Tone,
    pub moral_index: f64,
}

impl Default for Reflection {
    /// Used when generation fails or times out.
    fn default() -> Self {
        Self {
            text: String::new(),
            tone: Tone::Neutral,
            moral_index: 0.0,
        }
    }
}

/// Produces the reply for a safe turn.
///
/// Called from `tokio::task::spawn_blocking` under a timeout; implementations may block.
pub trait ReplyGenerator: Send + Sync {
    fn generate(&self, request: &ReplyRequest) -> anyhow::Result<Reflection>;
}

/// `compassion·φ/(1+φ) + calm/(1+φ)`, in `[0, 1]`.
pub fn moral_index(emotion: &EmotionState) -> f64 {
    let total = 1.0 + GOLDEN_RATIO;
    emotion.get(Channel::Compassion) * GOLDEN_RATIO / total + emotion.get(Channel::Calm) / total
}

/// Built-in, model-free generator.
#[derive(Debug, Clone, Default)]
pub struct ReflectionComposer;

impl ReplyGenerator for ReflectionComposer {
    fn generate(&self, request: &ReplyRequest) -> anyhow::Result<Reflection> {
        let moral_index = moral_index(&request.emotion);
        let tone = Tone::from_moral_index(moral_index);
        Ok(Reflection {
            text: format!("[{}] {}", tone.as_str().to_uppercase(), request.text),
            tone,
            moral_index,
        })
    }
}
