//! Emotion state model.
//!
//! [`EmotionState`] holds five affect channels, each clamped to `[0.0, 1.0]`.
//! [`EmotionModel::update`] is a damped low-pass filter over incoming stimuli:
//! a single large stimulus cannot saturate a channel, and channels drift back
//! toward zero without reinforcement. [`cues`] turns raw text into stimuli.

pub mod cues;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EmotionConfig;

/// Floor added to the negative-channel sum in [`EmotionModel::coherence`].
const COHERENCE_EPSILON: f64 = 1e-3;

/// Stimulus deltas keyed by channel name. Unknown names are ignored.
pub type Stimuli = BTreeMap<String, f64>;

/// A named affect channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Joy,
    Sadness,
    Anger,
    Calm,
    Compassion,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Joy,
        Channel::Sadness,
        Channel::Anger,
        Channel::Calm,
        Channel::Compassion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Sadness => "sadness",
            Self::Anger => "anger",
            Self::Calm => "calm",
            Self::Compassion => "compassion",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joy" => Ok(Self::Joy),
            "sadness" => Ok(Self::Sadness),
            "anger" => Ok(Self::Anger),
            "calm" => Ok(Self::Calm),
            "compassion" => Ok(Self::Compassion),
            _ => Err(format!("unknown emotion channel: {s}")),
        }
    }
}

/// Affect channel values, each in `[0.0, 1.0]`.
///
/// Serializes as a `{channel: value}` object. Deserialized values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Channel, f64>", into = "BTreeMap<Channel, f64>")]
pub struct EmotionState {
    values: [f64; 5],
}

impl Default for EmotionState {
    fn default() -> Self {
        Self::from_pairs([
            (Channel::Joy, 0.4),
            (Channel::Sadness, 0.1),
            (Channel::Anger, 0.05),
            (Channel::Calm, 0.6),
            (Channel::Compassion, 0.7),
        ])
    }
}

impl EmotionState {
    /// All channels at zero.
    pub fn zero() -> Self {
        Self { values: [0.0; 5] }
    }

    /// Build a state from `(channel, value)` pairs; missing channels are zero.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Channel, f64)>) -> Self {
        let mut state = Self::zero();
        for (channel, value) in pairs {
            state.set(channel, value);
        }
        state
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.values[channel.index()]
    }

    fn set(&mut self, channel: Channel, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value };
        self.values[channel.index()] = value.clamp(0.0, 1.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        Channel::ALL.iter().map(|c| (*c, self.get(*c)))
    }

    /// Strongest channel value.
    pub fn intensity(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Channels strictly above `threshold`, in channel order.
    pub fn dominant(&self, threshold: f64) -> Vec<Channel> {
        self.iter()
            .filter(|(_, v)| *v > threshold)
            .map(|(c, _)| c)
            .collect()
    }
}

impl From<BTreeMap<Channel, f64>> for EmotionState {
    fn from(map: BTreeMap<Channel, f64>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<EmotionState> for BTreeMap<Channel, f64> {
    fn from(state: EmotionState) -> Self {
        state.iter().collect()
    }
}

/// Owns the session's [`EmotionState`] and applies damped updates to it.
#[derive(Debug, Clone)]
pub struct EmotionModel {
    state: EmotionState,
    damping: f64,
    gain: f64,
    coherence_scale: f64,
}

impl EmotionModel {
    pub fn new(config: &EmotionConfig) -> Self {
        Self::with_state(config, EmotionState::default())
    }

    pub fn with_state(config: &EmotionConfig, state: EmotionState) -> Self {
        Self {
            state,
            damping: config.damping,
            gain: config.gain,
            coherence_scale: config.coherence_scale,
        }
    }

    pub fn state(&self) -> EmotionState {
        self.state
    }

    /// Apply `new = clamp(old * damping + delta * gain, 0, 1)` to every channel named in `stimuli`.
    ///
    /// Unknown channel names and NaN deltas are skipped. Infinite deltas saturate.
    pub fn update(&mut self, stimuli: &Stimuli) -> EmotionState {
        for (name, delta) in stimuli {
            let channel: Channel = match name.parse() {
                Ok(c) => c,
                Err(_) => {
                    tracing::debug!(channel = %name, "ignoring unknown emotion channel");
                    continue;
                }
            };
            if delta.is_nan() {
                tracing::debug!(channel = %name, "ignoring NaN stimulus");
                continue;
            }
            let old = self.state.get(channel);
            let mut new = old * self.damping + delta * self.gain;
            if new.is_nan() {
                // inf * 0 gain; treat as no stimulus
                new = old * self.damping;
            }
            self.state.set(channel, new);
        }
        self.state
    }

    /// Positive/negative balance squashed into `[0.0, 1.0)`.
    ///
    /// `tanh(((joy + calm + compassion) / (sadness + anger + ε)) / coherence_scale)`
    pub fn coherence(&self) -> f64 {
        let s = &self.state;
        let positive = s.get(Channel::Joy) + s.get(Channel::Calm) + s.get(Channel::Compassion);
        let negative = s.get(Channel::Sadness) + s.get(Channel::Anger) + COHERENCE_EPSILON;
        ((positive / negative) / self.coherence_scale).tanh()
    }
}
