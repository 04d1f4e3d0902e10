//! Keyword cue analysis: raw text → emotion stimuli.

use super::{Channel, Stimuli};

const POSITIVE_CUES: &[&str] = &["joy", "glad", "happy", "calm", "peace", "compassion"];
const NEGATIVE_CUES: &[&str] = &["sad", "anger", "angry", "upset", "fear", "hurt"];

/// Split on whitespace, strip `.,!?`, lowercase.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c| matches!(c, '.' | ',' | '!' | '?')).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Map cue words in `text` to stimulus deltas.
///
/// Every channel is present (zero by default) so the whole state decays each turn.
pub fn analyze(text: &str) -> Stimuli {
    let mut stimuli: Stimuli = Channel::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), 0.0))
        .collect();
    let mut bump = |channel: Channel, delta: f64| {
        if let Some(v) = stimuli.get_mut(channel.as_str()) {
            *v += delta;
        }
    };

    for token in tokenize(text) {
        if POSITIVE_CUES.contains(&token.as_str()) {
            bump(Channel::Joy, 0.1);
            bump(Channel::Compassion, 0.05);
        }
        if NEGATIVE_CUES.contains(&token.as_str()) {
            bump(Channel::Sadness, 0.1);
            bump(Channel::Anger, 0.05);
            bump(Channel::Calm, -0.05);
        }
    }
    stimuli
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_case() {
        assert_eq!(tokenize("Happy, CALM!  peace?"), vec!["happy", "calm", "peace"]);
    }

    #[test]
    fn neutral_text_yields_all_zero_channels() {
        let s = analyze("the weather report");
        assert_eq!(s.len(), 5);
        assert!(s.values().all(|v| *v == 0.0));
    }

    #[test]
    fn positive_cues_raise_joy_and_compassion() {
        let s = analyze("I am so happy and glad");
        assert!((s["joy"] - 0.2).abs() < 1e-12);
        assert!((s["compassion"] - 0.1).abs() < 1e-12);
        assert_eq!(s["sadness"], 0.0);
    }

    #[test]
    fn negative_cues_lower_calm() {
        let s = analyze("I feel sad and upset.");
        assert!((s["sadness"] - 0.2).abs() < 1e-12);
        assert!((s["anger"] - 0.1).abs() < 1e-12);
        assert!((s["calm"] + 0.1).abs() < 1e-12);
    }
}
