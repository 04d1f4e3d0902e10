//! Pattern-based threat screen with a hot-reloadable policy file.
//!
//! Screening order is fixed: empty input, then the ordered pattern list (first
//! match wins), then the length limit. The pattern list comes from an optional
//! TOML policy file and is reloaded whenever the file's modification time
//! changes. A policy that cannot be loaded is replaced by [`builtin_patterns`],
//! so the active list is never empty.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::SafetyVerdict;
use crate::config::SafetyConfig;
use crate::error::PipelineError;

const EMPTY_RISK: f64 = 1.0;
const THREAT_RISK: f64 = 0.9;
const LENGTH_RISK: f64 = 0.5;

/// Built-in fallback patterns, in evaluation order.
///
/// Anchored at the start of a word only, so inflections ("killing", "hurts")
/// match while words that merely contain a stem ("skill") do not. `die` is
/// closed explicitly to keep "diet" out.
const BUILTIN: &[(ThreatCategory, &str)] = &[
    (ThreatCategory::Harm, r"\b(kill\w*|suicid\w*|die[sd]?\b|dying|hurt\w*)"),
    (ThreatCategory::Hate, r"\b(hate|destroy|idiot|stupid)\w*"),
    (ThreatCategory::Injection, r"(ignore previous|system prompt)"),
    (ThreatCategory::Jailbreak, r"\b(bypass|override|admin)\w*"),
];

/// Category a threat pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    Harm,
    Hate,
    Injection,
    Jailbreak,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harm => "harm",
            Self::Hate => "hate",
            Self::Injection => "injection",
            Self::Jailbreak => "jailbreak",
        }
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled, case-insensitive threat pattern.
#[derive(Debug, Clone)]
pub struct ThreatPattern {
    pub category: ThreatCategory,
    /// The pattern as written; reported in the verdict reason.
    pub source: String,
    regex: Regex,
}

impl ThreatPattern {
    pub fn new(category: ThreatCategory, source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source).case_insensitive(true).build()?;
        Ok(Self {
            category,
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// The built-in pattern set. Never empty.
pub fn builtin_patterns() -> Vec<ThreatPattern> {
    BUILTIN
        .iter()
        .filter_map(|(category, source)| ThreatPattern::new(*category, source).ok())
        .collect()
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    patterns: Vec<PolicyEntry>,
}

#[derive(Debug, Deserialize)]
struct PolicyEntry {
    category: ThreatCategory,
    pattern: String,
}

/// Load and compile a TOML policy file.
///
/// Invalid regexes are skipped with a warning. A file that yields no valid
/// pattern is an error, as is a missing or unparsable file.
pub fn load_policy(path: &Path) -> Result<Vec<ThreatPattern>, PipelineError> {
    let policy_err = |reason: String| PipelineError::PolicyLoad {
        path: path.to_path_buf(),
        reason,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| policy_err(e.to_string()))?;
    let file: PolicyFile = toml::from_str(&contents).map_err(|e| policy_err(e.to_string()))?;

    let mut patterns = Vec::with_capacity(file.patterns.len());
    for entry in file.patterns {
        match ThreatPattern::new(entry.category, &entry.pattern) {
            Ok(p) => patterns.push(p),
            Err(e) => tracing::warn!(
                pattern = %entry.pattern,
                error = %e,
                "skipping invalid threat pattern"
            ),
        }
    }

    if patterns.is_empty() {
        return Err(policy_err("policy contains no valid patterns".into()));
    }
    Ok(patterns)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicySource {
    Builtin,
    File,
}

struct PolicyState {
    patterns: Arc<[ThreatPattern]>,
    source: PolicySource,
    /// Modification time seen at the last load attempt (`None` if the file was absent).
    file_mtime: Option<SystemTime>,
}

/// Keyword/regex threat classifier. Cheap to share behind an `Arc`.
pub struct ThreatScreen {
    max_input_chars: usize,
    policy_path: Option<PathBuf>,
    state: RwLock<PolicyState>,
}

impl ThreatScreen {
    pub fn new(config: &SafetyConfig) -> Self {
        let policy_path = config.resolved_policy_path();
        let screen = Self {
            max_input_chars: config.max_input_chars,
            policy_path,
            state: RwLock::new(PolicyState {
                patterns: builtin_patterns().into(),
                source: PolicySource::Builtin,
                file_mtime: None,
            }),
        };
        screen.reload();
        screen
    }

    /// A screen with a fixed pattern list and no policy file.
    pub fn with_patterns(patterns: Vec<ThreatPattern>, max_input_chars: usize) -> Self {
        let (patterns, source) = if patterns.is_empty() {
            (builtin_patterns(), PolicySource::Builtin)
        } else {
            (patterns, PolicySource::File)
        };
        Self {
            max_input_chars,
            policy_path: None,
            state: RwLock::new(PolicyState {
                patterns: patterns.into(),
                source,
                file_mtime: None,
            }),
        }
    }

    /// Classify `text`. Deterministic for a fixed pattern list; no side effects beyond logging.
    pub fn protect(&self, text: &str) -> SafetyVerdict {
        if let Err(e) = ensure_non_empty(text) {
            return input_verdict(EMPTY_RISK, e);
        }

        self.refresh_if_changed();
        let patterns = self.patterns();
        if let Some(hit) = patterns.iter().find(|p| p.is_match(text)) {
            tracing::info!(category = %hit.category, "threat pattern matched");
            return SafetyVerdict::blocked(THREAT_RISK, format!("Threat detected: {}", hit.source));
        }

        if let Err(e) = self.ensure_within_limit(text) {
            return input_verdict(LENGTH_RISK, e);
        }

        SafetyVerdict::safe()
    }

    /// Force a reload from the policy file, falling back to the built-in set on failure.
    pub fn reload(&self) {
        let Some(path) = self.policy_path.as_deref() else {
            return;
        };
        let mtime = file_mtime(path);
        let (patterns, source) = match load_policy(path) {
            Ok(patterns) => {
                tracing::info!(path = %path.display(), count = patterns.len(), "threat policy loaded");
                (patterns, PolicySource::File)
            }
            Err(e) => {
                tracing::warn!(error = %e, "using built-in threat patterns");
                (builtin_patterns(), PolicySource::Builtin)
            }
        };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.patterns = patterns.into();
        state.source = source;
        state.file_mtime = mtime;
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns().len()
    }

    /// `true` when the active list is the built-in fallback.
    pub fn uses_builtin(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).source == PolicySource::Builtin
    }

    fn patterns(&self) -> Arc<[ThreatPattern]> {
        Arc::clone(&self.state.read().unwrap_or_else(|e| e.into_inner()).patterns)
    }

    fn refresh_if_changed(&self) {
        let Some(path) = self.policy_path.as_deref() else {
            return;
        };
        let current = file_mtime(path);
        let seen = self.state.read().unwrap_or_else(|e| e.into_inner()).file_mtime;
        if current != seen {
            tracing::debug!(path = %path.display(), "threat policy changed on disk");
            self.reload();
        }
    }

    fn ensure_within_limit(&self, text: &str) -> Result<(), PipelineError> {
        if text.chars().count() > self.max_input_chars {
            return Err(PipelineError::Input("Input too long".into()));
        }
        Ok(())
    }
}

fn ensure_non_empty(text: &str) -> Result<(), PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::Input("empty input".into()));
    }
    Ok(())
}

fn input_verdict(risk_level: f64, err: PipelineError) -> SafetyVerdict {
    tracing::debug!(error = %err, "input rejected by threat screen");
    let reason = match err {
        PipelineError::Input(reason) => reason,
        other => other.to_string(),
    };
    SafetyVerdict::blocked(risk_level, reason)
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
