use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Golden ratio. Default tuning constant for decay base, emotion gain, and tone weighting.
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NamoConfig {
    pub features: FeatureFlags,
    pub logging: LoggingConfig,
    pub safety: SafetyConfig,
    pub emotion: EmotionConfig,
    pub memory: MemoryConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_safety: bool,
    pub enable_memory: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_input_chars: usize,
    /// Optional TOML threat policy; built-in patterns are used when absent or unreadable.
    pub policy_path: Option<String>,
    pub helpline: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmotionConfig {
    pub damping: f64,
    pub gain: f64,
    pub coherence_scale: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub db_path: String,
    pub log_path: String,
    pub max_entries: usize,
    pub io_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"local"` (ONNX) or `"hashed"` (deterministic pseudo-embedding).
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub decay_base: f64,
    pub default_k: usize,
    pub candidate_pool: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplyConfig {
    pub timeout_ms: u64,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_safety: true,
            enable_memory: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 2000,
            policy_path: None,
            helpline: "a local crisis helpline (988 in the US)".into(),
        }
    }
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            damping: 0.95,
            gain: 1.0 / GOLDEN_RATIO,
            coherence_scale: GOLDEN_RATIO.powi(3),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let dir = default_namo_dir();
        Self {
            db_path: dir.join("memory.db").to_string_lossy().into_owned(),
            log_path: dir.join("memory_log.json").to_string_lossy().into_owned(),
            max_entries: 200,
            io_retries: 3,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_namo_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            timeout_ms: 5000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            decay_base: GOLDEN_RATIO,
            default_k: 3,
            candidate_pool: 20,
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Returns `~/.namo/`, or `./.namo/` when no home directory is known.
pub fn default_namo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".namo")
}

/// Returns the default config file path: `~/.namo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_namo_dir().join("config.toml")
}

impl NamoConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            NamoConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `NAMO_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_bool("NAMO_ENABLE_SAFETY") {
            self.features.enable_safety = val;
        }
        if let Some(val) = env_bool("NAMO_ENABLE_MEMORY") {
            self.features.enable_memory = val;
        }
        if let Ok(val) = std::env::var("NAMO_MEMORY_PATH") {
            self.memory.log_path = val;
        }
        if let Ok(val) = std::env::var("NAMO_DB") {
            self.memory.db_path = val;
        }
        if let Some(val) = env_parse::<usize>("NAMO_MAX_MEMORY_ENTRIES") {
            self.memory.max_entries = val;
        }
        if let Some(val) = env_parse::<f64>("NAMO_DECAY_BASE") {
            self.retrieval.decay_base = val;
        }
        if let Ok(val) = std::env::var("NAMO_LOG_LEVEL") {
            self.logging.log_level = val;
        }
    }

    /// Reject tuning constants outside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        let e = &self.emotion;
        ensure!(
            e.damping > 0.0 && e.damping < 1.0,
            "emotion.damping must be in (0, 1), got {}",
            e.damping
        );
        ensure!(e.gain > 0.0, "emotion.gain must be positive, got {}", e.gain);
        ensure!(
            e.coherence_scale > 0.0,
            "emotion.coherence_scale must be positive, got {}",
            e.coherence_scale
        );
        ensure!(
            self.retrieval.decay_base > 1.0,
            "retrieval.decay_base must be greater than 1, got {}",
            self.retrieval.decay_base
        );
        ensure!(
            self.safety.max_input_chars > 0,
            "safety.max_input_chars must be positive"
        );
        ensure!(
            self.memory.max_entries > 0,
            "memory.max_entries must be positive"
        );
        Ok(())
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.memory.db_path)
    }

    pub fn resolved_log_path(&self) -> PathBuf {
        expand_tilde(&self.memory.log_path)
    }
}

impl SafetyConfig {
    pub fn resolved_policy_path(&self) -> Option<PathBuf> {
        self.policy_path.as_deref().map(expand_tilde)
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!(key, value = other, "ignoring unrecognized boolean override");
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
