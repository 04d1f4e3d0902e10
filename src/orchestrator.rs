//! Per-turn pipeline.
//!
//! [`ReflectionOrchestrator::submit`] drives one piece of user text through
//! screening, the emotion update, the long-term memory write and recall,
//! reply generation, and the interaction log. Stage failures never escape:
//! each one is logged, replaced by a default, and listed in
//! [`TurnResponse::degraded`]. Every turn gets a UUID v7 trace id, carried on
//! the `turn` tracing span, the response, and the interaction log entry.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::Instrument;

use crate::config::NamoConfig;
use crate::embedding::resolve_provider;
use crate::emotion::{cues, EmotionModel, EmotionState};
use crate::error::PipelineError;
use crate::memory::log::{InteractionEntry, InteractionLog};
use crate::memory::store::LongTermMemory;
use crate::memory::summary::summarize_reflections;
use crate::memory::truncate_preview;
use crate::reflection::{Reflection, ReflectionComposer, ReplyGenerator, ReplyRequest, Tone};
use crate::safety::{CrisisSafeguard, SafetyVerdict, ThreatScreen};

/// Reply for turns blocked by the threat screen.
pub const REFUSAL: &str =
    "I can't help with that request, but I'm here if you'd like to talk about something else.";

const BALANCED_ABOVE: f64 = 0.75;
const RECALIBRATING_BELOW: f64 = 0.35;
const DOMINANT_ABOVE: f64 = 0.4;
const RECALL_PREVIEW_CHARS: usize = 50;

/// Pipeline position of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Received,
    Screened,
    Blocked,
    EmotionUpdated,
    MemoryWritten,
    MemoryRetrieved,
    Responded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemorySummary {
    /// Log digest and recall preview joined with `" | "`; empty when neither exists.
    pub text: String,
    /// Recalled memory contents, best first.
    pub recalled: Vec<String>,
}

/// Everything the caller gets back from one turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub trace_id: String,
    /// Wall-clock time spent in `submit`.
    pub latency_ms: u64,
    pub reply: String,
    pub tone: Tone,
    pub moral_index: f64,
    pub tags: Vec<String>,
    pub emotion: EmotionState,
    pub coherence: f64,
    pub risk: SafetyVerdict,
    pub memory_summary: MemorySummary,
    /// `Blocked` or `Responded`.
    pub stage: TurnStage,
    /// Stages that fell back to a default value.
    pub degraded: Vec<TurnStage>,
}

impl TurnResponse {
    pub fn is_blocked(&self) -> bool {
        self.stage == TurnStage::Blocked
    }
}

pub struct ReflectionOrchestrator {
    enable_safety: bool,
    screen: ThreatScreen,
    crisis: CrisisSafeguard,
    emotion: Mutex<EmotionModel>,
    memory: Option<LongTermMemory>,
    log: Arc<Mutex<InteractionLog>>,
    reply: Arc<dyn ReplyGenerator>,
    reply_timeout: Duration,
    default_k: usize,
}

impl ReflectionOrchestrator {
    /// Build from config, opening the database and interaction log when memory is enabled.
    ///
    /// Backends that fail to open are logged and left out; construction itself never fails.
    pub fn from_config(config: &NamoConfig) -> Self {
        if !config.features.enable_memory {
            tracing::info!("memory disabled by configuration");
            return Self::new(config, None, InteractionLog::disabled());
        }

        let embedder = resolve_provider(&config.embedding);
        let memory = match LongTermMemory::open(config, embedder) {
            Ok(memory) => Some(memory),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "long-term memory unavailable, continuing without it");
                None
            }
        };
        let log = match InteractionLog::from_config(&config.memory, config.resolved_log_path()) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(error = %e, "interaction log unavailable, continuing without it");
                InteractionLog::disabled()
            }
        };
        Self::new(config, memory, log)
    }

    pub fn new(config: &NamoConfig, memory: Option<LongTermMemory>, log: InteractionLog) -> Self {
        Self {
            enable_safety: config.features.enable_safety,
            screen: ThreatScreen::new(&config.safety),
            crisis: CrisisSafeguard::new(config.safety.helpline.clone()),
            emotion: Mutex::new(EmotionModel::new(&config.emotion)),
            memory,
            log: Arc::new(Mutex::new(log)),
            reply: Arc::new(ReflectionComposer),
            reply_timeout: Duration::from_millis(config.reply.timeout_ms),
            default_k: config.retrieval.default_k,
        }
    }

    /// Replace the built-in reply generator.
    pub fn with_reply_generator(mut self, reply: Arc<dyn ReplyGenerator>) -> Self {
        self.reply = reply;
        self
    }

    pub fn memory(&self) -> Option<&LongTermMemory> {
        self.memory.as_ref()
    }

    pub fn screen(&self) -> &ThreatScreen {
        &self.screen
    }

    pub fn emotion_state(&self) -> EmotionState {
        self.emotion_model().state()
    }

    /// Retained interaction log entries, oldest first.
    pub fn history(&self) -> Result<Vec<InteractionEntry>, PipelineError> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).load()
    }

    fn emotion_model(&self) -> std::sync::MutexGuard<'_, EmotionModel> {
        self.emotion.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one turn. Always returns a response.
    pub async fn submit(&self, text: &str) -> TurnResponse {
        let trace_id = uuid::Uuid::now_v7().to_string();
        let started = Instant::now();
        let span = tracing::info_span!("turn", trace_id = %trace_id);
        let mut response = self.run_turn(text, trace_id, started).instrument(span).await;
        response.latency_ms = elapsed_ms(started);
        tracing::debug!(trace_id = %response.trace_id, latency_ms = response.latency_ms, "turn finished");
        response
    }

    async fn run_turn(&self, text: &str, trace_id: String, started: Instant) -> TurnResponse {
        tracing::debug!(chars = text.chars().count(), stage = ?TurnStage::Received, "turn received");

        if let Some(reply) = self.crisis.check(text) {
            return self.blocked(trace_id, reply, CrisisSafeguard::verdict());
        }
        let risk = if self.enable_safety {
            self.screen.protect(text)
        } else {
            SafetyVerdict::safe()
        };
        if !risk.is_safe {
            tracing::info!(risk = risk.risk_level, reason = %risk.reason, "turn blocked");
            return self.blocked(trace_id, REFUSAL.to_string(), risk);
        }
        tracing::debug!(stage = ?TurnStage::Screened, "input admitted");

        let mut degraded = Vec::new();

        let (emotion, coherence) = {
            let mut model = self.emotion_model();
            let emotion = model.update(&cues::analyze(text));
            (emotion, model.coherence())
        };
        tracing::debug!(stage = ?TurnStage::EmotionUpdated, coherence, "emotion updated");

        let recalled = match &self.memory {
            Some(memory) => {
                if let Err(e) = memory.store_memory(text, &emotion).await {
                    tracing::warn!(error = %e, "memory write failed");
                    degraded.push(TurnStage::MemoryWritten);
                }
                match memory.retrieve_ranked(text, self.default_k).await {
                    Ok(ranked) => ranked.into_iter().map(|r| r.record.content).collect(),
                    Err(e) => {
                        tracing::warn!(error = %e, "memory retrieval failed, continuing without context");
                        degraded.push(TurnStage::MemoryRetrieved);
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let reflection = self
            .generate_reply(ReplyRequest {
                text: text.to_string(),
                emotion,
                coherence,
                context: recalled.clone(),
            })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "reply generation failed, using empty reply");
                degraded.push(TurnStage::Responded);
                Reflection::default()
            });

        let log_digest = match self
            .record_interaction(
                InteractionEntry::now(reflection.text.clone(), emotion)
                    .with_trace(trace_id.clone(), elapsed_ms(started)),
            )
            .await
        {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(error = %e, "interaction log unavailable");
                if !degraded.contains(&TurnStage::MemoryWritten) {
                    degraded.push(TurnStage::MemoryWritten);
                }
                None
            }
        };

        let tags = derive_tags(reflection.tone, coherence, &emotion);
        let memory_summary = compose_summary(log_digest, recalled);
        tracing::debug!(stage = ?TurnStage::Responded, degraded = degraded.len(), "turn complete");

        TurnResponse {
            trace_id,
            latency_ms: 0,
            reply: reflection.text,
            tone: reflection.tone,
            moral_index: reflection.moral_index,
            tags,
            emotion,
            coherence,
            risk,
            memory_summary,
            stage: TurnStage::Responded,
            degraded,
        }
    }

    fn blocked(&self, trace_id: String, reply: String, risk: SafetyVerdict) -> TurnResponse {
        let (emotion, coherence) = {
            let model = self.emotion_model();
            (model.state(), model.coherence())
        };
        TurnResponse {
            trace_id,
            latency_ms: 0,
            reply,
            tone: Tone::Neutral,
            moral_index: 0.0,
            tags: Vec::new(),
            emotion,
            coherence,
            risk,
            memory_summary: MemorySummary::default(),
            stage: TurnStage::Blocked,
            degraded: Vec::new(),
        }
    }

    async fn generate_reply(&self, request: ReplyRequest) -> Result<Reflection, PipelineError> {
        let reply = Arc::clone(&self.reply);
        let task = tokio::task::spawn_blocking(move || reply.generate(&request));
        match tokio::time::timeout(self.reply_timeout, task).await {
            Err(_) => Err(PipelineError::backend(
                "reply generator",
                format!("timed out after {}ms", self.reply_timeout.as_millis()),
            )),
            Ok(Err(join)) => Err(PipelineError::backend("reply generator", join)),
            Ok(Ok(Err(e))) => Err(PipelineError::backend("reply generator", format!("{e:#}"))),
            Ok(Ok(Ok(reflection))) => Ok(reflection),
        }
    }

    /// Append to the interaction log and return its digest, `None` when the log is empty or off.
    async fn record_interaction(&self, entry: InteractionEntry) -> Result<Option<String>, PipelineError> {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || {
            let log = log.lock().unwrap_or_else(|e| e.into_inner());
            if !log.is_enabled() {
                return Ok(None);
            }
            log.append(entry)?;
            let entries = log.load()?;
            Ok((!entries.is_empty()).then(|| summarize_reflections(&entries)))
        })
        .await
        .map_err(|e| PipelineError::backend("interaction log", e))?
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Tone, a coherence band, then every channel above 0.4, without repeats.
pub fn derive_tags(tone: Tone, coherence: f64, emotion: &EmotionState) -> Vec<String> {
    let mut tags = vec![tone.as_str().to_string()];
    if coherence > BALANCED_ABOVE {
        tags.push("balanced".into());
    } else if coherence < RECALIBRATING_BELOW {
        tags.push("recalibrating".into());
    }
    for channel in emotion.dominant(DOMINANT_ABOVE) {
        let name = channel.as_str();
        if !tags.iter().any(|t| t == name) {
            tags.push(name.to_string());
        }
    }
    tags
}

fn compose_summary(log_digest: Option<String>, recalled: Vec<String>) -> MemorySummary {
    let mut sections = Vec::new();
    if let Some(digest) = log_digest {
        sections.push(digest);
    }
    if !recalled.is_empty() {
        sections.push(format!(
            "Recalled: {}",
            truncate_preview(&recalled.join(" | "), RECALL_PREVIEW_CHARS)
        ));
    }
    MemorySummary {
        text: sections.join(" | "),
        recalled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::Channel;

    #[test]
    fn tags_include_tone_band_and_dominant_channels() {
        let emotion = EmotionState::from_pairs([(Channel::Calm, 0.5), (Channel::Joy, 0.2)]);
        assert_eq!(
            derive_tags(Tone::Calm, 0.9, &emotion),
            vec!["calm", "balanced"]
        );
        assert_eq!(
            derive_tags(Tone::Neutral, 0.1, &emotion),
            vec!["neutral", "recalibrating", "calm"]
        );
        assert_eq!(derive_tags(Tone::Neutral, 0.5, &EmotionState::zero()), vec!["neutral"]);
    }

    #[test]
    fn summary_joins_sections() {
        let s = compose_summary(Some("Recent reflections: a".into()), vec!["walked home".into()]);
        assert_eq!(s.text, "Recent reflections: a | Recalled: walked home");
        assert_eq!(s.recalled, vec!["walked home"]);

        let s = compose_summary(None, vec![]);
        assert!(s.text.is_empty());
    }

    #[test]
    fn long_recall_is_previewed() {
        let long = "x".repeat(80);
        let s = compose_summary(None, vec![long.clone()]);
        assert_eq!(s.text, format!("Recalled: {}...", &long[..RECALL_PREVIEW_CHARS]));
        assert_eq!(s.recalled[0].len(), 80);
    }
}
