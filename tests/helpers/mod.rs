#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use namo::config::NamoConfig;
use namo::db;
use namo::embedding::hashed::HashedEmbeddingProvider;
use namo::embedding::EmbeddingProvider;
use namo::memory::log::InteractionLog;
use namo::memory::store::LongTermMemory;
use namo::orchestrator::ReflectionOrchestrator;
use namo::reflection::{Reflection, ReplyGenerator, ReplyRequest};
use rusqlite::Connection;
use tempfile::TempDir;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[seed as usize % 384] = 1.0;
    v
}

/// Config whose every path lives under `dir`, using hashed embeddings.
pub fn test_config(dir: &TempDir) -> NamoConfig {
    let mut config = NamoConfig::default();
    config.memory.db_path = dir.path().join("memory.db").to_string_lossy().into_owned();
    config.memory.log_path = dir.path().join("memory_log.json").to_string_lossy().into_owned();
    config.memory.io_retries = 0;
    config.embedding.provider = "hashed".into();
    config.embedding.cache_dir = dir.path().join("models").to_string_lossy().into_owned();
    config
}

/// Embedder that always errors, standing in for a missing model or dead service.
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow!("embedding service unreachable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Reply generator that always errors.
pub struct FailingReply;

impl ReplyGenerator for FailingReply {
    fn generate(&self, _request: &ReplyRequest) -> anyhow::Result<Reflection> {
        Err(anyhow!("language model offline"))
    }
}

/// Reply generator that sleeps past any reasonable timeout.
pub struct SlowReply(pub Duration);

impl ReplyGenerator for SlowReply {
    fn generate(&self, request: &ReplyRequest) -> anyhow::Result<Reflection> {
        std::thread::sleep(self.0);
        namo::reflection::ReflectionComposer.generate(request)
    }
}

/// Orchestrator over an in-memory database and a log file in `dir`.
pub fn orchestrator_with(
    dir: &TempDir,
    config: &NamoConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> ReflectionOrchestrator {
    let memory = LongTermMemory::new(db::open_in_memory().unwrap(), embedder, config);
    let log = InteractionLog::open(dir.path().join("memory_log.json"), config.memory.max_entries, 0)
        .unwrap();
    ReflectionOrchestrator::new(config, Some(memory), log)
}

pub fn test_orchestrator(dir: &TempDir) -> ReflectionOrchestrator {
    orchestrator_with(dir, &test_config(dir), Arc::new(HashedEmbeddingProvider::new()))
}
