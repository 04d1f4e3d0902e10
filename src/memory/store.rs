//! Long-term memory: write path, vector retrieval, and listing.
//!
//! [`LongTermMemory`] owns the SQLite connection and the embedding providers.
//! Writes never fail for embedding reasons: when the primary provider errors,
//! times out, or returns the wrong width, the hashed provider stands in and
//! the record is tagged with its name. Retrieval has no such fallback, since
//! a hashed query against model vectors would return noise.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::NamoConfig;
use crate::db::migrations::set_embedding_model;
use crate::embedding::hashed::HashedEmbeddingProvider;
use crate::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use crate::emotion::EmotionState;
use crate::error::PipelineError;
use crate::memory::ranker::RetrievalRanker;
use crate::memory::stats::{memory_stats, MemoryStats};
use crate::memory::types::{MemoryRecord, RankedMemory};
use crate::memory::{bytes_to_embedding, embedding_to_bytes};

/// Channels above this value are listed in a record's metadata.
const DOMINANT_THRESHOLD: f64 = 0.4;

pub struct LongTermMemory {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    fallback: HashedEmbeddingProvider,
    ranker: RetrievalRanker,
    embed_timeout: Duration,
    candidate_pool: usize,
    db_path: Option<PathBuf>,
}

impl LongTermMemory {
    /// Open the database at the configured path.
    pub fn open(config: &NamoConfig, embedder: Arc<dyn EmbeddingProvider>) -> anyhow::Result<Self> {
        let path = config.resolved_db_path();
        let conn = crate::db::open_database(&path)?;
        let mut memory = Self::new(conn, embedder, config);
        memory.db_path = Some(path);
        Ok(memory)
    }

    pub fn new(conn: Connection, embedder: Arc<dyn EmbeddingProvider>, config: &NamoConfig) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
            fallback: HashedEmbeddingProvider::new(),
            ranker: RetrievalRanker::new(&config.retrieval),
            embed_timeout: Duration::from_millis(config.embedding.timeout_ms),
            candidate_pool: config.retrieval.candidate_pool,
            db_path: None,
        }
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Store `text` with the given emotion snapshot, timestamped now. Returns the record id.
    pub async fn store_memory(&self, text: &str, emotion: &EmotionState) -> Result<String, PipelineError> {
        self.store_memory_at(text, emotion, Utc::now()).await
    }

    /// Store `text` with an explicit creation time.
    pub async fn store_memory_at(
        &self,
        text: &str,
        emotion: &EmotionState,
        at: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        let (embedding, source, from_primary) = match self.embed_primary(text).await {
            Ok(v) => (v, self.embedder.name().to_string(), true),
            Err(e) => {
                tracing::warn!(error = %e, "primary embedding failed, storing hashed pseudo-embedding");
                let v = self
                    .fallback
                    .embed(text)
                    .map_err(|e| PipelineError::backend("embedding", e))?;
                (v, self.fallback.name().to_string(), false)
            }
        };

        let dominant: Vec<&str> = emotion
            .dominant(DOMINANT_THRESHOLD)
            .iter()
            .map(|c| c.as_str())
            .collect();
        let row = NewMemory {
            id: uuid::Uuid::now_v7().to_string(),
            document: text.to_string(),
            intensity: emotional_intensity(emotion),
            created_at: at.to_rfc3339(),
            emotion_json: serde_json::to_string(emotion)?,
            embedding_source: source,
            from_primary,
            metadata: serde_json::json!({ "dominant": dominant }).to_string(),
            embedding,
        };

        let id = self
            .with_conn(move |conn| {
                insert_memory(conn, &row)?;
                Ok(row.id)
            })
            .await?;
        tracing::debug!(id = %id, "memory stored");
        Ok(id)
    }

    /// Nearest candidates to `query`, re-ranked by recency and intensity, at most `k`.
    ///
    /// Unlike [`retrieve_context`](Self::retrieve_context) this surfaces failures,
    /// so callers can tell an empty store from an unavailable one.
    pub async fn retrieve_ranked(&self, query: &str, k: usize) -> Result<Vec<RankedMemory>, PipelineError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_primary(query).await?;
        let pool = k.max(self.candidate_pool);
        let candidates = self
            .with_conn(move |conn| nearest_records(conn, &query_vec, pool))
            .await?;

        let mut ranked = self.ranker.rank(candidates, Utc::now());
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Contents of the top-`k` memories for `query`. Any failure yields an empty list.
    pub async fn retrieve_context(&self, query: &str, current_emotion: &EmotionState, k: usize) -> Vec<String> {
        match self.retrieve_ranked(query, k).await {
            Ok(ranked) => {
                tracing::debug!(
                    recalled = ranked.len(),
                    current_intensity = current_emotion.intensity(),
                    "context retrieved"
                );
                ranked.into_iter().map(|r| r.record.content).collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "context retrieval failed");
                Vec::new()
            }
        }
    }

    /// Most recent records first, without embeddings.
    pub async fn recent_records(&self, limit: usize) -> Result<Vec<MemoryRecord>, PipelineError> {
        self.with_conn(move |conn| recent_records(conn, limit)).await
    }

    pub async fn stats(&self) -> Result<MemoryStats, PipelineError> {
        let db_path = self.db_path.clone();
        self.with_conn(move |conn| {
            memory_stats(conn, db_path.as_deref())
                .map_err(|e| PipelineError::Persistence(format!("{e:#}")))
        })
        .await
    }

    async fn embed_primary(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let embedder = Arc::clone(&self.embedder);
        let owned = text.to_string();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&owned));

        let vector = match tokio::time::timeout(self.embed_timeout, task).await {
            Err(_) => {
                return Err(PipelineError::backend(
                    "embedding",
                    format!("timed out after {}ms", self.embed_timeout.as_millis()),
                ))
            }
            Ok(Err(join)) => return Err(PipelineError::backend("embedding", join)),
            Ok(Ok(Err(e))) => return Err(PipelineError::backend("embedding", format!("{e:#}"))),
            Ok(Ok(Ok(v))) => v,
        };

        if vector.len() != EMBEDDING_DIM {
            return Err(PipelineError::backend(
                "embedding",
                format!("expected {EMBEDDING_DIM} dimensions, got {}", vector.len()),
            ));
        }
        Ok(vector)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, PipelineError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| PipelineError::Persistence("database lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| PipelineError::backend("memory store", e))?
    }
}

/// Strongest channel of the snapshot, 0.0 for an all-zero state.
pub fn emotional_intensity(emotion: &EmotionState) -> f64 {
    emotion.intensity()
}

struct NewMemory {
    id: String,
    document: String,
    intensity: f64,
    created_at: String,
    emotion_json: String,
    embedding_source: String,
    /// Fallback vectors leave `schema_meta.embedding_model` untouched.
    from_primary: bool,
    metadata: String,
    embedding: Vec<f32>,
}

fn insert_memory(conn: &mut Connection, row: &NewMemory) -> Result<(), PipelineError> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, document, intensity, created_at, emotion_json, embedding_source, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            row.document,
            row.intensity,
            row.created_at,
            row.emotion_json,
            row.embedding_source,
            row.metadata,
        ],
    )?;
    tx.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
        params![row.id, embedding_to_bytes(&row.embedding)],
    )?;
    if row.from_primary {
        set_embedding_model(&tx, &row.embedding_source)?;
    }
    tx.commit()?;
    Ok(())
}

const RECORD_COLUMNS: &str =
    "id, document, intensity, created_at, emotion_json, embedding_source, metadata";

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let emotion_json: String = row.get(4)?;
    let metadata: Option<String> = row.get(6)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding: Vec::new(),
        emotional_intensity: row.get(2)?,
        timestamp: row.get(3)?,
        emotion: serde_json::from_str(&emotion_json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable emotion snapshot, using zero state");
            EmotionState::zero()
        }),
        embedding_source: row.get(5)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

/// KNN over `memories_vec`, joined back to full records with their vectors.
fn nearest_records(
    conn: &mut Connection,
    query: &[f32],
    limit: usize,
) -> Result<Vec<(MemoryRecord, f64)>, PipelineError> {
    let mut knn = conn.prepare(
        "SELECT id, distance, embedding FROM memories_vec WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let hits: Vec<(String, f64, Vec<u8>)> = knn
        .query_map(params![embedding_to_bytes(query), limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut lookup = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1"))?;
    let mut out = Vec::with_capacity(hits.len());
    for (id, distance, blob) in hits {
        // A vector without its row only happens after manual tampering; skip it.
        if let Some(mut record) = lookup.query_row(params![id], row_to_record).optional()? {
            record.embedding = bytes_to_embedding(&blob);
            out.push((record, distance));
        }
    }
    Ok(out)
}

fn recent_records(conn: &mut Connection, limit: usize) -> Result<Vec<MemoryRecord>, PipelineError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM memories ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let records = stmt
        .query_map(params![limit as i64], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
