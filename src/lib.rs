//! Safety-gated, emotion-weighted reflective companion.
//!
//! Each user turn passes through a fixed pipeline:
//!
//! | Stage | Module | Failure fallback |
//! |-------|--------|------------------|
//! | Screen | [`safety`] | built-in threat patterns |
//! | Emotion update | [`emotion`] | none needed (pure arithmetic) |
//! | Memory write | [`memory::store`] | hashed pseudo-embedding |
//! | Memory recall | [`memory::store`] + [`memory::ranker`] | empty context |
//! | Reply | [`reflection`] | empty neutral reply |
//! | Interaction log | [`memory::log`] | turn continues unlogged |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for vector search, plus a bounded JSON interaction log
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions),
//!   falling back to deterministic hashed vectors
//! - **Ranking**: nearest neighbours re-ranked by `intensity / φ^(age_days)`
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: text-to-vector providers
//! - [`emotion`]: five-channel emotion state and text cue analysis
//! - [`error`]: the pipeline error taxonomy
//! - [`memory`]: long-term store, ranker, interaction log
//! - [`orchestrator`]: the per-turn pipeline
//! - [`reflection`]: reply generation
//! - [`safety`]: threat screen and self-harm safeguard

pub mod config;
pub mod db;
pub mod embedding;
pub mod emotion;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod reflection;
pub mod safety;
