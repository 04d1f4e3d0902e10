//! Text-to-vector embedding capability.
//!
//! Provides the [`EmbeddingProvider`] trait with two implementations: the
//! ONNX-backed [`local::LocalEmbeddingProvider`] and the deterministic
//! [`hashed::HashedEmbeddingProvider`]. [`resolve_provider`] picks one at
//! construction time and always returns something usable.

pub mod hashed;
pub mod local;

use std::sync::Arc;

use anyhow::Result;

use crate::config::EmbeddingConfig;

/// Number of dimensions in every stored vector (all-MiniLM-L6-v2 width).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EMBEDDING_DIM`] dimensions.
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Identifier recorded alongside every vector this provider produces.
    fn name(&self) -> &str;
}

/// Create the configured embedding provider.
///
/// `"local"` loads the ONNX model and fails if the model files are missing;
/// `"hashed"` never fails.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalEmbeddingProvider::new(config)?)),
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new())),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, hashed"),
    }
}

/// Create the configured provider, or the hashed fallback if it cannot be loaded.
pub fn resolve_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match create_provider(config) {
        Ok(provider) => {
            tracing::info!(provider = provider.name(), "embedding provider ready");
            Arc::from(provider)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                configured = %config.provider,
                "embedding provider unavailable, using hashed pseudo-embeddings"
            );
            Arc::new(hashed::HashedEmbeddingProvider::new())
        }
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
