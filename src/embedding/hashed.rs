//! Deterministic pseudo-embeddings.
//!
//! Each token seeds a random generator through a stable FNV-1a hash and
//! contributes a fixed pseudo-random direction; the sum is L2-normalized.
//! Texts sharing words land near each other, and the same text always maps to
//! the same vector within a build.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};

/// Identifier stored with vectors produced by this provider.
pub const HASHED_MODEL_NAME: &str = "hashed-384";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Fallback provider that needs no model files and never fails.
#[derive(Debug, Clone, Default)]
pub struct HashedEmbeddingProvider;

impl HashedEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut sum = vec![0.0f32; EMBEDDING_DIM];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut rng = StdRng::seed_from_u64(fnv1a(&token.to_lowercase()));
            for slot in sum.iter_mut() {
                *slot += rng.random_range(-1.0f32..1.0);
            }
        }
        Ok(l2_normalize(&sum))
    }

    fn name(&self) -> &str {
        HASHED_MODEL_NAME
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}
