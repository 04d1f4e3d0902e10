mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use namo::config::NamoConfig;
use namo::embedding::hashed::HashedEmbeddingProvider;
use namo::emotion::{Channel, EmotionState};
use namo::memory::store::LongTermMemory;

fn memory() -> LongTermMemory {
    LongTermMemory::new(
        helpers::test_db(),
        Arc::new(HashedEmbeddingProvider::new()),
        &NamoConfig::default(),
    )
}

fn with_intensity(value: f64) -> EmotionState {
    EmotionState::from_pairs([(Channel::Compassion, value)])
}

#[tokio::test]
async fn top_two_follow_decayed_intensity() {
    let memory = memory();
    let now = Utc::now();
    for (text, intensity, hours) in [
        ("evening by the sea", 0.9, 72),
        ("morning by the sea", 0.2, 48),
        ("noon by the sea", 0.5, 24),
    ] {
        memory
            .store_memory_at(text, &with_intensity(intensity), now - Duration::hours(hours))
            .await
            .unwrap();
    }

    let ranked = memory.retrieve_ranked("by the sea", 2).await.unwrap();

    let contents: Vec<&str> = ranked.iter().map(|r| r.record.content.as_str()).collect();
    assert_eq!(contents, vec!["noon by the sea", "evening by the sea"]);
    // 0.5 / φ ≈ 0.309, 0.9 / φ³ ≈ 0.212
    assert!((ranked[0].score - 0.309).abs() < 1e-3);
    assert!((ranked[1].score - 0.212).abs() < 1e-3);
}

#[tokio::test]
async fn retrieval_is_capped_at_k_even_with_larger_pool() {
    let memory = memory();
    for n in 0..8 {
        memory
            .store_memory(&format!("note number {n}"), &with_intensity(0.5))
            .await
            .unwrap();
    }
    assert_eq!(memory.retrieve_ranked("note", 3).await.unwrap().len(), 3);
    assert_eq!(memory.retrieve_ranked("note", 20).await.unwrap().len(), 8);
}

#[tokio::test]
async fn candidate_pool_limits_what_gets_ranked() {
    let mut config = NamoConfig::default();
    config.retrieval.candidate_pool = 1;
    let memory = LongTermMemory::new(
        helpers::test_db(),
        Arc::new(HashedEmbeddingProvider::new()),
        &config,
    );
    memory.store_memory("apples and pears", &with_intensity(0.1)).await.unwrap();
    memory.store_memory("quarterly tax deadline", &with_intensity(1.0)).await.unwrap();

    // Only the nearest neighbour enters ranking, even though the other scores higher.
    let ranked = memory.retrieve_ranked("apples and pears", 1).await.unwrap();
    assert_eq!(ranked[0].record.content, "apples and pears");
}

#[tokio::test]
async fn failing_embedder_returns_empty_context() {
    let memory = LongTermMemory::new(
        helpers::test_db(),
        Arc::new(helpers::FailingEmbedder),
        &NamoConfig::default(),
    );
    memory.store_memory("stored anyway", &with_intensity(0.5)).await.unwrap();
    let context = memory
        .retrieve_context("stored anyway", &EmotionState::default(), 3)
        .await;
    assert!(context.is_empty());
}

#[tokio::test]
async fn stats_reflect_stored_records() {
    let memory = memory();
    memory.store_memory("one", &with_intensity(0.2)).await.unwrap();
    memory.store_memory("two", &with_intensity(0.6)).await.unwrap();

    let stats = memory.stats().await.unwrap();
    assert_eq!(stats.total_memories, 2);
    assert!((stats.mean_intensity.unwrap() - 0.4).abs() < 1e-9);
    assert_eq!(stats.by_embedding_source["hashed-384"], 2);
    assert!(stats.oldest_memory.is_some());
}
