//! CLI `history` command: print the interaction log and recent memories.

use anyhow::Result;

use namo::memory::summary::summarize_reflections;
use namo::memory::truncate_preview;
use namo::orchestrator::ReflectionOrchestrator;

const PREVIEW_CHARS: usize = 80;

pub async fn history(orchestrator: &ReflectionOrchestrator, limit: usize) -> Result<()> {
    let entries = orchestrator.history()?;

    println!("Interaction log");
    println!("{}", "=".repeat(40));
    println!("{}", summarize_reflections(&entries));
    println!();
    let start = entries.len().saturating_sub(limit);
    for entry in &entries[start..] {
        println!(
            "  {}  {}",
            entry.timestamp,
            truncate_preview(&entry.reflection, PREVIEW_CHARS)
        );
    }

    let Some(memory) = orchestrator.memory() else {
        return Ok(());
    };
    println!();
    println!("Recent memories");
    println!("{}", "=".repeat(40));
    for record in memory.recent_records(limit).await? {
        println!(
            "  {}  [{:.2}] {}",
            record.timestamp,
            record.emotional_intensity,
            truncate_preview(&record.content, PREVIEW_CHARS)
        );
    }

    Ok(())
}
