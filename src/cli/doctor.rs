//! CLI `doctor` command: database diagnostics, embedding and policy status.

use anyhow::{Context, Result};

use namo::config::NamoConfig;
use namo::db;
use namo::embedding::resolve_provider;
use namo::memory::stats::memory_stats;
use namo::safety::ThreatScreen;

/// Run diagnostics and print a health report.
pub fn doctor(config: &NamoConfig) -> Result<()> {
    println!("Namo Health Report");
    println!("==================");
    println!();
    println!("Features:          safety={} memory={}", config.features.enable_safety, config.features.enable_memory);

    let screen = ThreatScreen::new(&config.safety);
    let policy = if screen.uses_builtin() { "built-in" } else { "policy file" };
    println!("Threat patterns:   {} ({policy})", screen.pattern_count());

    let embedder = resolve_provider(&config.embedding);
    println!("Embedding:         {} (configured: {})", embedder.name(), config.embedding.provider);
    println!("Interaction log:   {}", config.resolved_log_path().display());
    println!();

    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It will be created on the first `namo chat` or `namo submit`.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;
    let stats = memory_stats(&conn, None).context("failed to count memories")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Last stored:     {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Active:          {}", embedder.name());
    for (source, count) in &stats.by_embedding_source {
        println!("  {source:<16} {count} vector(s)");
    }
    if let Some(ref stored) = report.embedding_model {
        if stored != embedder.name() {
            println!("  WARNING: vectors from different models are not comparable; recall quality may drop.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Vectors:         {}", report.vector_count);
    if report.memory_count != report.vector_count {
        println!("  WARNING: memory and vector counts differ.");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore {} from a backup, or move it aside to start fresh.", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
