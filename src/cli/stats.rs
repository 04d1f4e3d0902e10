use anyhow::Result;

use namo::config::NamoConfig;

/// Display memory statistics in the terminal.
pub fn stats(config: &NamoConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = namo::db::open_database(&db_path)?;

    let response = namo::memory::stats::memory_stats(&conn, Some(&db_path))?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", response.total_memories);
    if let Some(mean) = response.mean_intensity {
        println!("  Mean intensity:      {mean:.3}");
    }
    if let Some(max) = response.max_intensity {
        println!("  Max intensity:       {max:.3}");
    }
    println!();

    println!("By embedding source:");
    if response.by_embedding_source.is_empty() {
        println!("  (none)");
    }
    for (source, count) in &response.by_embedding_source {
        println!("  {:<20} {}", source, count);
    }
    println!();

    println!("Database size:         {} bytes", response.db_size_bytes);

    if let Some(ref oldest) = response.oldest_memory {
        println!("Oldest memory:         {oldest}");
    }
    if let Some(ref newest) = response.newest_memory {
        println!("Newest memory:         {newest}");
    }

    Ok(())
}
