use anyhow::Result;
use relfs::config::RelfsConfig;

use super::format_bytes;

/// Display relation store statistics in the terminal.
pub fn stats(config: &RelfsConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let response = engine.stats()?;

    println!("Relation Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total relations:     {}", response.total_relations);
    println!("  Active:              {}", response.active_relations);
    println!("  Deleted:             {}", response.deleted_relations);
    println!("  Auto-spawned:        {}", response.auto_spawned_relations);
    println!();

    println!("By Type:");
    for (ty, count) in &response.by_type {
        println!("  {:<14} {}", ty, count);
    }
    println!();

    println!("Path bindings:         {}", response.path_bindings);
    println!("Search documents:      {}", response.search_documents);
    println!("Audit log entries:     {}", response.log_entries);
    println!(
        "Content objects:       {} ({})",
        response.content_objects,
        format_bytes(response.content_bytes)
    );
    println!("Database size:         {}", format_bytes(response.db_size_bytes));

    if let Some(ref oldest) = response.oldest_relation {
        println!("Oldest relation:       {oldest}");
    }
    if let Some(ref newest) = response.newest_relation {
        println!("Newest relation:       {newest}");
    }

    Ok(())
}
