use anyhow::Result;
use relfs::config::RelfsConfig;

/// Rebuild the path and search indexes and report what they hold.
///
/// The indexes live in memory, so this mainly verifies that every stored
/// relation replays cleanly; a running server rebuilds on its own at startup.
pub fn rebuild_index(config: &RelfsConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let report = engine.rebuild_index()?;

    println!("Rebuilt indexes from {} relation(s)", report.relations);
    println!("  Path bindings:       {}", report.path_bindings);
    println!("  Search documents:    {}", report.search_documents);
    Ok(())
}
