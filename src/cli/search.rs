use anyhow::Result;
use relfs::config::RelfsConfig;
use relfs::search::QueryMode;

/// Run a search from the terminal.
pub fn search(
    config: &RelfsConfig,
    terms: &[String],
    mode: QueryMode,
    limit: Option<usize>,
    relevant_only: bool,
) -> Result<()> {
    let engine = super::open_engine(config)?;

    let results = if relevant_only {
        engine.search_relevant(terms, mode, limit)?
    } else {
        engine.search(terms, mode, limit)?
    };

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score: {:.1})",
            i + 1,
            result.kind,
            result.title,
            result.score
        );
        println!("     ID: {}  Updated: {}", result.id, result.updated_at);
    }

    Ok(())
}
