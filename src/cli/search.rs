use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::OwnerType;

/// Run a text search from the terminal.
pub fn search(
    config: &MnemoConfig,
    user_id: &str,
    owner_type: OwnerType,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    let engine = super::open_engine(config)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);

    let results = engine.search_text(user_id, owner_type, query, limit)?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let entry = &result.entry;
        println!(
            "  {}. [{}] {} (importance: {:.2}, score: {:.4})",
            i + 1,
            entry.id,
            super::preview(&entry.content, 120),
            entry.importance,
            result.score,
        );
        if !entry.tags.is_empty() {
            let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
            println!("     tags: {}", tags.join(", "));
        }
    }

    Ok(())
}
