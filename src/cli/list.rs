use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::OwnerType;

/// Print every entry of a partition in id order.
pub fn list(config: &MnemoConfig, user_id: &str, owner_type: OwnerType) -> Result<()> {
    let engine = super::open_engine(config)?;
    let entries = engine.list_all(user_id, owner_type)?;

    if entries.is_empty() {
        println!("No memories for {user_id} ({owner_type}).");
        return Ok(());
    }

    println!("{} memories for {user_id} ({owner_type})\n", entries.len());
    println!(
        "  {:>6}  {:>5}  {:<20}  {}",
        "ID", "IMP", "LAST USED", "CONTENT"
    );
    for entry in &entries {
        println!(
            "  {:>6}  {:>5.2}  {:<20}  {}",
            entry.id,
            entry.importance,
            entry.last_used_at.format("%Y-%m-%d %H:%M:%S"),
            super::preview(&entry.content, 80),
        );
    }

    Ok(())
}
