use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::{NewMemory, OwnerType};

/// Embed and store one memory, printing the new id.
pub fn add(
    config: &MnemoConfig,
    user_id: &str,
    owner_type: OwnerType,
    content: &str,
    tags: &[String],
    importance: f64,
    plasticity: f64,
) -> Result<()> {
    let engine = super::open_engine(config)?;

    let memory = NewMemory::new(user_id, owner_type, content)
        .tags(tags.iter().cloned())
        .importance(importance)
        .plasticity(plasticity);
    let id = engine.add_memory(memory)?;

    println!("Stored memory {id} for {user_id} ({owner_type}).");
    Ok(())
}

/// Adjust an entry's importance by `amount`.
pub fn boost(config: &MnemoConfig, id: i64, amount: f64) -> Result<()> {
    let engine = super::open_engine(config)?;

    match engine.boost_importance(id, amount)? {
        Some(importance) => println!("Memory {id} importance is now {importance:.3}."),
        None => println!("Memory {id} not found."),
    }
    Ok(())
}
