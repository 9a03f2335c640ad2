use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::OwnerType;

/// Display per-partition statistics for one user.
pub fn stats(config: &MnemoConfig, user_id: &str) -> Result<()> {
    let engine = super::open_engine(config)?;
    let partitions = engine.partition_stats(user_id)?;
    let retention = engine.retention();

    println!("Memory Statistics for {user_id}");
    println!("{}", "=".repeat(40));

    for partition in &partitions {
        let cap = match partition.owner_type {
            OwnerType::User => retention.total_cap_user,
            OwnerType::Assistant => retention.total_cap_assistant,
        };
        println!();
        println!("[{}]", partition.owner_type);
        println!("  Memories:          {} / {cap}", partition.memories);
        println!("  Events:            {}", partition.events);
        if let Some(mean) = partition.mean_importance {
            println!("  Mean importance:   {mean:.3}");
        }
        if let Some(oldest) = partition.oldest {
            println!("  Oldest memory:     {oldest}");
        }
        if let Some(newest) = partition.newest {
            println!("  Newest memory:     {newest}");
        }
        if !partition.by_tag.is_empty() {
            println!("  By tag:");
            for (tag, count) in &partition.by_tag {
                match retention.tag_caps.get(tag) {
                    Some(cap) => println!("    {tag:<14} {count} / {cap}"),
                    None => println!("    {tag:<14} {count}"),
                }
            }
        }
    }

    Ok(())
}
