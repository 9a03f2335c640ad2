use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::events::EventPayload;
use mnemo::memory::types::OwnerType;

/// Print the latest maintenance events for a partition, oldest first.
pub fn events(
    config: &MnemoConfig,
    user_id: &str,
    owner_type: OwnerType,
    limit: Option<usize>,
) -> Result<()> {
    let engine = super::open_engine(config)?;
    let events = engine.list_events(user_id, owner_type, limit)?;

    if events.is_empty() {
        println!("No maintenance events for {user_id} ({owner_type}).");
        return Ok(());
    }

    for event in &events {
        let detail = match &event.payload {
            EventPayload::PruneTotal { dropped } => format!("dropped {dropped:?}"),
            EventPayload::PruneTag { tag, dropped } => format!("tag {tag}: dropped {dropped:?}"),
            EventPayload::Merged {
                dropped,
                similarity,
            } => format!(
                "kept {} dropped {dropped} (similarity {similarity:.3})",
                event.memory_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
            ),
        };
        println!(
            "  {}  {:<12} {detail}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
        );
    }

    Ok(())
}
