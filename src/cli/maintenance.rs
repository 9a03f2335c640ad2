//! CLI `maintain` command: decay, cap eviction and merge for one user.

use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::OwnerType;

/// Which passes to run. All three when none is selected explicitly.
#[derive(Debug, Clone, Copy)]
pub struct Passes {
    pub decay: bool,
    pub prune: bool,
    pub merge: bool,
}

impl Passes {
    pub fn or_all(self) -> Self {
        if self.decay || self.prune || self.merge {
            self
        } else {
            Self {
                decay: true,
                prune: true,
                merge: true,
            }
        }
    }
}

/// Run the selected passes in order: decay, prune, merge.
///
/// `owner_type = None` covers both partitions.
pub fn maintain(
    config: &MnemoConfig,
    user_id: &str,
    owner_type: Option<OwnerType>,
    passes: Passes,
) -> Result<()> {
    let engine = super::open_engine(config)?;
    let passes = passes.or_all();
    let owners: Vec<OwnerType> = match owner_type {
        Some(owner) => vec![owner],
        None => OwnerType::ALL.to_vec(),
    };

    if passes.decay {
        println!("Applying importance decay...");
        for &owner in &owners {
            let report = engine.decay_importance(user_id, owner)?;
            println!(
                "  [{owner}] decayed {} of {} memories.",
                report.decayed, report.examined
            );
        }
    }

    if passes.prune {
        println!("Enforcing caps...");
        let report = engine.prune_caps(user_id)?;
        if report.batches.is_empty() {
            println!("  All partitions within caps.");
        }
        for batch in &report.batches {
            match &batch.tag {
                Some(tag) => println!(
                    "  [{}] tag {tag} over cap {}: evicted {}",
                    batch.owner_type,
                    batch.cap,
                    batch.dropped.len()
                ),
                None => println!(
                    "  [{}] total over cap {}: evicted {}",
                    batch.owner_type,
                    batch.cap,
                    batch.dropped.len()
                ),
            }
        }
    }

    if passes.merge {
        println!("Merging near-duplicates...");
        for &owner in &owners {
            let report = engine.merge_redundant(user_id, owner)?;
            if report.decisions.is_empty() {
                println!("  [{owner}] no redundant memories.");
            }
            for decision in &report.decisions {
                println!(
                    "  [{owner}] kept {} dropped {} (similarity {:.3})",
                    decision.kept, decision.dropped, decision.similarity
                );
            }
        }
    }

    println!("Maintenance complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_selects_every_pass() {
        let none = Passes {
            decay: false,
            prune: false,
            merge: false,
        };
        let all = none.or_all();
        assert!(all.decay && all.prune && all.merge);

        let only_merge = Passes {
            merge: true,
            ..none
        }
        .or_all();
        assert!(only_merge.merge && !only_merge.decay && !only_merge.prune);
    }
}
