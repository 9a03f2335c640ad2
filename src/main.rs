mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo::config::MnemoConfig;
use mnemo::memory::types::OwnerType;

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Long-term memory engine for personal assistants")]
struct Cli {
    /// Config file (defaults to ~/.mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed and store a memory
    Add {
        #[arg(long)]
        user: String,
        /// `user` or `assistant`
        #[arg(long, default_value = "user")]
        owner: OwnerType,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
        #[arg(long, default_value_t = 0.5)]
        plasticity: f64,
        content: String,
    },
    /// Search a partition by text
    Search {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "user")]
        owner: OwnerType,
        #[arg(long)]
        limit: Option<usize>,
        query: String,
    },
    /// List every memory in a partition
    List {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "user")]
        owner: OwnerType,
    },
    /// Adjust a memory's importance by a signed amount
    Boost {
        id: i64,
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
    /// Run decay, cap eviction and merge (all three unless some are selected)
    Maintain {
        #[arg(long)]
        user: String,
        /// Restrict decay and merge to one owner type
        #[arg(long)]
        owner: Option<OwnerType>,
        #[arg(long)]
        decay: bool,
        #[arg(long)]
        prune: bool,
        #[arg(long)]
        merge: bool,
    },
    /// Show the maintenance event log
    Events {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "user")]
        owner: OwnerType,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Per-partition statistics for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Check database health
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MnemoConfig::load_from(path)?,
        None => MnemoConfig::load()?,
    };

    // Log to stderr so stdout carries only the report.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Add {
            user,
            owner,
            tags,
            importance,
            plasticity,
            content,
        } => cli::add::add(&config, &user, owner, &content, &tags, importance, plasticity)?,
        Command::Search {
            user,
            owner,
            limit,
            query,
        } => cli::search::search(&config, &user, owner, &query, limit)?,
        Command::List { user, owner } => cli::list::list(&config, &user, owner)?,
        Command::Boost { id, amount } => cli::add::boost(&config, id, amount)?,
        Command::Maintain {
            user,
            owner,
            decay,
            prune,
            merge,
        } => {
            let passes = cli::maintenance::Passes {
                decay,
                prune,
                merge,
            };
            cli::maintenance::maintain(&config, &user, owner, passes)?
        }
        Command::Events { user, owner, limit } => {
            cli::events::events(&config, &user, owner, limit)?
        }
        Command::Stats { user } => cli::stats::stats(&config, &user)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
