//! # sync-cli
//!
//! CLI tool for inspecting and driving the offline mutation queue.
//!
//! ## Commands
//!
//! - `queue`: Record a mutation while offline
//! - `pending`: List operations waiting for replay
//! - `dedup`: Collapse the queue to the latest operation per entity
//! - `status`: Show queue and conflict counts
//! - `conflicts`: List unresolved conflicts
//! - `resolve`: Resolve a conflict with a strategy or a chosen payload
//! - `clear`: Drop synced operations or wipe the store
//! - `detect`: Compare two snapshots without touching the store
//!
//! ## Example
//!
//! ```bash
//! sync-cli queue update task t1 --data '{"title": "Buy milk"}'
//! sync-cli pending
//! sync-cli dedup
//! sync-cli conflicts
//! sync-cli resolve <conflict-id> --strategy MERGE
//! sync-cli detect local.json server.json --local-ts 100 --server-ts 200
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use sync_engine::SyncEngine;
use sync_types::{OperationKind, TimestampMillis};

mod commands;
mod config;

use commands::{clear, conflicts, dedup, detect, pending, queue, resolve, status};

/// CLI tool for the offline mutation queue.
#[derive(Parser, Debug)]
#[command(name = "sync-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the local store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User whose queue to operate on
    #[arg(long, short, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Op {
    Create,
    Update,
    Delete,
}

impl From<Op> for OperationKind {
    fn from(op: Op) -> Self {
        match op {
            Op::Create => OperationKind::Create,
            Op::Update => OperationKind::Update,
            Op::Delete => OperationKind::Delete,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a mutation in the offline queue
    Queue {
        /// Mutation kind
        #[arg(value_enum)]
        operation: Op,

        /// Entity type (e.g. task, habit)
        entity_type: String,

        /// Entity id
        entity_id: String,

        /// Full entity snapshot as JSON
        #[arg(long, short, conflicts_with = "file")]
        data: Option<String>,

        /// Read the snapshot from a file
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Mutation time in epoch milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<TimestampMillis>,
    },

    /// List operations waiting for replay
    Pending {
        /// Only check this entity type (requires --entity-id)
        #[arg(long, requires = "entity_id")]
        entity_type: Option<String>,

        /// Only check this entity id
        #[arg(long, requires = "entity_type")]
        entity_id: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Collapse the queue to the latest operation per entity
    Dedup,

    /// Show queue and conflict status
    Status {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List unresolved conflicts
    Conflicts {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a conflict
    Resolve {
        /// Conflict id
        conflict_id: String,

        /// LOCAL_WINS, SERVER_WINS, LATEST_WINS, MERGE or MANUAL (default: automatic)
        #[arg(long, short)]
        strategy: Option<String>,

        /// Payload for MANUAL resolution
        #[arg(long, short, conflicts_with = "file")]
        data: Option<String>,

        /// Read the MANUAL payload from a file
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Drop synced operations, or wipe the whole store with --all
    Clear {
        /// Wipe every entity, operation and conflict
        #[arg(long)]
        all: bool,

        /// Confirm --all
        #[arg(long)]
        yes: bool,
    },

    /// Compare two JSON snapshots
    Detect {
        /// Local snapshot file
        local: PathBuf,

        /// Server snapshot file
        server: PathBuf,

        /// Local modification time
        #[arg(long, default_value = "0")]
        local_ts: TimestampMillis,

        /// Server modification time
        #[arg(long, default_value = "0")]
        server_ts: TimestampMillis,

        /// What the local side did
        #[arg(long, value_enum, default_value = "update")]
        local_op: Op,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let user = cli.user.as_str();

    match cli.command {
        Commands::Queue {
            operation,
            entity_type,
            entity_id,
            data,
            file,
            timestamp,
        } => {
            let (_, engine) = open(cli.data_dir).await?;
            let payload = config::load_payload(data.as_deref(), file.as_deref()).await?;
            queue::run(
                &engine,
                user,
                operation.into(),
                &entity_type,
                &entity_id,
                payload,
                timestamp,
            )
            .await?;
        }
        Commands::Pending {
            entity_type,
            entity_id,
            json,
        } => {
            let (_, engine) = open(cli.data_dir).await?;
            let entity = entity_type.as_deref().zip(entity_id.as_deref());
            pending::run(&engine, user, entity, json).await?;
        }
        Commands::Dedup => {
            let (_, engine) = open(cli.data_dir).await?;
            dedup::run(&engine, user).await?;
        }
        Commands::Status { json } => {
            let (data_dir, engine) = open(cli.data_dir).await?;
            status::run(&engine, &data_dir, user, json).await?;
        }
        Commands::Conflicts { json } => {
            let (_, engine) = open(cli.data_dir).await?;
            conflicts::run(&engine, user, json).await?;
        }
        Commands::Resolve {
            conflict_id,
            strategy,
            data,
            file,
        } => {
            let (_, engine) = open(cli.data_dir).await?;
            let payload = match (data.as_deref(), file.as_deref()) {
                (None, None) => None,
                (data, file) => Some(config::load_payload(data, file).await?),
            };
            resolve::run(&engine, user, &conflict_id, strategy.as_deref(), payload).await?;
        }
        Commands::Clear { all, yes } => {
            let (_, engine) = open(cli.data_dir).await?;
            let scope = if all {
                clear::Scope::All
            } else {
                clear::Scope::Synced
            };
            clear::run(&engine, user, scope, yes).await?;
        }
        Commands::Detect {
            local,
            server,
            local_ts,
            server_ts,
            local_op,
        } => {
            // Pure comparison, the store is never opened.
            let local = config::load_payload(None, Some(&local)).await?;
            let server = config::load_payload(None, Some(&server)).await?;
            detect::run(&local, &server, local_ts, server_ts, local_op.into())?;
        }
    }

    Ok(())
}

/// Resolve the data directory, create it, and open the engine there.
async fn open(data_dir: Option<PathBuf>) -> Result<(PathBuf, SyncEngine)> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let engine = config::open_engine(&data_dir).await?;
    Ok((data_dir, engine))
}

/// Get the default data directory for sync-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "offline-sync", "sync-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn queue_arguments_parse() {
        let cli = Cli::try_parse_from([
            "sync-cli", "--user", "alice", "queue", "update", "task", "t1", "--data", "{}",
        ])
        .unwrap();
        assert_eq!(cli.user, "alice");
        assert!(matches!(
            cli.command,
            Commands::Queue {
                operation: Op::Update,
                ..
            }
        ));
    }

    #[test]
    fn pending_entity_flags_come_together() {
        let result = Cli::try_parse_from(["sync-cli", "pending", "--entity-type", "task"]);
        assert!(result.is_err());
    }
}
