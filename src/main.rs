//! # TB - Taskboard CLI
//!
//! A file-backed task tracker with hierarchical work items (tasks, epics and
//! their subtasks), a conflict-checked schedule, and a history of recently
//! viewed items.
//!
//! ## Key Features
//!
//! - **Derived Epic State**: An epic's status and time window are computed
//! from its subtasks after every change; they never drift.
//! - **Schedule Conflict Detection**: Adding or moving a scheduled item that
//! overlaps an existing one is rejected outright.
//! - **View History**: Every viewed item is remembered once, most recent
//! last.
//! - **Multiple Interfaces**: Full CLI for day-to-day use + a JSON REST API
//! (`tb serve`) for integrations.
//! - **Simple Storage**: A single local CSV file, or a remote key-value
//! server via `tb serve --kv-url`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Add an epic, then subtasks under it
//! tb add "User management" --kind epic
//! tb add "Registration form" --kind subtask --epic 1 \
//!     --start "2024-03-11 09:00" --duration 90
//!
//! # See what's next
//! tb schedule
//!
//! # Serve the REST API
//! tb serve --addr 127.0.0.1:8080
//! ```
//!
//! Data is stored locally in `~/.taskboard/board.csv` unless `--db` points
//! elsewhere.

use std::path::PathBuf;

use clap::Parser;

pub mod cli;
pub mod cmd;
pub mod error;
pub mod fields;
pub mod history;
pub mod kv;
pub mod repo;
pub mod server;
pub mod store;
pub mod task;

use cli::Cli;
use cmd::*;
use kv::KvStore;
use repo::TaskRepository;
use store::{CsvStore, SnapshotStore};

fn main() {
    let cli = Cli::parse();

    // Completions need no storage at all.
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    // Determine the snapshot file.
    let db_path = cli.db.clone().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let dir = PathBuf::from(home).join(".taskboard");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("failed to create taskboard directory {}: {}", dir.display(), e);
            std::process::exit(1);
        }
        dir.join("board.csv")
    });

    // The server owns tracing setup and may persist to a KV server instead.
    if let Commands::Serve { addr, kv_url } = &cli.command {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
        let store: Box<dyn SnapshotStore> = match kv_url {
            Some(url) => match KvStore::connect(url) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    eprintln!("failed to reach kv server: {e}");
                    std::process::exit(1);
                }
            },
            None => Box::new(CsvStore::new(&db_path)),
        };
        cmd_serve(load_repo(store), addr);
        return;
    }

    let mut repo = load_repo(Box::new(CsvStore::new(&db_path)));

    match cli.command {
        Commands::Add { name, desc, kind, status, start, duration, epic } =>
            cmd_add(&mut repo, name, desc, kind, status, start, duration, epic),

        Commands::List { kind } => cmd_list(&repo, kind),

        Commands::View { id } => cmd_view(&mut repo, id),

        Commands::Update { id, name, desc, status, start, clear_start, duration, epic } =>
            cmd_update(&mut repo, id, name, desc, status, start, clear_start, duration, epic),

        Commands::Done { id } => cmd_done(&mut repo, id),

        Commands::Delete { id } => cmd_delete(&mut repo, id),

        Commands::History => cmd_history(&repo),

        Commands::Schedule => cmd_schedule(&repo),

        Commands::Clear { kind } => cmd_clear(&mut repo, kind),

        Commands::Serve { .. } => unreachable!("serve handled above"),
        Commands::Completions { .. } => unreachable!("completions handled above"),
    }
}

fn load_repo(store: Box<dyn SnapshotStore>) -> TaskRepository {
    match TaskRepository::with_store(store) {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("failed to load snapshot: {e}");
            std::process::exit(1);
        }
    }
}
