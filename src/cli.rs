use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Simple, file-backed hierarchical task tracker.
/// Storage defaults to ~/.taskboard/board.csv or a path passed via --db.
#[derive(Parser)]
#[command(name = "tb", version, about = "Hierarchical task tracker CLI")]
pub struct Cli {
    /// Path to the CSV snapshot file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
