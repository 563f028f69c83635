//! skirmish_init - One-time database initialization tool
//!
//! Creates a fresh combat database seeded with a roster of characters and enemies.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use skirmish::init::{init_database, Roster};
use skirmish::Config;

/// Skirmish database initialization tool
#[derive(Parser, Debug)]
#[command(
    name = "skirmish_init",
    version,
    about = "Initialize a new skirmish database"
)]
struct Args {
    /// Path to SQLite database file to create (must not exist)
    #[arg(short, long)]
    database: PathBuf,

    /// TOML roster with [[characters]] and [[enemies]] tables
    #[arg(short, long)]
    roster: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    skirmish::init_tracing(&config);

    // Parse CLI arguments
    let args = Args::parse();

    let roster = match &args.roster {
        Some(path) => Roster::from_file(path)?,
        None => Roster::default(),
    };

    init_database(&args.database, &roster).await?;

    Ok(())
}
