//! skirmish - play out an encounter against a seeded database

use anyhow::{bail, Result};
use clap::Parser;
use skirmish::{simulation, Config};

/// Run a simulated combat encounter
#[derive(Parser, Debug)]
#[command(name = "skirmish", version, about = "Simulate a turn-based combat encounter")]
struct Args {
    /// SQLite database created by skirmish_init (overrides config)
    #[arg(short, long)]
    database: Option<String>,

    /// Adventure the encounter belongs to
    #[arg(long, default_value = "sandbox")]
    adventure: String,

    /// Character id (can be specified multiple times)
    #[arg(long = "character", required = true)]
    characters: Vec<String>,

    /// Enemy id (can be specified multiple times)
    #[arg(long = "enemy", required = true)]
    enemies: Vec<String>,

    /// Round limit (overrides config)
    #[arg(long)]
    max_rounds: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(database) = args.database {
        config.db_path = Some(database);
    }
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }

    skirmish::init_tracing(&config);

    if config.db_path.is_none() {
        bail!("No database configured; pass --database or set SKIRMISH_DB_PATH");
    }

    let (_db, service) = skirmish::open_service(&config).await?;
    let report = simulation::run_simulation(
        &service,
        &args.adventure,
        &args.characters,
        &args.enemies,
        config.max_rounds,
    )
    .await?;

    for entry in &report.log {
        println!("[round {:>3}] {}", entry.round, entry.description);
    }
    match report.winner {
        Some(winner) => println!("Combat {} won by {} after {} rounds", report.combat_id, winner, report.rounds),
        None => println!("Combat {} stopped after {} rounds with no winner", report.combat_id, report.rounds),
    }

    let status = service.get_combat_status(&report.combat_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
