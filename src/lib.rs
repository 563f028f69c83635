//! skirmish - turn-based combat resolution engine
//!
//! Starts encounters from character and enemy snapshots, orders turns by
//! initiative, resolves attacks and damage, runs enemy AI, and ends the
//! fight when one side is out.

pub mod combat;
pub mod config;
pub mod db;
pub mod init;
pub mod simulation;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;

use combat::{CombatService, RandomDice};
use db::Database;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter.as_str().into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Open the configured database and build a service on top of it
pub async fn open_service(config: &Config) -> Result<(Arc<Database>, CombatService)> {
    let db = Arc::new(Database::new(config.db_path.as_deref()).await?);
    let store = Arc::new(db.store());
    let service = CombatService::new(
        Arc::new(RandomDice::new()),
        store.clone(),
        store.clone(),
        store,
    )
    .with_recent_log_entries(config.recent_log_entries);
    Ok((db, service))
}
