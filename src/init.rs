//! Database initialization module
//!
//! Provides one-time database setup for the skirmish_init tool: create the
//! database file and seed it with characters and enemies from a roster file.

use std::path::Path;

use anyhow::{bail, Result};
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combat::CombatantSnapshot;
use crate::db::Database;

/// Characters and enemies to seed a database with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub characters: Vec<CombatantSnapshot>,
    pub enemies: Vec<CombatantSnapshot>,
}

impl Roster {
    /// Read a TOML roster with `[[characters]]` and `[[enemies]]` tables
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Roster file not found: {}", path.display());
        }
        let roster: Roster = Figment::from(Toml::file(path)).extract()?;
        roster.validate()?;
        Ok(roster)
    }

    /// Reject entries that could never take part in combat
    pub fn validate(&self) -> Result<()> {
        for entry in self.characters.iter().chain(&self.enemies) {
            if let Err(e) = entry.validate() {
                bail!("'{}': {}", entry.id, e);
            }
        }
        Ok(())
    }
}

/// Initialize a new combat database
///
/// # Errors
/// * Database file already exists
/// * Roster entry is invalid
/// * Database creation fails
pub async fn init_database(path: &Path, roster: &Roster) -> Result<()> {
    // Fail if database already exists
    if path.exists() {
        bail!(
            "Database file already exists: {}. Remove it first or use a different path.",
            path.display()
        );
    }

    roster.validate()?;

    info!("Creating new database at {}", path.display());

    let Some(path_str) = path.to_str() else {
        bail!("Database path is not valid UTF-8: {}", path.display());
    };
    let db = Database::new(Some(path_str)).await?;
    let store = db.store();

    for character in &roster.characters {
        store.insert_character(character).await?;
        info!("  character {} ({})", character.name, character.id);
    }
    for enemy in &roster.enemies {
        store.insert_enemy(enemy).await?;
        info!("  enemy {} ({})", enemy.name, enemy.id);
    }

    info!(
        "Database initialization complete: {} characters, {} enemies",
        roster.characters.len(),
        roster.enemies.len()
    );
    Ok(())
}
