//! Database module - SQLite storage for rosters and encounters

mod store;
#[cfg(test)]
pub(crate) mod test_utils;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

pub use store::SqliteStore;

/// Pooled SQLite handle; migrations run on open
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to (creating if needed) the database at `path`
    ///
    /// `None` gives a private in-memory database.
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let conn_str = match path {
            Some(p) => format!("sqlite:{}?mode=rwc", p),
            None => "sqlite::memory:".to_string(),
        };

        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Open an existing database file
    pub async fn open(path: &str) -> Result<Self> {
        Self::new(Some(path)).await
    }

    /// Create roster and encounter tables
    async fn run_migrations(&self) -> Result<()> {
        info!("Migrating combat schema");

        for table in ["characters", "enemies"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    armor_value INTEGER NOT NULL,
                    current_health INTEGER NOT NULL,
                    max_health INTEGER NOT NULL CHECK (max_health > 0),
                    dexterity_modifier INTEGER NOT NULL DEFAULT 0,
                    attack_modifier INTEGER NOT NULL DEFAULT 0,
                    damage_expression TEXT NOT NULL,
                    damage_modifier INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        // Encounters are stored whole; status and version are lifted out
        // for queries and optimistic locking
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS combats (
                id TEXT PRIMARY KEY,
                adventure_id TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_combats_adventure ON combats(adventure_id)")
            .execute(&self.pool)
            .await?;

        info!("Combat schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store for characters, enemies and encounters backed by this database
    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
