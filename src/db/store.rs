//! SQLite-backed character, enemy and encounter storage

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::combat::{
    CharacterSource, CombatEncounter, CombatError, CombatRepository, CombatantSnapshot,
    EnemySource,
};

/// Roster and combat storage with database backing
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: String,
    name: String,
    armor_value: i64,
    current_health: i64,
    max_health: i64,
    dexterity_modifier: i64,
    attack_modifier: i64,
    damage_expression: String,
    damage_modifier: i64,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<CombatantSnapshot, CombatError> {
        let narrow = |column: &str, value: i64| {
            i32::try_from(value).map_err(|_| {
                CombatError::Storage(format!("'{}': {} out of range: {}", self.id, column, value))
            })
        };

        Ok(CombatantSnapshot {
            armor_value: narrow("armor_value", self.armor_value)?,
            current_health: narrow("current_health", self.current_health)?,
            max_health: narrow("max_health", self.max_health)?,
            dexterity_modifier: narrow("dexterity_modifier", self.dexterity_modifier)?,
            attack_modifier: narrow("attack_modifier", self.attack_modifier)?,
            damage_modifier: narrow("damage_modifier", self.damage_modifier)?,
            id: self.id,
            name: self.name,
            damage_expression: self.damage_expression,
        })
    }
}

/// Which roster table a snapshot lives in
#[derive(Debug, Clone, Copy)]
enum Roster {
    Characters,
    Enemies,
}

impl Roster {
    fn table(self) -> &'static str {
        match self {
            Roster::Characters => "characters",
            Roster::Enemies => "enemies",
        }
    }
}

impl SqliteStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a character
    pub async fn insert_character(&self, snapshot: &CombatantSnapshot) -> Result<(), CombatError> {
        self.insert_snapshot(Roster::Characters, snapshot).await
    }

    /// Insert or replace an enemy
    pub async fn insert_enemy(&self, snapshot: &CombatantSnapshot) -> Result<(), CombatError> {
        self.insert_snapshot(Roster::Enemies, snapshot).await
    }

    async fn insert_snapshot(
        &self,
        roster: Roster,
        snapshot: &CombatantSnapshot,
    ) -> Result<(), CombatError> {
        sqlx::query(&format!(
            r#"
            INSERT OR REPLACE INTO {} (id, name, armor_value, current_health, max_health,
                dexterity_modifier, attack_modifier, damage_expression, damage_modifier)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            roster.table()
        ))
        .bind(&snapshot.id)
        .bind(&snapshot.name)
        .bind(snapshot.armor_value)
        .bind(snapshot.current_health)
        .bind(snapshot.max_health)
        .bind(snapshot.dexterity_modifier)
        .bind(snapshot.attack_modifier)
        .bind(&snapshot.damage_expression)
        .bind(snapshot.damage_modifier)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(
        &self,
        roster: Roster,
        id: &str,
    ) -> Result<Option<CombatantSnapshot>, CombatError> {
        let row: Option<SnapshotRow> = sqlx::query_as(&format!(
            r#"
            SELECT id, name, armor_value, current_health, max_health, dexterity_modifier,
                attack_modifier, damage_expression, damage_modifier
            FROM {} WHERE id = ?
            "#,
            roster.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }
}

#[async_trait]
impl CharacterSource for SqliteStore {
    async fn get_character(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError> {
        self.get_snapshot(Roster::Characters, id).await
    }
}

#[async_trait]
impl EnemySource for SqliteStore {
    async fn get_enemy(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError> {
        self.get_snapshot(Roster::Enemies, id).await
    }
}

#[async_trait]
impl CombatRepository for SqliteStore {
    async fn get_combat(&self, id: &str) -> Result<Option<CombatEncounter>, CombatError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT state FROM combats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((state,)) => Ok(Some(serde_json::from_str(&state)?)),
            None => Ok(None),
        }
    }

    async fn add_combat(&self, encounter: &CombatEncounter) -> Result<(), CombatError> {
        let state = serde_json::to_string(encounter)?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO combats (id, adventure_id, status, version, state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&encounter.id)
        .bind(&encounter.adventure_id)
        .bind(encounter.status().to_string())
        .bind(encounter.version as i64)
        .bind(&state)
        .bind(encounter.created_at.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_combat(&self, encounter: &mut CombatEncounter) -> Result<(), CombatError> {
        let expected = encounter.version;
        encounter.version = expected + 1;

        let result = match serde_json::to_string(encounter) {
            Ok(state) => sqlx::query(
                r#"
                UPDATE combats SET status = ?, version = ?, state = ?, updated_at = ?
                WHERE id = ? AND version = ?
                "#,
            )
            .bind(encounter.status().to_string())
            .bind(encounter.version as i64)
            .bind(&state)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(&encounter.id)
            .bind(expected as i64)
            .execute(&self.pool)
            .await
            .map_err(CombatError::from),
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            Ok(_) => {
                encounter.version = expected;
                let found: Option<(i64,)> =
                    sqlx::query_as("SELECT version FROM combats WHERE id = ?")
                        .bind(&encounter.id)
                        .fetch_optional(&self.pool)
                        .await?;
                match found {
                    Some((found,)) => Err(CombatError::Conflict {
                        combat_id: encounter.id.clone(),
                        expected_version: expected,
                        found_version: found as u64,
                    }),
                    None => Err(CombatError::not_found("combat", &encounter.id)),
                }
            }
            Err(err) => {
                encounter.version = expected;
                Err(err)
            }
        }
    }

    async fn list_by_adventure(&self, adventure_id: &str) -> Result<Vec<String>, CombatError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM combats WHERE adventure_id = ? ORDER BY created_at, id",
        )
        .bind(adventure_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
