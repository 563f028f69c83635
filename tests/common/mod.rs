//! Common test utilities - encounter fixtures on a real SQLite database

use std::path::PathBuf;
use std::sync::Arc;

use skirmish::combat::{CombatService, CombatantSnapshot, ScriptedDice};
use skirmish::db::{Database, SqliteStore};
use tempfile::TempDir;

/// A file-backed database with a small roster and scripted dice
pub struct Arena {
    pub dice: Arc<ScriptedDice>,
    pub store: Arc<SqliteStore>,
    pub service: CombatService,
    pub db: Arc<Database>,
    pub path: PathBuf,
    _dir: TempDir,
}

pub fn snapshot(id: &str, health: i32, max: i32, dex: i32, attack: i32, armor: i32) -> CombatantSnapshot {
    CombatantSnapshot {
        id: id.to_string(),
        name: id.to_string(),
        armor_value: armor,
        current_health: health,
        max_health: max,
        dexterity_modifier: dex,
        attack_modifier: attack,
        damage_expression: "2d6+3".to_string(),
        damage_modifier: 0,
    }
}

impl Arena {
    /// Characters: hero (dex +2), sidekick. Enemies: goblin, orc (20% health).
    pub async fn new(rolls: impl IntoIterator<Item = i32>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("arena.db");
        let db = Arc::new(
            Database::new(Some(path.to_str().unwrap()))
                .await
                .expect("Failed to create database"),
        );

        let store = Arc::new(db.store());
        store.insert_character(&snapshot("hero", 30, 30, 2, 5, 15)).await.unwrap();
        store.insert_character(&snapshot("sidekick", 12, 20, 0, 3, 12)).await.unwrap();
        store.insert_enemy(&snapshot("goblin", 9, 9, 0, 4, 15)).await.unwrap();
        store.insert_enemy(&snapshot("orc", 4, 20, 0, 6, 13)).await.unwrap();

        let dice = Arc::new(ScriptedDice::new(rolls));
        let service = CombatService::new(dice.clone(), store.clone(), store.clone(), store.clone());

        Self {
            dice,
            store,
            service,
            db,
            path,
            _dir: dir,
        }
    }
}
