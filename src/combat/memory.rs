//! In-memory implementations of the combat collaborators

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::encounter::CombatEncounter;
use super::error::CombatError;
use super::store::{CharacterSource, CombatRepository, CombatantSnapshot, EnemySource};

/// Characters, enemies and encounters held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    characters: RwLock<HashMap<String, CombatantSnapshot>>,
    enemies: RwLock<HashMap<String, CombatantSnapshot>>,
    combats: RwLock<HashMap<String, CombatEncounter>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn insert_character(&self, snapshot: CombatantSnapshot) {
        self.characters
            .write()
            .await
            .insert(snapshot.id.clone(), snapshot);
    }

    pub async fn insert_enemy(&self, snapshot: CombatantSnapshot) {
        self.enemies.write().await.insert(snapshot.id.clone(), snapshot);
    }

    /// Number of stored encounters
    pub async fn combat_count(&self) -> usize {
        self.combats.read().await.len()
    }
}

#[async_trait]
impl CharacterSource for MemoryStore {
    async fn get_character(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError> {
        Ok(self.characters.read().await.get(id).cloned())
    }
}

#[async_trait]
impl EnemySource for MemoryStore {
    async fn get_enemy(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError> {
        Ok(self.enemies.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CombatRepository for MemoryStore {
    async fn get_combat(&self, id: &str) -> Result<Option<CombatEncounter>, CombatError> {
        Ok(self.combats.read().await.get(id).cloned())
    }

    async fn add_combat(&self, encounter: &CombatEncounter) -> Result<(), CombatError> {
        let mut combats = self.combats.write().await;
        if combats.contains_key(&encounter.id) {
            return Err(CombatError::Storage(format!(
                "combat {} already exists",
                encounter.id
            )));
        }
        combats.insert(encounter.id.clone(), encounter.clone());
        Ok(())
    }

    async fn update_combat(&self, encounter: &mut CombatEncounter) -> Result<(), CombatError> {
        let mut combats = self.combats.write().await;
        let stored = combats
            .get(&encounter.id)
            .ok_or_else(|| CombatError::not_found("combat", &encounter.id))?;

        if stored.version != encounter.version {
            return Err(CombatError::Conflict {
                combat_id: encounter.id.clone(),
                expected_version: encounter.version,
                found_version: stored.version,
            });
        }

        encounter.version += 1;
        combats.insert(encounter.id.clone(), encounter.clone());
        Ok(())
    }

    async fn list_by_adventure(&self, adventure_id: &str) -> Result<Vec<String>, CombatError> {
        let combats = self.combats.read().await;
        let mut matching: Vec<&CombatEncounter> = combats
            .values()
            .filter(|c| c.adventure_id == adventure_id)
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching.into_iter().map(|c| c.id.clone()).collect())
    }
}
