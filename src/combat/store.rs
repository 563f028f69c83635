//! Collaborator boundaries: combatant sources and combat persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::damage::DamageExpression;
use super::encounter::CombatEncounter;
use super::error::CombatError;

/// Read-only view of a character or enemy at the moment combat starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: String,
    pub name: String,
    pub armor_value: i32,
    pub current_health: i32,
    pub max_health: i32,
    pub dexterity_modifier: i32,
    pub attack_modifier: i32,
    /// Weapon or natural attack, e.g. "1d8+1"
    pub damage_expression: String,
    pub damage_modifier: i32,
}

impl CombatantSnapshot {
    /// Reject snapshots that cannot take part in combat
    pub fn validate(&self) -> Result<(), CombatError> {
        if self.max_health <= 0 {
            return Err(CombatError::InvalidCombatant {
                id: self.id.clone(),
                reason: format!("max_health must be positive, got {}", self.max_health),
            });
        }
        DamageExpression::parse(&self.damage_expression)?;
        Ok(())
    }
}

/// Source of player character snapshots
#[async_trait]
pub trait CharacterSource: Send + Sync {
    async fn get_character(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError>;
}

/// Source of enemy snapshots
#[async_trait]
pub trait EnemySource: Send + Sync {
    async fn get_enemy(&self, id: &str) -> Result<Option<CombatantSnapshot>, CombatError>;
}

/// Load/save-by-id persistence for encounters
///
/// `add` and `update` commit immediately. `update` is conditional on the
/// encounter's `version` matching what is stored; on success the stored and
/// in-memory versions are both bumped, on mismatch it fails with
/// `CombatError::Conflict` and nothing is written.
#[async_trait]
pub trait CombatRepository: Send + Sync {
    async fn get_combat(&self, id: &str) -> Result<Option<CombatEncounter>, CombatError>;

    async fn add_combat(&self, encounter: &CombatEncounter) -> Result<(), CombatError>;

    async fn update_combat(&self, encounter: &mut CombatEncounter) -> Result<(), CombatError>;

    /// Ids of every encounter for an adventure, oldest first
    async fn list_by_adventure(&self, adventure_id: &str) -> Result<Vec<String>, CombatError>;
}
