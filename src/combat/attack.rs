//! Attack resolution
//!
//! A natural 20 always hits and is a critical; a natural 1 always misses.
//! Anything else hits when `roll + modifier >= armor`.

use std::sync::Arc;

use tracing::debug;

use super::dice::{DiceError, DiceService};
use super::encounter::Combatant;

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}

/// Result of an attack roll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackOutcome {
    /// The d20 roll
    pub roll: u32,
    /// Attack modifier applied to the roll
    pub modifier: i32,
    /// Roll plus modifier
    pub total: i32,
    /// Target's armor value
    pub target_armor: i32,
    pub is_hit: bool,
    pub is_critical: bool,
}

impl AttackOutcome {
    /// Evaluate a roll against a target's armor
    pub fn from_roll(roll: u32, modifier: i32, target_armor: i32) -> Self {
        let total = (roll as i32).saturating_add(modifier);

        // Auto-hit, then auto-miss, then compare
        let is_hit = if is_critical(roll) {
            true
        } else if is_fumble(roll) {
            false
        } else {
            total >= target_armor
        };

        Self {
            roll,
            modifier,
            total,
            target_armor,
            is_hit,
            is_critical: is_critical(roll),
        }
    }
}

/// Rolls to-hit for one attacker against one target
#[derive(Clone)]
pub struct AttackResolver {
    dice: Arc<dyn DiceService>,
}

impl AttackResolver {
    pub fn new(dice: Arc<dyn DiceService>) -> Self {
        Self { dice }
    }

    /// Roll 1d20 and resolve against the target's armor value
    ///
    /// The target must be active; checking that is the caller's job.
    pub fn resolve_attack(
        &self,
        attacker: &Combatant,
        target: &Combatant,
        attack_modifier: i32,
    ) -> Result<AttackOutcome, DiceError> {
        debug_assert!(target.is_active(), "attack against inactive target {}", target.id);

        let roll = self.dice.roll("1d20")?.final_total;
        if !(1..=20).contains(&roll) {
            return Err(DiceError::OutOfRange {
                expression: "1d20".to_string(),
                total: roll,
            });
        }

        let outcome = AttackOutcome::from_roll(roll as u32, attack_modifier, target.armor_value);
        debug!(
            attacker = %attacker.id,
            target = %target.id,
            roll = outcome.roll,
            total = outcome.total,
            armor = outcome.target_armor,
            hit = outcome.is_hit,
            critical = outcome.is_critical,
            "attack roll"
        );
        Ok(outcome)
    }
}
