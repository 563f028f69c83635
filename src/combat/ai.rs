//! Enemy decision policy
//!
//! Stateless: the AI state is derived from current health on every call, and
//! the same inputs always produce the same decision.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::encounter::{Combatant, CombatantKind};

/// Behavior mode of an enemy, derived from its health percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiState {
    /// At or above half health: go after the strongest threat
    Aggressive,
    /// Between a quarter and half health: finish off the weakest target
    Defensive,
    /// Below a quarter health: run
    Fleeing,
}

/// Map health to an AI state
///
/// `< 25%` is Fleeing, `[25%, 50%)` is Defensive, anything else Aggressive.
/// Integer arithmetic keeps the band edges exact.
pub fn ai_state_for(current_health: i32, max_health: i32) -> AiState {
    let current = i64::from(current_health.max(0)) * 100;
    let max = i64::from(max_health.max(1));
    if current < 25 * max {
        AiState::Fleeing
    } else if current < 50 * max {
        AiState::Defensive
    } else {
        AiState::Aggressive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyActionType {
    Attack,
    Defend,
    Flee,
}

/// What an enemy decided to do this turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyDecision {
    pub action: EnemyActionType,
    pub target_id: Option<String>,
    pub state: AiState,
    pub description: String,
}

/// Choose an action for `enemy` given everyone in the encounter
pub fn select_action(enemy: &Combatant, all: &[Combatant]) -> EnemyDecision {
    let state = ai_state_for(enemy.current_health, enemy.max_health);

    let mut candidates = all
        .iter()
        .filter(|c| c.kind == CombatantKind::PlayerCharacter && c.is_active())
        .peekable();

    if candidates.peek().is_none() {
        return hold(enemy, state);
    }

    let target = match state {
        AiState::Fleeing => {
            return EnemyDecision {
                action: EnemyActionType::Flee,
                target_id: None,
                state,
                description: format!("{} is badly wounded and tries to flee", enemy.name),
            };
        }
        AiState::Aggressive => candidates.min_by(|a, b| strongest_first(a, b)),
        AiState::Defensive => candidates.min_by(|a, b| weakest_first(a, b)),
    };
    let Some(target) = target else {
        return hold(enemy, state);
    };

    let description = match state {
        AiState::Defensive => format!("{} goes for the weakened {}", enemy.name, target.name),
        _ => format!("{} charges at {}", enemy.name, target.name),
    };
    EnemyDecision {
        action: EnemyActionType::Attack,
        target_id: Some(target.id.clone()),
        state,
        description,
    }
}

fn hold(enemy: &Combatant, state: AiState) -> EnemyDecision {
    EnemyDecision {
        action: EnemyActionType::Defend,
        target_id: None,
        state,
        description: format!("{} has no one to attack and braces itself", enemy.name),
    }
}

/// Highest max health, then highest current health, then lowest tiebreaker
fn strongest_first(a: &Combatant, b: &Combatant) -> Ordering {
    b.max_health
        .cmp(&a.max_health)
        .then(b.current_health.cmp(&a.current_health))
        .then_with(|| a.tiebreaker().cmp(b.tiebreaker()))
}

/// Lowest current health, then lowest tiebreaker
fn weakest_first(a: &Combatant, b: &Combatant) -> Ordering {
    a.current_health
        .cmp(&b.current_health)
        .then_with(|| a.tiebreaker().cmp(b.tiebreaker()))
}
