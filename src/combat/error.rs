//! Combat error taxonomy
//!
//! Every failure carries the ids needed to act on it. Callers that only care
//! about the category can match on [`CombatError::kind`].

use thiserror::Error;

use super::dice::DiceError;

/// Flat error category for exhaustive handling by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    EmptyRoster,
    NotYourTurn,
    InvalidTarget,
    CombatEnded,
    InvalidAction,
    InvalidDamageExpression,
    InvalidCombatant,
    InvalidTurnOrder,
    InvalidTransition,
    Conflict,
    Dice,
    Storage,
}

/// Combat engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("combat needs at least one character and one enemy (got {characters} characters, {enemies} enemies)")]
    EmptyRoster { characters: usize, enemies: usize },

    #[error("combat {combat_id}: it is {expected}'s turn, not {actual}'s")]
    NotYourTurn {
        combat_id: String,
        expected: String,
        actual: String,
    },

    #[error("combat {combat_id}: invalid target {target_id}: {reason}")]
    InvalidTarget {
        combat_id: String,
        target_id: String,
        reason: String,
    },

    #[error("combat {combat_id} is not active")]
    CombatEnded { combat_id: String },

    #[error("combat {combat_id}: invalid action for {combatant_id}: {reason}")]
    InvalidAction {
        combat_id: String,
        combatant_id: String,
        reason: String,
    },

    #[error("invalid damage expression '{expression}': {reason}")]
    InvalidDamageExpression { expression: String, reason: String },

    #[error("combatant '{id}' is invalid: {reason}")]
    InvalidCombatant { id: String, reason: String },

    #[error("combat {combat_id}: turn order is not a permutation of the combatants")]
    InvalidTurnOrder { combat_id: String },

    #[error("combat {combat_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        combat_id: String,
        from: String,
        to: String,
    },

    #[error("combat {combat_id} was modified concurrently (expected version {expected_version}, found {found_version})")]
    Conflict {
        combat_id: String,
        expected_version: u64,
        found_version: u64,
    },

    #[error("dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CombatError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CombatError::NotFound { .. } => ErrorKind::NotFound,
            CombatError::EmptyRoster { .. } => ErrorKind::EmptyRoster,
            CombatError::NotYourTurn { .. } => ErrorKind::NotYourTurn,
            CombatError::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            CombatError::CombatEnded { .. } => ErrorKind::CombatEnded,
            CombatError::InvalidAction { .. } => ErrorKind::InvalidAction,
            CombatError::InvalidDamageExpression { .. } => ErrorKind::InvalidDamageExpression,
            CombatError::InvalidCombatant { .. } => ErrorKind::InvalidCombatant,
            CombatError::InvalidTurnOrder { .. } => ErrorKind::InvalidTurnOrder,
            CombatError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CombatError::Conflict { .. } => ErrorKind::Conflict,
            CombatError::Dice(_) => ErrorKind::Dice,
            CombatError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        CombatError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_target(combat_id: &str, target_id: &str, reason: &str) -> Self {
        CombatError::InvalidTarget {
            combat_id: combat_id.to_string(),
            target_id: target_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_action(combat_id: &str, combatant_id: &str, reason: &str) -> Self {
        CombatError::InvalidAction {
            combat_id: combat_id.to_string(),
            combatant_id: combatant_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn ended(combat_id: &str) -> Self {
        CombatError::CombatEnded {
            combat_id: combat_id.to_string(),
        }
    }
}

impl From<sqlx::Error> for CombatError {
    fn from(err: sqlx::Error) -> Self {
        CombatError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CombatError {
    fn from(err: serde_json::Error) -> Self {
        CombatError::Storage(format!("serialization: {}", err))
    }
}
