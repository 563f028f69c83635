//! Combat system module
//!
//! Turn-based combat resolution:
//! - Dice service boundary (e.g., "1d20", "2d6")
//! - Initiative rolls and a deterministic turn order
//! - Attack resolution with natural 20/natural 1 rules
//! - Damage expressions with critical dice doubling
//! - Health-driven enemy AI
//! - Encounter state machine and turn orchestration

mod ai;
mod attack;
mod damage;
mod dice;
mod encounter;
mod error;
mod initiative;
mod memory;
mod service;
mod store;

pub use ai::{ai_state_for, select_action, AiState, EnemyActionType, EnemyDecision};
pub use attack::{is_critical, is_fumble, AttackOutcome, AttackResolver};
pub use damage::{parse_damage_expression, DamageCalculator, DamageExpression};
pub use dice::{parse_dice, DiceError, DiceRoll, DiceService, RandomDice, RollOutcome, ScriptedDice};
pub use encounter::{
    AttackAction, CombatEncounter, CombatStatus, Combatant, CombatantKind, CombatantStatus,
    LogEntry, LoggedAction, Winner,
};
pub use error::{CombatError, ErrorKind};
pub use initiative::InitiativeCalculator;
pub use memory::MemoryStore;
pub use service::{CombatService, CombatStatusView, CombatantSummary, TurnResult, DEFAULT_RECENT_LOG_ENTRIES};
pub use store::{CharacterSource, CombatRepository, CombatantSnapshot, EnemySource};
