//! Combat encounter state machine
//!
//! An encounter owns a flat list of combatants and refers to them by id
//! everywhere else: the turn order, the action log and AI targeting all hold
//! ids, never references.
//!
//! Lifecycle: `Pending` -> `Active` -> `Ended`. The turn order is fixed when
//! the encounter starts; the current turn is an index into it that skips
//! combatants who are no longer active.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ai::{ai_state_for, AiState};
use super::error::CombatError;
use super::store::CombatantSnapshot;

/// Which side a combatant fights on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantKind {
    PlayerCharacter,
    Enemy,
}

/// Participation status of a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantStatus {
    Active,
    Defeated,
    Fled,
}

/// A participant in one encounter, built from a source snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Unique id within the encounter; also the initiative tiebreaker
    pub id: String,
    pub kind: CombatantKind,
    /// Id of the character or enemy this combatant was built from
    pub source_id: String,
    pub name: String,
    pub armor_value: i32,
    pub current_health: i32,
    pub max_health: i32,
    pub dexterity_modifier: i32,
    pub attack_modifier: i32,
    pub damage_expression: String,
    pub damage_modifier: i32,
    /// Raw d20 initiative roll, 0 until rolled
    pub initiative_roll: u32,
    pub status: CombatantStatus,
}

impl Combatant {
    /// Build a combatant from a source snapshot
    ///
    /// Health is clamped into `[0, max]`; a snapshot already at 0 health
    /// joins the fight as `Defeated`. The snapshot is expected to have
    /// passed [`CombatantSnapshot::validate`].
    pub fn from_snapshot(kind: CombatantKind, snapshot: &CombatantSnapshot) -> Self {
        let max_health = snapshot.max_health.max(1);
        let current_health = snapshot.current_health.clamp(0, max_health);
        let status = if current_health == 0 {
            CombatantStatus::Defeated
        } else {
            CombatantStatus::Active
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            source_id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            armor_value: snapshot.armor_value,
            current_health,
            max_health,
            dexterity_modifier: snapshot.dexterity_modifier,
            attack_modifier: snapshot.attack_modifier,
            damage_expression: snapshot.damage_expression.clone(),
            damage_modifier: snapshot.damage_modifier,
            initiative_roll: 0,
            status,
        }
    }

    /// Initiative roll plus dexterity modifier
    pub fn initiative_score(&self) -> i32 {
        (self.initiative_roll as i32).saturating_add(self.dexterity_modifier)
    }

    /// Key used to break initiative ties after score and dexterity
    pub fn tiebreaker(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.status == CombatantStatus::Active
    }

    pub fn is_enemy(&self) -> bool {
        self.kind == CombatantKind::Enemy
    }

    /// Current AI state, derived from health; `None` for player characters
    pub fn ai_state(&self) -> Option<AiState> {
        self.is_enemy()
            .then(|| ai_state_for(self.current_health, self.max_health))
    }

    /// Apply damage, clamping at 0 and marking the combatant defeated
    /// when health runs out. Returns health after the hit.
    fn take_damage(&mut self, amount: i32) -> i32 {
        self.current_health = (self.current_health - amount.max(0)).clamp(0, self.max_health);
        if self.current_health == 0 {
            self.status = CombatantStatus::Defeated;
        }
        self.current_health
    }
}

/// Lifecycle status of an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatStatus {
    Pending,
    Active,
    Ended,
}

impl fmt::Display for CombatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CombatStatus::Pending => "pending",
            CombatStatus::Active => "active",
            CombatStatus::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// Which side won an ended encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Characters,
    Enemies,
    Draw,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Winner::Characters => "characters",
            Winner::Enemies => "enemies",
            Winner::Draw => "draw",
        };
        write!(f, "{}", s)
    }
}

/// A resolved attack, as recorded in the action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackAction {
    pub attacker_id: String,
    pub target_id: String,
    /// Natural d20 roll
    pub roll: u32,
    pub modifier: i32,
    pub target_defense: i32,
    pub is_hit: bool,
    pub is_critical: bool,
    pub damage_dealt: i32,
    /// Filled in when the action is recorded
    pub target_health_after: i32,
}

/// What a logged turn did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggedAction {
    Attack(AttackAction),
    Defend,
    Flee,
}

/// One immutable entry in the encounter's action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log, starting at 1
    pub sequence: u64,
    pub round: u32,
    pub actor_id: String,
    pub action: LoggedAction,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl LogEntry {
    /// The attack payload, if this entry is an attack
    pub fn attack(&self) -> Option<&AttackAction> {
        match &self.action {
            LoggedAction::Attack(attack) => Some(attack),
            _ => None,
        }
    }
}

/// Aggregate root for one fight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEncounter {
    pub id: String,
    pub adventure_id: String,
    combatants: Vec<Combatant>,
    turn_order: Vec<String>,
    current_turn_index: usize,
    status: CombatStatus,
    winner: Option<Winner>,
    round: u32,
    action_log: Vec<LogEntry>,
    /// Optimistic concurrency token, bumped by each successful persist
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CombatEncounter {
    /// Create a pending encounter with a fixed roster
    pub fn new(adventure_id: &str, combatants: Vec<Combatant>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            adventure_id: adventure_id.to_string(),
            combatants,
            turn_order: Vec::new(),
            current_turn_index: 0,
            status: CombatStatus::Pending,
            winner: None,
            round: 0,
            action_log: Vec::new(),
            version: 0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn status(&self) -> CombatStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Record a combatant's initiative roll; only allowed before the start
    pub fn set_initiative_roll(&mut self, combatant_id: &str, roll: u32) -> Result<(), CombatError> {
        if self.status != CombatStatus::Pending {
            return Err(CombatError::invalid_action(
                &self.id,
                combatant_id,
                "initiative is fixed once combat starts",
            ));
        }
        let combatant = self
            .combatant_mut(combatant_id)
            .ok_or_else(|| CombatError::not_found("combatant", combatant_id))?;
        combatant.initiative_roll = roll;
        Ok(())
    }

    pub fn turn_order(&self) -> &[String] {
        &self.turn_order
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    pub fn action_log(&self) -> &[LogEntry] {
        &self.action_log
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    /// The combatant whose turn it is, while the encounter is active
    pub fn current_combatant(&self) -> Option<&Combatant> {
        if self.status != CombatStatus::Active {
            return None;
        }
        self.turn_order
            .get(self.current_turn_index)
            .and_then(|id| self.combatant(id))
    }

    /// Active combatants on one side
    pub fn active_combatants(&self, kind: CombatantKind) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .iter()
            .filter(move |c| c.kind == kind && c.is_active())
    }

    /// Fix the turn order and begin the fight
    pub fn start_combat(&mut self, turn_order: Vec<String>) -> Result<(), CombatError> {
        if self.status != CombatStatus::Pending {
            return Err(self.transition_error(CombatStatus::Active));
        }
        if !self.is_permutation(&turn_order) {
            return Err(CombatError::InvalidTurnOrder {
                combat_id: self.id.clone(),
            });
        }

        self.turn_order = turn_order;
        self.current_turn_index = self
            .turn_order
            .iter()
            .position(|id| self.combatant(id).is_some_and(Combatant::is_active))
            .unwrap_or(0);
        self.status = CombatStatus::Active;
        self.round = 1;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    fn is_permutation(&self, order: &[String]) -> bool {
        if order.len() != self.combatants.len() {
            return false;
        }
        let ids: HashSet<&str> = self.combatants.iter().map(|c| c.id.as_str()).collect();
        let seen: HashSet<&str> = order.iter().map(String::as_str).collect();
        seen.len() == order.len() && seen == ids
    }

    /// Append an attack to the log and apply its damage to the target
    ///
    /// The recorded entry's `target_health_after` reflects the clamped
    /// health. A target reduced to 0 becomes `Defeated`.
    pub fn record_action(
        &mut self,
        mut attack: AttackAction,
        description: String,
    ) -> Result<&LogEntry, CombatError> {
        self.ensure_active()?;
        let combat_id = self.id.clone();
        let target = self
            .combatant_mut(&attack.target_id)
            .ok_or_else(|| CombatError::invalid_target(&combat_id, &attack.target_id, "unknown combatant"))?;

        attack.target_health_after = target.take_damage(attack.damage_dealt);
        debug!(
            combat_id = %combat_id,
            target = %attack.target_id,
            damage = attack.damage_dealt,
            health = attack.target_health_after,
            "recorded attack"
        );

        let actor_id = attack.attacker_id.clone();
        Ok(self.push_entry(actor_id, LoggedAction::Attack(attack), description))
    }

    /// Log a defend action for the given combatant
    pub fn record_defend(&mut self, actor_id: &str, description: String) -> Result<&LogEntry, CombatError> {
        self.ensure_active()?;
        if self.combatant(actor_id).is_none() {
            return Err(CombatError::not_found("combatant", actor_id));
        }
        Ok(self.push_entry(actor_id.to_string(), LoggedAction::Defend, description))
    }

    /// Mark a combatant as fled and log it
    pub fn record_flee(&mut self, actor_id: &str, description: String) -> Result<&LogEntry, CombatError> {
        self.ensure_active()?;
        let actor = self
            .combatant_mut(actor_id)
            .ok_or_else(|| CombatError::not_found("combatant", actor_id))?;
        actor.status = CombatantStatus::Fled;
        Ok(self.push_entry(actor_id.to_string(), LoggedAction::Flee, description))
    }

    fn push_entry(&mut self, actor_id: String, action: LoggedAction, description: String) -> &LogEntry {
        let entry = LogEntry {
            sequence: self.action_log.len() as u64 + 1,
            round: self.round,
            actor_id,
            action,
            description,
            recorded_at: Utc::now(),
        };
        self.action_log.push(entry);
        &self.action_log[self.action_log.len() - 1]
    }

    /// Move the turn pointer to the next active combatant, wrapping around
    ///
    /// Returns false when no active combatant exists (or the encounter is
    /// not active); the pointer is left where it was.
    pub fn advance_to_next_turn(&mut self) -> bool {
        if self.status != CombatStatus::Active || self.turn_order.is_empty() {
            return false;
        }

        let len = self.turn_order.len();
        for step in 1..=len {
            let raw = self.current_turn_index + step;
            let idx = raw % len;
            let active = self
                .combatant(&self.turn_order[idx])
                .is_some_and(Combatant::is_active);
            if active {
                if raw >= len {
                    self.round += 1;
                }
                self.current_turn_index = idx;
                debug!(combat_id = %self.id, index = idx, round = self.round, "advanced turn");
                return true;
            }
        }
        false
    }

    /// Decide whether either side has been eliminated
    pub fn check_combat_end(&self) -> Option<Winner> {
        let characters_left = self.active_combatants(CombatantKind::PlayerCharacter).next().is_some();
        let enemies_left = self.active_combatants(CombatantKind::Enemy).next().is_some();

        match (characters_left, enemies_left) {
            (true, true) => None,
            (true, false) => Some(Winner::Characters),
            (false, true) => Some(Winner::Enemies),
            (false, false) => Some(Winner::Draw),
        }
    }

    /// Close the encounter with a winner
    ///
    /// Ending twice with the same winner is a no-op.
    pub fn end_combat(&mut self, winner: Winner) -> Result<(), CombatError> {
        match (self.status, self.winner) {
            (CombatStatus::Ended, Some(existing)) if existing == winner => Ok(()),
            (CombatStatus::Active, _) => {
                self.status = CombatStatus::Ended;
                self.winner = Some(winner);
                self.ended_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(self.transition_error(CombatStatus::Ended)),
        }
    }

    fn ensure_active(&self) -> Result<(), CombatError> {
        if self.status == CombatStatus::Active {
            Ok(())
        } else {
            Err(CombatError::ended(&self.id))
        }
    }

    fn transition_error(&self, to: CombatStatus) -> CombatError {
        CombatError::InvalidTransition {
            combat_id: self.id.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
