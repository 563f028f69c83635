//! Combat orchestration
//!
//! [`CombatService`] drives the load -> mutate -> persist cycle for every
//! turn. Mutations of one encounter are serialized by a per-encounter async
//! lock, and persistence is guarded by the encounter's version token, so a
//! second writer is rejected rather than silently overwriting the first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::ai::{self, AiState, EnemyActionType, EnemyDecision};
use super::attack::{AttackOutcome, AttackResolver};
use super::damage::DamageCalculator;
use super::dice::DiceService;
use super::encounter::{
    AttackAction, CombatEncounter, CombatStatus, Combatant, CombatantKind, CombatantStatus,
    LogEntry, Winner,
};
use super::error::CombatError;
use super::initiative::InitiativeCalculator;
use super::store::{CharacterSource, CombatRepository, EnemySource};

/// Default number of log entries included in a status view
pub const DEFAULT_RECENT_LOG_ENTRIES: usize = 10;

/// Outcome of one resolved turn
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub combat_id: String,
    /// The log entry this turn produced
    pub entry: LogEntry,
    /// Set when this turn ended the encounter
    pub winner: Option<Winner>,
    pub status: CombatStatus,
    /// Whose turn it is now, if the encounter is still active
    pub next_combatant_id: Option<String>,
    /// The AI decision behind an enemy turn
    pub decision: Option<EnemyDecision>,
}

/// Per-combatant line of a status view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatantSummary {
    pub id: String,
    pub name: String,
    pub kind: CombatantKind,
    pub current_health: i32,
    pub max_health: i32,
    pub status: CombatantStatus,
    pub initiative_score: i32,
    pub ai_state: Option<AiState>,
}

/// Read-only projection of an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatStatusView {
    pub combat_id: String,
    pub adventure_id: String,
    pub status: CombatStatus,
    pub winner: Option<Winner>,
    pub round: u32,
    pub current_combatant_id: Option<String>,
    /// Combatants in turn order
    pub combatants: Vec<CombatantSummary>,
    pub recent_actions: Vec<LogEntry>,
    pub version: u64,
}

/// Coordinates initiative, attacks, damage and enemy AI for encounters
pub struct CombatService {
    initiative: InitiativeCalculator,
    attacks: AttackResolver,
    damage: DamageCalculator,
    characters: Arc<dyn CharacterSource>,
    enemies: Arc<dyn EnemySource>,
    combats: Arc<dyn CombatRepository>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    recent_log_entries: usize,
}

impl CombatService {
    pub fn new(
        dice: Arc<dyn DiceService>,
        characters: Arc<dyn CharacterSource>,
        enemies: Arc<dyn EnemySource>,
        combats: Arc<dyn CombatRepository>,
    ) -> Self {
        Self {
            initiative: InitiativeCalculator::new(dice.clone()),
            attacks: AttackResolver::new(dice.clone()),
            damage: DamageCalculator::new(dice),
            characters,
            enemies,
            combats,
            locks: Mutex::new(HashMap::new()),
            recent_log_entries: DEFAULT_RECENT_LOG_ENTRIES,
        }
    }

    /// Set how many log entries a status view carries
    pub fn with_recent_log_entries(mut self, count: usize) -> Self {
        self.recent_log_entries = count;
        self
    }

    /// Build, roll initiative for, start and persist a new encounter
    pub async fn start_combat<S: AsRef<str>>(
        &self,
        adventure_id: &str,
        character_ids: &[S],
        enemy_ids: &[S],
    ) -> Result<CombatEncounter, CombatError> {
        if character_ids.is_empty() || enemy_ids.is_empty() {
            return Err(CombatError::EmptyRoster {
                characters: character_ids.len(),
                enemies: enemy_ids.len(),
            });
        }

        let mut combatants = Vec::with_capacity(character_ids.len() + enemy_ids.len());
        for id in character_ids {
            let id = id.as_ref();
            let snapshot = self
                .characters
                .get_character(id)
                .await?
                .ok_or_else(|| CombatError::not_found("character", id))?;
            snapshot.validate()?;
            combatants.push(Combatant::from_snapshot(CombatantKind::PlayerCharacter, &snapshot));
        }
        for id in enemy_ids {
            let id = id.as_ref();
            let snapshot = self
                .enemies
                .get_enemy(id)
                .await?
                .ok_or_else(|| CombatError::not_found("enemy", id))?;
            snapshot.validate()?;
            combatants.push(Combatant::from_snapshot(CombatantKind::Enemy, &snapshot));
        }

        let mut encounter = CombatEncounter::new(adventure_id, combatants);
        let ids: Vec<String> = encounter.combatants().iter().map(|c| c.id.clone()).collect();
        for id in &ids {
            encounter.set_initiative_roll(id, self.initiative.roll_initiative()?)?;
        }
        let order = InitiativeCalculator::calculate_order(encounter.combatants());
        encounter.start_combat(order)?;

        // A side that shows up already beaten ends the fight immediately
        if let Some(winner) = encounter.check_combat_end() {
            encounter.end_combat(winner)?;
        }

        self.combats.add_combat(&encounter).await?;
        info!(
            combat_id = %encounter.id,
            adventure_id = %adventure_id,
            combatants = encounter.combatants().len(),
            first = ?encounter.current_combatant().map(|c| c.name.as_str()),
            "combat started"
        );
        Ok(encounter)
    }

    /// Resolve a player character's attack on `target_id`
    pub async fn resolve_attack(
        &self,
        combat_id: &str,
        attacker_id: &str,
        target_id: &str,
    ) -> Result<TurnResult, CombatError> {
        self.serialized(combat_id, self.attack_turn(combat_id, attacker_id, target_id))
            .await
    }

    /// Let the AI pick and carry out the current enemy's action
    pub async fn resolve_enemy_turn(&self, combat_id: &str) -> Result<TurnResult, CombatError> {
        self.serialized(combat_id, self.enemy_turn(combat_id)).await
    }

    async fn attack_turn(
        &self,
        combat_id: &str,
        attacker_id: &str,
        target_id: &str,
    ) -> Result<TurnResult, CombatError> {
        let mut encounter = self.load(combat_id).await?;
        let kind = check_turn(&encounter, attacker_id)?;
        if kind != CombatantKind::PlayerCharacter {
            return Err(CombatError::invalid_action(
                combat_id,
                attacker_id,
                "enemies act through enemy turns",
            ));
        }

        let entry = self.perform_attack(&mut encounter, attacker_id, target_id)?;
        self.finish_turn(encounter, entry, None).await
    }

    async fn enemy_turn(&self, combat_id: &str) -> Result<TurnResult, CombatError> {
        let mut encounter = self.load(combat_id).await?;
        let enemy = encounter
            .current_combatant()
            .cloned()
            .ok_or_else(|| CombatError::ended(combat_id))?;
        if !enemy.is_enemy() {
            return Err(CombatError::invalid_action(
                combat_id,
                &enemy.id,
                "current combatant is not an enemy",
            ));
        }

        let decision = ai::select_action(&enemy, encounter.combatants());
        debug!(
            combat_id = %combat_id,
            enemy = %enemy.id,
            state = ?decision.state,
            action = ?decision.action,
            target = ?decision.target_id,
            "enemy decision"
        );

        let entry = match (decision.action, decision.target_id.as_deref()) {
            (EnemyActionType::Attack, Some(target_id)) => {
                self.perform_attack(&mut encounter, &enemy.id, target_id)?
            }
            (EnemyActionType::Flee, _) => encounter
                .record_flee(&enemy.id, format!("{} flees the battle", enemy.name))?
                .clone(),
            _ => encounter
                .record_defend(&enemy.id, decision.description.clone())?
                .clone(),
        };
        self.finish_turn(encounter, entry, Some(decision)).await
    }

    /// Winner of the encounter, or of its current position if it were
    /// checked now. Never mutates.
    pub async fn check_combat_status(&self, combat_id: &str) -> Result<Option<Winner>, CombatError> {
        let encounter = self.load(combat_id).await?;
        Ok(match encounter.status() {
            CombatStatus::Ended => encounter.winner(),
            _ => encounter.check_combat_end(),
        })
    }

    /// Read-only projection for callers
    pub async fn get_combat_status(&self, combat_id: &str) -> Result<CombatStatusView, CombatError> {
        let encounter = self.load(combat_id).await?;

        let combatants = encounter
            .turn_order()
            .iter()
            .filter_map(|id| encounter.combatant(id))
            .map(|c| CombatantSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                kind: c.kind,
                current_health: c.current_health,
                max_health: c.max_health,
                status: c.status,
                initiative_score: c.initiative_score(),
                ai_state: c.ai_state(),
            })
            .collect();

        let log = encounter.action_log();
        let skip = log.len().saturating_sub(self.recent_log_entries);

        Ok(CombatStatusView {
            combat_id: encounter.id.clone(),
            adventure_id: encounter.adventure_id.clone(),
            status: encounter.status(),
            winner: encounter.winner(),
            round: encounter.round(),
            current_combatant_id: encounter.current_combatant().map(|c| c.id.clone()),
            combatants,
            recent_actions: log[skip..].to_vec(),
            version: encounter.version,
        })
    }

    /// Full encounter, for callers that need the complete log
    pub async fn get_combat(&self, combat_id: &str) -> Result<CombatEncounter, CombatError> {
        self.load(combat_id).await
    }

    /// Ids of all encounters in an adventure
    pub async fn list_for_adventure(&self, adventure_id: &str) -> Result<Vec<String>, CombatError> {
        self.combats.list_by_adventure(adventure_id).await
    }

    async fn load(&self, combat_id: &str) -> Result<CombatEncounter, CombatError> {
        self.combats
            .get_combat(combat_id)
            .await?
            .ok_or_else(|| CombatError::not_found("combat", combat_id))
    }

    /// Roll to hit, roll damage on a hit, and record the result
    fn perform_attack(
        &self,
        encounter: &mut CombatEncounter,
        attacker_id: &str,
        target_id: &str,
    ) -> Result<LogEntry, CombatError> {
        let combat_id = encounter.id.clone();
        let attacker = encounter
            .combatant(attacker_id)
            .cloned()
            .ok_or_else(|| CombatError::not_found("combatant", attacker_id))?;
        let target = encounter
            .combatant(target_id)
            .cloned()
            .ok_or_else(|| CombatError::invalid_target(&combat_id, target_id, "unknown combatant"))?;

        if !target.is_active() {
            return Err(CombatError::invalid_target(
                &combat_id,
                target_id,
                "target is no longer in the fight",
            ));
        }
        if target.kind == attacker.kind {
            return Err(CombatError::invalid_target(
                &combat_id,
                target_id,
                "cannot attack an ally",
            ));
        }

        let outcome = self
            .attacks
            .resolve_attack(&attacker, &target, attacker.attack_modifier)?;
        let damage = if outcome.is_hit {
            self.damage.calculate_damage(
                &attacker.damage_expression,
                attacker.damage_modifier,
                outcome.is_critical,
            )?
        } else {
            0
        };

        let action = AttackAction {
            attacker_id: attacker.id.clone(),
            target_id: target.id.clone(),
            roll: outcome.roll,
            modifier: outcome.modifier,
            target_defense: outcome.target_armor,
            is_hit: outcome.is_hit,
            is_critical: outcome.is_critical,
            damage_dealt: damage,
            target_health_after: target.current_health,
        };
        let description = describe_attack(&attacker, &target, &outcome, damage);
        Ok(encounter.record_action(action, description)?.clone())
    }

    /// Check for a winner, advance the turn and persist
    async fn finish_turn(
        &self,
        mut encounter: CombatEncounter,
        entry: LogEntry,
        decision: Option<EnemyDecision>,
    ) -> Result<TurnResult, CombatError> {
        let winner = encounter.check_combat_end();
        if let Some(winner) = winner {
            encounter.end_combat(winner)?;
        }
        encounter.advance_to_next_turn();

        if let Err(err) = self.combats.update_combat(&mut encounter).await {
            warn!(combat_id = %encounter.id, error = %err, "failed to persist turn");
            return Err(err);
        }

        debug!(combat_id = %encounter.id, sequence = entry.sequence, "{}", entry.description);
        if let Some(winner) = winner {
            info!(combat_id = %encounter.id, %winner, rounds = encounter.round(), "combat ended");
        }

        Ok(TurnResult {
            combat_id: encounter.id.clone(),
            entry,
            winner,
            status: encounter.status(),
            next_combatant_id: encounter.current_combatant().map(|c| c.id.clone()),
            decision,
        })
    }

    /// Run `op` holding the encounter's lock, then drop the registry entry
    /// if no other caller is using it
    async fn serialized<T>(
        &self,
        combat_id: &str,
        op: impl Future<Output = Result<T, CombatError>>,
    ) -> Result<T, CombatError> {
        let lock = self.lock_for(combat_id);
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);
        self.release_lock(combat_id);
        result
    }

    fn lock_for(&self, combat_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(combat_id.to_string())
            .or_default()
            .clone()
    }

    /// Only the registry's own reference left means no one holds or waits
    fn release_lock(&self, combat_id: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(combat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(combat_id);
        }
    }
}

/// Ensure the encounter is active and it is `actor_id`'s turn
fn check_turn(encounter: &CombatEncounter, actor_id: &str) -> Result<CombatantKind, CombatError> {
    let current = encounter
        .current_combatant()
        .ok_or_else(|| CombatError::ended(&encounter.id))?;
    if current.id != actor_id {
        warn!(combat_id = %encounter.id, expected = %current.id, actual = %actor_id, "out of turn action");
        return Err(CombatError::NotYourTurn {
            combat_id: encounter.id.clone(),
            expected: current.id.clone(),
            actual: actor_id.to_string(),
        });
    }
    Ok(current.kind)
}

fn describe_attack(attacker: &Combatant, target: &Combatant, outcome: &AttackOutcome, damage: i32) -> String {
    if !outcome.is_hit {
        return format!(
            "{} misses {} ({} vs armor {})",
            attacker.name, target.name, outcome.total, outcome.target_armor
        );
    }
    let verb = if outcome.is_critical { "critically hits" } else { "hits" };
    let mut text = format!("{} {} {} for {} damage", attacker.name, verb, target.name, damage);
    if damage >= target.current_health {
        text.push_str(&format!(", defeating {}", target.name));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::combat::encounter::tests::snapshot;
    use crate::combat::encounter::LoggedAction;
    use crate::combat::error::ErrorKind;
    use crate::combat::memory::MemoryStore;

    async fn setup(rolls: impl IntoIterator<Item = i32>) -> (CombatService, Arc<MemoryStore>, Arc<ScriptedDice>) {
        let store = MemoryStore::shared();
        store.insert_character(snapshot("aria", 20, 20, 2)).await;
        store.insert_character(snapshot("bram", 12, 24, 0)).await;
        store.insert_enemy(snapshot("goblin", 5, 10, 0)).await;
        store.insert_enemy(snapshot("weakling", 2, 10, 0)).await;

        let dice = Arc::new(ScriptedDice::new(rolls));
        let service = CombatService::new(dice.clone(), store.clone(), store.clone(), store.clone());
        (service, store, dice)
    }

    fn id_of(encounter: &CombatEncounter, source: &str) -> String {
        encounter
            .combatants()
            .iter()
            .find(|c| c.source_id == source)
            .map(|c| c.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_higher_initiative_acts_first() {
        // aria 15 + 2 = 17, goblin 18 + 0 = 18
        let (service, _, _) = setup([15, 18]).await;
        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();

        assert_eq!(encounter.status(), CombatStatus::Active);
        assert_eq!(encounter.current_combatant().unwrap().source_id, "goblin");
        assert_eq!(encounter.turn_order()[1], id_of(&encounter, "aria"));
        assert_eq!(encounter.round(), 1);
    }

    #[tokio::test]
    async fn test_start_combat_validates_roster() {
        let (service, _, _) = setup([]).await;
        let none: [&str; 0] = [];

        let err = service.start_combat("adv", &none, &["goblin"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyRoster);
        let err = service.start_combat("adv", &["aria"], &none).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyRoster);

        let err = service.start_combat("adv", &["nobody"], &["goblin"]).await.unwrap_err();
        assert_eq!(
            err,
            CombatError::NotFound { entity: "character", id: "nobody".into() }
        );
        let err = service.start_combat("adv", &["aria"], &["dragon"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_start_combat_rejects_bad_damage_expression() {
        let (service, store, _) = setup([10, 10]).await;
        let mut bad = snapshot("slime", 10, 10, 0);
        bad.damage_expression = "lots".into();
        store.insert_enemy(bad).await;

        let err = service.start_combat("adv", &["aria"], &["slime"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDamageExpression);
        assert_eq!(store.combat_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_combat_rejects_non_positive_max_health() {
        let (service, store, _) = setup([10, 10]).await;
        store.insert_enemy(snapshot("husk", 0, 0, 0)).await;

        let err = service.start_combat("adv", &["aria"], &["husk"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCombatant);
        assert_eq!(store.combat_count().await, 0);
    }

    #[tokio::test]
    async fn test_killing_blow_ends_combat() {
        // Initiative aria 15, goblin 10; attack roll 15 hits armor 12; damage 5
        let (service, _, _) = setup([15, 10, 15, 5]).await;
        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();
        let aria = id_of(&encounter, "aria");
        let goblin = id_of(&encounter, "goblin");

        let result = service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap();
        let attack = result.entry.attack().unwrap();
        assert!(attack.is_hit);
        assert_eq!(attack.damage_dealt, 5);
        assert_eq!(attack.target_health_after, 0);
        assert_eq!(result.winner, Some(Winner::Characters));
        assert_eq!(result.status, CombatStatus::Ended);
        assert_eq!(result.next_combatant_id, None);

        let err = service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CombatEnded);
        assert_eq!(
            service.check_combat_status(&encounter.id).await.unwrap(),
            Some(Winner::Characters)
        );
    }

    #[tokio::test]
    async fn test_miss_advances_turn() {
        // Initiative aria 15, goblin 10; attack roll 3 misses
        let (service, _, dice) = setup([15, 10, 3]).await;
        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();
        let aria = id_of(&encounter, "aria");
        let goblin = id_of(&encounter, "goblin");

        let result = service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap();
        assert!(!result.entry.attack().unwrap().is_hit);
        assert_eq!(result.next_combatant_id.as_deref(), Some(goblin.as_str()));
        assert_eq!(dice.remaining(), 0);
        // No damage roll on a miss
        assert_eq!(dice.requested(), vec!["1d20", "1d20", "1d20"]);
    }

    #[tokio::test]
    async fn test_turn_and_target_checks() {
        let (service, _, _) = setup([15, 10, 5, 1]).await;
        let encounter = service
            .start_combat("adv", &["aria", "bram"], &["goblin", "weakling"])
            .await
            .unwrap();
        let aria = id_of(&encounter, "aria");
        let bram = id_of(&encounter, "bram");
        let goblin = id_of(&encounter, "goblin");

        // Order: aria 17, bram 10, goblin 5, weakling 1
        let err = service.resolve_attack(&encounter.id, &bram, &goblin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotYourTurn);

        let err = service.resolve_attack(&encounter.id, &aria, "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);

        let err = service.resolve_attack(&encounter.id, &aria, &bram).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTarget);

        let err = service.resolve_enemy_turn(&encounter.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAction);

        let err = service.resolve_attack("missing", &aria, &goblin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Nothing was persisted by the failed calls
        let stored = service.get_combat(&encounter.id).await.unwrap();
        assert_eq!(stored.version, 0);
        assert!(stored.action_log().is_empty());
    }

    #[tokio::test]
    async fn test_enemy_turn_attacks_strongest() {
        // Initiative aria 5, bram 3, goblin 18; goblin rolls 10 + 3 vs 12, damage 4
        let (service, _, _) = setup([5, 3, 18, 10, 4]).await;
        let encounter = service
            .start_combat("adv", &["aria", "bram"], &["goblin"])
            .await
            .unwrap();
        let aria = id_of(&encounter, "aria");
        let bram = id_of(&encounter, "bram");

        let result = service.resolve_enemy_turn(&encounter.id).await.unwrap();
        let decision = result.decision.clone().unwrap();
        assert_eq!(decision.state, AiState::Aggressive);
        // bram has the higher max health
        assert_eq!(decision.target_id.as_deref(), Some(bram.as_str()));
        let attack = result.entry.attack().unwrap();
        assert_eq!(attack.target_health_after, 8);
        assert_eq!(result.next_combatant_id.as_deref(), Some(aria.as_str()));

        let err = service.resolve_enemy_turn(&encounter.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAction);
    }

    #[tokio::test]
    async fn test_wounded_enemy_flees() {
        // weakling is at 20% health
        let (service, _, _) = setup([5, 18]).await;
        let encounter = service.start_combat("adv", &["aria"], &["weakling"]).await.unwrap();

        let result = service.resolve_enemy_turn(&encounter.id).await.unwrap();
        assert_eq!(result.entry.action, LoggedAction::Flee);
        assert_eq!(result.decision.unwrap().action, EnemyActionType::Flee);
        assert_eq!(result.winner, Some(Winner::Characters));

        let view = service.get_combat_status(&encounter.id).await.unwrap();
        let weakling = view.combatants.iter().find(|c| c.name == "weakling").unwrap();
        assert_eq!(weakling.status, CombatantStatus::Fled);
    }

    #[tokio::test]
    async fn test_status_view() {
        let (service, _, _) = setup([15, 10, 3]).await;
        let service = service.with_recent_log_entries(1);
        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();
        let aria = id_of(&encounter, "aria");
        let goblin = id_of(&encounter, "goblin");
        service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap();

        let view = service.get_combat_status(&encounter.id).await.unwrap();
        assert_eq!(view.status, CombatStatus::Active);
        assert_eq!(view.winner, None);
        assert_eq!(view.current_combatant_id.as_deref(), Some(goblin.as_str()));
        assert_eq!(view.combatants[0].id, aria);
        assert_eq!(view.combatants[0].initiative_score, 17);
        assert_eq!(view.combatants[1].ai_state, Some(AiState::Aggressive));
        assert_eq!(view.recent_actions.len(), 1);
        assert_eq!(view.version, 1);

        assert_eq!(service.check_combat_status(&encounter.id).await.unwrap(), None);
        assert_eq!(
            service.list_for_adventure("adv").await.unwrap(),
            vec![encounter.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_lock_registry_does_not_grow() {
        let (service, _, _) = setup([15, 10, 3]).await;
        for i in 0..50 {
            let err = service
                .resolve_enemy_turn(&format!("unknown-{}", i))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert_eq!(service.locks.lock().len(), 0);

        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();
        let aria = id_of(&encounter, "aria");
        let goblin = id_of(&encounter, "goblin");
        let result = service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap();
        assert_eq!(result.status, CombatStatus::Active);
        let err = service.resolve_attack(&encounter.id, &aria, &goblin).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotYourTurn);
        assert_eq!(service.locks.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_attacks_are_serialized() {
        // Initiative aria 15, goblin 10; one attack roll 3 (miss)
        let (service, _, _) = setup([15, 10, 3]).await;
        let service = Arc::new(service);
        let encounter = service.start_combat("adv", &["aria"], &["goblin"]).await.unwrap();
        let aria = id_of(&encounter, "aria");
        let goblin = id_of(&encounter, "goblin");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                let (combat_id, aria, goblin) = (encounter.id.clone(), aria.clone(), goblin.clone());
                tokio::spawn(async move { service.resolve_attack(&combat_id, &aria, &goblin).await })
            })
            .collect();

        let mut ok = 0;
        let mut not_your_turn = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(err) if err.kind() == ErrorKind::NotYourTurn => not_your_turn += 1,
                Err(err) => panic!("unexpected error: {}", err),
            }
        }
        assert_eq!((ok, not_your_turn), (1, 1));
        assert_eq!(service.locks.lock().len(), 0);

        let stored = service.get_combat(&encounter.id).await.unwrap();
        assert_eq!(stored.action_log().len(), 1);
        assert_eq!(stored.version, 1);
    }
}
