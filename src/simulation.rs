//! Auto-played encounters
//!
//! Drives a combat to completion through the public service API: enemies act
//! through the AI policy, characters attack the weakest enemy still standing.

use tracing::{info, warn};

use crate::combat::{
    CombatEncounter, CombatError, CombatService, CombatStatus, CombatantKind, LogEntry, Winner,
};

/// What happened in a simulated encounter
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub combat_id: String,
    /// None if the round limit was hit first
    pub winner: Option<Winner>,
    /// Rounds actually played
    pub rounds: u32,
    pub log: Vec<LogEntry>,
}

/// Start an encounter and play it until it ends or `max_rounds` pass
pub async fn run_simulation(
    service: &CombatService,
    adventure_id: &str,
    character_ids: &[String],
    enemy_ids: &[String],
    max_rounds: u32,
) -> Result<SimulationReport, CombatError> {
    let encounter = service
        .start_combat(adventure_id, character_ids, enemy_ids)
        .await?;
    let combat_id = encounter.id.clone();

    let mut current = encounter;
    while current.status() == CombatStatus::Active {
        if current.round() > max_rounds {
            warn!(combat_id = %combat_id, max_rounds, "round limit reached");
            break;
        }
        let Some(actor) = current.current_combatant() else {
            break;
        };

        match actor.kind {
            CombatantKind::Enemy => {
                service.resolve_enemy_turn(&combat_id).await?;
            }
            CombatantKind::PlayerCharacter => {
                let actor_id = actor.id.clone();
                let Some(target_id) = weakest_enemy(&current) else {
                    break;
                };
                service.resolve_attack(&combat_id, &actor_id, &target_id).await?;
            }
        }
        current = service.get_combat(&combat_id).await?;
    }

    // Hitting the limit leaves the counter on the round that never ran
    let rounds = current.round().min(max_rounds);
    info!(
        combat_id = %combat_id,
        winner = ?current.winner(),
        rounds,
        actions = current.action_log().len(),
        "simulation finished"
    );

    Ok(SimulationReport {
        combat_id,
        winner: current.winner(),
        rounds,
        log: current.action_log().to_vec(),
    })
}

/// Active enemy with the lowest current health
fn weakest_enemy(encounter: &CombatEncounter) -> Option<String> {
    encounter
        .active_combatants(CombatantKind::Enemy)
        .min_by(|a, b| {
            a.current_health
                .cmp(&b.current_health)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|c| c.id.clone())
}
