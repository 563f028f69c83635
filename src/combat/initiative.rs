//! Initiative rolls and turn ordering

use std::sync::Arc;

use super::dice::{DiceError, DiceService};
use super::encounter::Combatant;

const INITIATIVE_DIE: &str = "1d20";

/// Rolls initiative and sorts combatants into turn order
#[derive(Clone)]
pub struct InitiativeCalculator {
    dice: Arc<dyn DiceService>,
}

impl InitiativeCalculator {
    pub fn new(dice: Arc<dyn DiceService>) -> Self {
        Self { dice }
    }

    /// Roll a d20 for initiative
    ///
    /// A total outside `[1, 20]` means the dice service is broken and is
    /// reported rather than silently clamped.
    pub fn roll_initiative(&self) -> Result<u32, DiceError> {
        let total = self.dice.roll(INITIATIVE_DIE)?.final_total;
        if !(1..=20).contains(&total) {
            return Err(DiceError::OutOfRange {
                expression: INITIATIVE_DIE.to_string(),
                total,
            });
        }
        Ok(total as u32)
    }

    /// Turn order from already-rolled initiative
    ///
    /// Sorted by initiative score (high first), then dexterity modifier (high
    /// first), then tiebreaker key (low first). The comparator is total, so
    /// the order is fully determined by its inputs.
    pub fn calculate_order(combatants: &[Combatant]) -> Vec<String> {
        let mut ordered: Vec<&Combatant> = combatants.iter().collect();
        ordered.sort_by(|a, b| {
            b.initiative_score()
                .cmp(&a.initiative_score())
                .then(b.dexterity_modifier.cmp(&a.dexterity_modifier))
                .then_with(|| a.tiebreaker().cmp(b.tiebreaker()))
        });
        ordered.into_iter().map(|c| c.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::{RandomDice, ScriptedDice};
    use crate::combat::encounter::tests::combatant;
    use crate::combat::encounter::CombatantKind;

    fn rolled(id: &str, roll: u32, dex: i32) -> Combatant {
        let mut c = combatant(CombatantKind::PlayerCharacter, id, 10, 10);
        c.initiative_roll = roll;
        c.dexterity_modifier = dex;
        c
    }

    #[test]
    fn test_roll_initiative_bounds() {
        let calc = InitiativeCalculator::new(Arc::new(RandomDice::new()));
        for _ in 0..500 {
            let roll = calc.roll_initiative().unwrap();
            assert!((1..=20).contains(&roll), "rolled {}", roll);
        }
    }

    #[test]
    fn test_roll_initiative_uses_d20() {
        let dice = Arc::new(ScriptedDice::new([11]));
        let calc = InitiativeCalculator::new(dice.clone());
        assert_eq!(calc.roll_initiative().unwrap(), 11);
        assert_eq!(dice.requested(), vec!["1d20"]);
    }

    #[test]
    fn test_roll_initiative_rejects_out_of_range() {
        let calc = InitiativeCalculator::new(Arc::new(ScriptedDice::new([21, 0])));
        assert!(matches!(calc.roll_initiative(), Err(DiceError::OutOfRange { .. })));
        assert!(matches!(calc.roll_initiative(), Err(DiceError::OutOfRange { .. })));
    }

    #[test]
    fn test_order_by_score() {
        // Character: 15 + 2 = 17, enemy: 18 + 0 = 18
        let combatants = vec![rolled("character", 15, 2), rolled("enemy", 18, 0)];
        assert_eq!(
            InitiativeCalculator::calculate_order(&combatants),
            vec!["enemy", "character"]
        );
    }

    #[test]
    fn test_order_ties_broken_by_dexterity_then_key() {
        let combatants = vec![
            rolled("c", 10, 2), // 12
            rolled("b", 12, 0), // 12
            rolled("a", 10, 2), // 12
            rolled("d", 15, 0), // 15
        ];
        assert_eq!(
            InitiativeCalculator::calculate_order(&combatants),
            vec!["d", "a", "c", "b"]
        );
    }

    #[test]
    fn test_order_is_deterministic() {
        let combatants = vec![
            rolled("x", 7, 1),
            rolled("y", 8, 0),
            rolled("z", 6, 2),
            rolled("w", 8, 0),
        ];
        let first = InitiativeCalculator::calculate_order(&combatants);
        let mut reversed = combatants.clone();
        reversed.reverse();
        for _ in 0..10 {
            assert_eq!(InitiativeCalculator::calculate_order(&combatants), first);
            assert_eq!(InitiativeCalculator::calculate_order(&reversed), first);
        }
        assert_eq!(first, vec!["z", "x", "w", "y"]);
    }

    #[test]
    fn test_order_empty() {
        assert!(InitiativeCalculator::calculate_order(&[]).is_empty());
    }
}
