//! Damage expressions and damage calculation
//!
//! Expressions look like "2d6+3", with a lowercase `d` and no spaces: dice
//! count 1-10, die sides 1-100 and an optional modifier in -20..=20.
//! Criticals double the dice, never the modifier, and a hit always deals at
//! least 1 damage.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::dice::DiceService;
use super::error::CombatError;

pub const MAX_DICE_COUNT: u32 = 10;
pub const MAX_DICE_SIDES: u32 = 100;
pub const MAX_EXPRESSION_MODIFIER: i32 = 20;

/// `<count>d<sides>[+|-<modifier>]`
static DAMAGE_EXPRESSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})d(\d{1,3})(?:([+-])(\d{1,3}))?$").unwrap());

/// A validated damage expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageExpression {
    pub dice_count: u32,
    pub dice_sides: u32,
    pub modifier: i32,
}

impl DamageExpression {
    /// Parse and range-check an expression
    pub fn parse(expression: &str) -> Result<Self, CombatError> {
        let invalid = |reason: &str| CombatError::InvalidDamageExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let caps = DAMAGE_EXPRESSION_REGEX
            .captures(expression)
            .ok_or_else(|| invalid("expected <count>d<sides>[+|-<modifier>]"))?;

        // At most three digits each
        let dice_count: u32 = caps[1].parse().map_err(|_| invalid("bad dice count"))?;
        let dice_sides: u32 = caps[2].parse().map_err(|_| invalid("bad die sides"))?;
        let modifier: i32 = match (caps.get(3), caps.get(4)) {
            (Some(sign), Some(value)) => {
                let value: i32 = value.as_str().parse().map_err(|_| invalid("bad modifier"))?;
                if sign.as_str() == "-" {
                    -value
                } else {
                    value
                }
            }
            _ => 0,
        };

        if !(1..=MAX_DICE_COUNT).contains(&dice_count) {
            return Err(invalid("dice count must be between 1 and 10"));
        }
        if !(1..=MAX_DICE_SIDES).contains(&dice_sides) {
            return Err(invalid("die sides must be between 1 and 100"));
        }
        if !(-MAX_EXPRESSION_MODIFIER..=MAX_EXPRESSION_MODIFIER).contains(&modifier) {
            return Err(invalid("modifier must be between -20 and 20"));
        }

        Ok(Self {
            dice_count,
            dice_sides,
            modifier,
        })
    }

    /// Dice-only notation to hand to the dice service, doubled on a critical
    pub fn dice_notation(&self, is_critical: bool) -> String {
        let count = if is_critical {
            self.dice_count * 2
        } else {
            self.dice_count
        };
        format!("{}d{}", count, self.dice_sides)
    }
}

impl FromStr for DamageExpression {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DamageExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.dice_count, self.dice_sides),
            m if m > 0 => write!(f, "{}d{}+{}", self.dice_count, self.dice_sides, m),
            m => write!(f, "{}d{}{}", self.dice_count, self.dice_sides, m),
        }
    }
}

/// Split an expression into (dice count, dice sides, embedded modifier)
pub fn parse_damage_expression(expression: &str) -> Result<(u32, u32, i32), CombatError> {
    let parsed = DamageExpression::parse(expression)?;
    Ok((parsed.dice_count, parsed.dice_sides, parsed.modifier))
}

/// Rolls damage for a landed hit
#[derive(Clone)]
pub struct DamageCalculator {
    dice: Arc<dyn DiceService>,
}

impl DamageCalculator {
    pub fn new(dice: Arc<dyn DiceService>) -> Self {
        Self { dice }
    }

    /// Roll damage: dice (doubled on a critical) + embedded modifier +
    /// `damage_modifier`, never less than 1
    pub fn calculate_damage(
        &self,
        expression: &str,
        damage_modifier: i32,
        is_critical: bool,
    ) -> Result<i32, CombatError> {
        let parsed = DamageExpression::parse(expression)?;
        let rolled = self.dice.roll(&parsed.dice_notation(is_critical))?.final_total;
        Ok(rolled
            .saturating_add(parsed.modifier)
            .saturating_add(damage_modifier)
            .max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::{RandomDice, ScriptedDice};
    use crate::combat::error::ErrorKind;

    #[test]
    fn test_parse_valid() {
        assert_eq!(parse_damage_expression("2d6+3").unwrap(), (2, 6, 3));
        assert_eq!(parse_damage_expression("1d4-3").unwrap(), (1, 4, -3));
        assert_eq!(parse_damage_expression("10d100").unwrap(), (10, 100, 0));
        assert_eq!(parse_damage_expression("1d8+20").unwrap(), (1, 8, 20));
        assert_eq!(parse_damage_expression("3d8-20").unwrap(), (3, 8, -20));
    }

    #[test]
    fn test_parse_rejects_grammar() {
        for bad in [
            "", "d6", "2d", "2x6", "2d6+", "2d6++1", "2d6 + 1", "1d6+1d4", "-1d6", "abc", "2D6",
            " 1d6", "1d6 ",
        ] {
            let err = DamageExpression::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDamageExpression, "{:?}", bad);
        }
    }

    #[test]
    fn test_parse_rejects_ranges() {
        for bad in ["0d6", "11d6", "1d0", "1d101", "1d6+21", "1d6-21", "999d6"] {
            let err = DamageExpression::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDamageExpression, "{:?}", bad);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(DamageExpression::parse("2d6+3").unwrap().to_string(), "2d6+3");
        assert_eq!(DamageExpression::parse("1d4-3").unwrap().to_string(), "1d4-3");
        assert_eq!(DamageExpression::parse("1d8").unwrap().to_string(), "1d8");
    }

    #[test]
    fn test_damage_saturates_on_extreme_modifier() {
        let dice = Arc::new(ScriptedDice::new([6, 1]));
        let calc = DamageCalculator::new(dice);
        assert_eq!(calc.calculate_damage("1d6+20", i32::MAX, false).unwrap(), i32::MAX);
        assert_eq!(calc.calculate_damage("1d6-20", i32::MIN, false).unwrap(), 1);
    }

    #[test]
    fn test_damage_adds_both_modifiers() {
        let dice = Arc::new(ScriptedDice::new([7]));
        let calc = DamageCalculator::new(dice.clone());
        assert_eq!(calc.calculate_damage("2d6+3", 2, false).unwrap(), 12);
        assert_eq!(dice.requested(), vec!["2d6"]);
    }

    #[test]
    fn test_critical_doubles_dice_not_modifier() {
        let dice = Arc::new(ScriptedDice::new([14]));
        let calc = DamageCalculator::new(dice.clone());
        assert_eq!(calc.calculate_damage("2d6+3", 0, true).unwrap(), 17);
        assert_eq!(dice.requested(), vec!["4d6"]);
    }

    #[test]
    fn test_damage_floor_is_one() {
        let dice = Arc::new(ScriptedDice::new([1]));
        let calc = DamageCalculator::new(dice);
        assert_eq!(calc.calculate_damage("1d4-3", -5, false).unwrap(), 1);

        let calc = DamageCalculator::new(Arc::new(RandomDice::new()));
        for _ in 0..200 {
            assert!(calc.calculate_damage("1d4-3", 0, false).unwrap() >= 1);
        }
    }

    #[test]
    fn test_invalid_expression_rolls_nothing() {
        let dice = Arc::new(ScriptedDice::new([5]));
        let calc = DamageCalculator::new(dice.clone());
        let err = calc.calculate_damage("12d6", 0, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDamageExpression);
        assert!(dice.requested().is_empty());
    }
}
