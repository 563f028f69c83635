//! Dice service boundary
//!
//! The combat engine never touches an RNG directly. Every roll goes through a
//! [`DiceService`], which takes dice notation like "1d20" or "4d6" and returns
//! the total. [`RandomDice`] is the production service; [`ScriptedDice`] plays
//! back a fixed sequence of totals for tests and scripted simulations.

use std::collections::VecDeque;
use std::str::FromStr;

use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;

/// Failures raised by a dice service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("invalid dice notation '{notation}': {reason}")]
    InvalidNotation { notation: String, reason: String },

    #[error("dice roll '{expression}' produced out-of-range total {total}")]
    OutOfRange { expression: String, total: i32 },

    #[error("dice service unavailable: {0}")]
    Unavailable(String),
}

/// Result of a single dice service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    /// The notation that was rolled
    pub expression: String,
    /// Individual die faces, when the service reports them
    pub rolls: Vec<u32>,
    /// Sum of all dice plus any modifier in the notation
    pub final_total: i32,
}

/// Source of randomness for every combat roll
pub trait DiceService: Send + Sync {
    /// Roll the given dice notation and return the total
    fn roll(&self, expression: &str) -> Result<RollOutcome, DiceError>;
}

/// Dice notation broken into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// How many dice
    pub count: u32,
    /// Faces on each die
    pub sides: u32,
    /// Flat bonus or penalty
    pub modifier: i32,
}

impl DiceRoll {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self { count, sides, modifier }
    }

    /// Roll with the given RNG, returning die faces and total
    pub fn roll_with<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec<u32>, i32) {
        let faces: Vec<u32> = (0..self.count)
            .map(|_| rng.random_range(1..=self.sides))
            .collect();
        let sum: i64 = faces.iter().map(|&f| i64::from(f)).sum();
        (faces, sum as i32 + self.modifier)
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

/// Parse notation such as "1d20", "4d6" or "2d8-1"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let invalid = |reason: String| DiceError::InvalidNotation {
        notation: notation.to_string(),
        reason,
    };
    let normalized = notation.trim().to_lowercase();

    let (count_str, rest) = normalized
        .split_once('d')
        .ok_or_else(|| invalid("missing 'd'".to_string()))?;

    let count: u32 = if count_str.is_empty() {
        1 // "d6" means "1d6"
    } else {
        count_str
            .parse()
            .map_err(|_| invalid(format!("bad dice count '{}'", count_str)))?
    };
    if count == 0 {
        return Err(invalid("dice count must be at least 1".to_string()));
    }

    let (sides_str, modifier) = match rest.find(['+', '-']) {
        Some(pos) => {
            let modifier: i32 = rest[pos..]
                .trim_start_matches('+')
                .parse()
                .map_err(|_| invalid(format!("bad modifier '{}'", &rest[pos..])))?;
            (&rest[..pos], modifier)
        }
        None => (rest, 0),
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| invalid(format!("bad die sides '{}'", sides_str)))?;
    if sides == 0 {
        return Err(invalid("die sides must be at least 1".to_string()));
    }

    Ok(DiceRoll::new(count, sides, modifier))
}

/// Production dice service backed by the thread-local, OS-seeded RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl RandomDice {
    pub fn new() -> Self {
        Self
    }
}

impl DiceService for RandomDice {
    fn roll(&self, expression: &str) -> Result<RollOutcome, DiceError> {
        let dice = parse_dice(expression)?;
        let (rolls, final_total) = dice.roll_with(&mut rand::rng());
        Ok(RollOutcome {
            expression: expression.to_string(),
            rolls,
            final_total,
        })
    }
}

/// Dice service that returns queued totals in order
///
/// Every requested expression is recorded so callers can check what was
/// rolled. Running out of queued totals is reported as `Unavailable`.
#[derive(Debug, Default)]
pub struct ScriptedDice {
    totals: Mutex<VecDeque<i32>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedDice {
    pub fn new(totals: impl IntoIterator<Item = i32>) -> Self {
        Self {
            totals: Mutex::new(totals.into_iter().collect()),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Queue more totals behind the existing ones
    pub fn push(&self, totals: impl IntoIterator<Item = i32>) {
        self.totals.lock().extend(totals);
    }

    /// Expressions rolled so far, oldest first
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    /// Number of totals not yet consumed
    pub fn remaining(&self) -> usize {
        self.totals.lock().len()
    }
}

impl DiceService for ScriptedDice {
    fn roll(&self, expression: &str) -> Result<RollOutcome, DiceError> {
        parse_dice(expression)?;
        self.requested.lock().push(expression.to_string());
        let final_total = self
            .totals
            .lock()
            .pop_front()
            .ok_or_else(|| DiceError::Unavailable("scripted rolls exhausted".to_string()))?;
        Ok(RollOutcome {
            expression: expression.to_string(),
            rolls: Vec::new(),
            final_total,
        })
    }
}
