//! Trading signal output types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved signal direction on the single signed score axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

/// Fused multi-timeframe score for one instrument at one point in time.
///
/// Positive values are bullish, negative bearish. Recomputed every cycle,
/// never persisted. `reasons` lists the contributions that fired, in the
/// canonical evaluation order, so two identical inputs always produce an
/// identical score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub direction: Direction,
    pub value: i32,
    pub reasons: Vec<String>,
}

impl Score {
    /// A score that fired no conditions; also the fail-closed result when
    /// any required indicator frame is missing.
    pub fn hold() -> Self {
        Self {
            direction: Direction::Hold,
            value: 0,
            reasons: Vec::new(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Hold
    }
}
