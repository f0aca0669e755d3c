//! Market data primitives: candles, timeframes, and timeframe roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A completed OHLCV candle for one instrument/timeframe window.
///
/// Immutable once appended to a buffer. Timestamps are Unix epoch seconds
/// of the window open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum CandleError {
    #[error("high {high} is below body top {body_top}")]
    HighBelowBody { high: f64, body_top: f64 },

    #[error("low {low} is above body bottom {body_bottom}")]
    LowAboveBody { low: f64, body_bottom: f64 },

    #[error("non-finite field in candle at ts {timestamp}")]
    NonFinite { timestamp: u64 },
}

impl Candle {
    /// Validate the OHLC invariants: `high >= max(open, close)` and
    /// `low <= min(open, close)`, all fields finite.
    pub fn validate(&self) -> Result<(), CandleError> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(CandleError::NonFinite {
                timestamp: self.timestamp,
            });
        }

        let body_top = self.open.max(self.close);
        if self.high < body_top {
            return Err(CandleError::HighBelowBody {
                high: self.high,
                body_top,
            });
        }

        let body_bottom = self.open.min(self.close);
        if self.low > body_bottom {
            return Err(CandleError::LowAboveBody {
                low: self.low,
                body_bottom,
            });
        }

        Ok(())
    }

    /// Absolute body size of the candle.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range of the candle.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Candle aggregation window. The engine only consumes pre-finalized,
/// boundary-aligned candles per timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5s")]
    S5,
    #[serde(rename = "30s")]
    S30,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
}

impl Timeframe {
    /// Window length in seconds.
    pub fn secs(&self) -> u64 {
        match self {
            Timeframe::S5 => 5,
            Timeframe::S30 => 30,
            Timeframe::M1 => 60,
            Timeframe::M3 => 180,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::S5 => "5s",
            Timeframe::S30 => "30s",
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5s" => Ok(Timeframe::S5),
            "30s" => Ok(Timeframe::S30),
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

/// Responsibility a timeframe carries in multi-timeframe scoring.
///
/// High = trend direction, Medium = main analysis, Low = entry refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeframeRole {
    High,
    Medium,
    Low,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: 1_700_000_000,
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn valid_candle_passes() {
        assert!(candle(1.0, 1.2, 0.9, 1.1).validate().is_ok());
    }

    #[test]
    fn high_below_close_rejected() {
        let err = candle(1.0, 1.05, 0.9, 1.1).validate().unwrap_err();
        assert!(matches!(err, CandleError::HighBelowBody { .. }));
    }

    #[test]
    fn low_above_open_rejected() {
        let err = candle(1.0, 1.2, 1.05, 1.1).validate().unwrap_err();
        assert!(matches!(err, CandleError::LowAboveBody { .. }));
    }

    #[test]
    fn nan_rejected() {
        let err = candle(f64::NAN, 1.2, 0.9, 1.1).validate().unwrap_err();
        assert!(matches!(err, CandleError::NonFinite { .. }));
    }

    #[test]
    fn timeframe_round_trip() {
        for tf in [
            Timeframe::S5,
            Timeframe::S30,
            Timeframe::M1,
            Timeframe::M3,
            Timeframe::M5,
            Timeframe::M15,
        ] {
            assert_eq!(tf.label().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn timeframe_serde_uses_labels() {
        let json = serde_json::to_string(&Timeframe::M15).unwrap();
        assert_eq!(json, "\"15m\"");
    }
}
