//! Range breakout detection
//!
//! Tests the most recent candle against the rolling high/low of the
//! `range_bars` candles immediately preceding it. A breakout needs a
//! close strictly beyond the range edge plus a candle body that is a
//! meaningful share of its own high-low range, filtering out thin wicks
//! poking through the level.

use crate::config::BreakoutConfig;
use signal_types::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutDirection {
    Up,
    Down,
}

/// Whether the last candle closes beyond the rolling range with enough
/// body. Never errors: short history and degenerate zero-range candles
/// both return `false`.
pub fn is_breakout(series: &[Candle], direction: BreakoutDirection, config: &BreakoutConfig) -> bool {
    let range_bars = config.range_bars;
    if series.len() < range_bars + 1 {
        return false;
    }

    let current = &series[series.len() - 1];
    let range = current.range();
    if range <= 0.0 {
        return false;
    }
    if current.body() / range < config.body_ratio_min {
        return false;
    }

    // Rolling window excludes the current candle.
    let window = &series[series.len() - 1 - range_bars..series.len() - 1];
    match direction {
        BreakoutDirection::Up => {
            let rolling_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            current.close > rolling_high
        }
        BreakoutDirection::Down => {
            let rolling_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            current.close < rolling_low
        }
    }
}
