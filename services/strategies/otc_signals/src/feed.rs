//! Candle feed abstraction
//!
//! Workers pull closed candles through the [`CandleFeed`] trait; the
//! engine never knows whether bars come from a broker connection, a
//! replay file, or the built-in synthetic generator. A fetch returns
//! every (timeframe, candle) pair that closed since the previous fetch.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use signal_types::{Candle, Timeframe};

#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// Candles closed since the last fetch for `instrument`, tagged with
    /// their timeframe. An empty batch is a normal quiet cycle.
    async fn fetch(&mut self, instrument: &str) -> Result<Vec<(Timeframe, Candle)>>;
}

/// Deterministic price generator for development and tests.
///
/// Price follows overlapping sine cycles offset by a per-instrument
/// seed, so different instruments trace different but repeatable paths.
/// Each fetch advances an internal clock by `step_secs` and emits one
/// candle per timeframe boundary crossed, mimicking a broker that only
/// returns closed bars.
#[derive(Debug)]
pub struct SyntheticFeed {
    timeframes: Vec<Timeframe>,
    step_secs: u64,
    clock: u64,
}

impl SyntheticFeed {
    pub fn new(timeframes: Vec<Timeframe>, step_secs: u64) -> Self {
        Self {
            timeframes,
            step_secs,
            clock: 0,
        }
    }

    fn seed(instrument: &str) -> f64 {
        // Stable across runs; only used to offset the price cycles.
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in instrument.bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x100_0000_01b3);
        }
        (h % 1000) as f64
    }

    fn price_at(seed: f64, t: u64) -> f64 {
        let t = t as f64;
        1.1000 + 0.001 * (t / 37.0 + seed).sin() + 0.0001 * (t / 120.0 + seed).sin()
    }

    fn candle_at(seed: f64, close_ts: u64, tf: Timeframe) -> Candle {
        let open_ts = close_ts.saturating_sub(tf.secs());
        let open = Self::price_at(seed, open_ts);
        let close = Self::price_at(seed, close_ts);
        // Wicks scale with the timeframe so longer bars carry more range.
        let wick = 0.0001 * (tf.secs() as f64 / 60.0).max(1.0);
        Candle {
            timestamp: close_ts,
            open,
            high: open.max(close) + wick,
            low: open.min(close) - wick,
            close,
            volume: tf.secs() as f64,
        }
    }
}

#[async_trait]
impl CandleFeed for SyntheticFeed {
    async fn fetch(&mut self, instrument: &str) -> Result<Vec<(Timeframe, Candle)>> {
        let seed = Self::seed(instrument);
        let from = self.clock;
        self.clock += self.step_secs;

        let mut out = Vec::new();
        for &tf in &self.timeframes {
            let secs = tf.secs();
            if secs == 0 {
                return Err(EngineError::Feed {
                    instrument: instrument.to_string(),
                    message: format!("timeframe {tf} has zero duration"),
                });
            }
            // Every boundary in (from, clock] closed a bar.
            let mut boundary = (from / secs + 1) * secs;
            while boundary <= self.clock {
                out.push((tf, Self::candle_at(seed, boundary, tf)));
                boundary += secs;
            }
        }
        Ok(out)
    }
}
