//! Fair value gap detection and lifecycle
//!
//! A fair value gap is a 3-candle price discontinuity: when the most
//! recent bar's low clears the high from two bars earlier (bullish) or
//! its high undercuts the low from two bars earlier (bearish), the band
//! between them is an imbalance zone the market tends to revisit.
//!
//! Gaps are detected on the medium timeframe, deduplicated against the
//! per-instrument store with an epsilon test on (top, bottom), and marked
//! filled once price trades back through the band. The filled flag is
//! monotonic: it never reverts, and filled gaps are retained for scoring
//! context until the store cap prunes them.

use crate::config::FvgConfig;
use serde::{Deserialize, Serialize};
use signal_types::{Candle, Timeframe};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSide {
    Bull,
    Bear,
}

/// One detected price gap.
///
/// Edge naming follows the 3-candle construction: for a bullish gap
/// `top` is the older bar's high and `bottom` the newer bar's low, so
/// `top < bottom` and the band is `[top, bottom]`. Bearish gaps mirror
/// this with `top` as the newer bar's high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub side: GapSide,
    pub top: f64,
    pub bottom: f64,
    pub created_at: u64,
    pub filled: bool,
}

/// Scan the most recent `scan_bars` of a series for 3-candle gaps.
///
/// Indexing mirrors the band contract: comparing bar `i` against bar
/// `i - 2`, a bullish gap exists when `low[i] > high[i-2]` and a bearish
/// gap when `high[i] < low[i-2]`.
pub fn detect_gaps(
    instrument: &str,
    timeframe: Timeframe,
    series: &[Candle],
    scan_bars: usize,
    now: u64,
) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if series.len() < 3 {
        return gaps;
    }

    let len = series.len();

    // Walk back from the latest bar; `back` counts bars from the end.
    for back in 0..scan_bars {
        let i = match len.checked_sub(1 + back) {
            Some(i) if i >= 2 => i,
            _ => break,
        };
        let recent = &series[i];
        let older = &series[i - 2];

        if recent.low > older.high {
            gaps.push(FairValueGap {
                instrument: instrument.to_string(),
                timeframe,
                side: GapSide::Bull,
                top: older.high,
                bottom: recent.low,
                created_at: now,
                filled: false,
            });
        } else if recent.high < older.low {
            gaps.push(FairValueGap {
                instrument: instrument.to_string(),
                timeframe,
                side: GapSide::Bear,
                top: recent.high,
                bottom: older.low,
                created_at: now,
                filled: false,
            });
        }
    }

    gaps
}

/// Per-instrument gap store with epsilon deduplication and a size cap.
#[derive(Debug)]
pub struct GapStore {
    config: FvgConfig,
    gaps: Vec<FairValueGap>,
}

impl GapStore {
    pub fn new(config: FvgConfig) -> Self {
        Self {
            config,
            gaps: Vec::new(),
        }
    }

    /// Merge freshly detected gaps, skipping any already registered with
    /// the same (top, bottom) band within epsilon. Overlapping scans on
    /// successive cycles re-detect the same gaps; this keeps them unique.
    pub fn absorb(&mut self, detected: Vec<FairValueGap>) {
        let eps = self.config.dedup_epsilon;
        for gap in detected {
            let known = self
                .gaps
                .iter()
                .any(|g| (g.top - gap.top).abs() < eps && (g.bottom - gap.bottom).abs() < eps);
            if !known {
                debug!(
                    instrument = %gap.instrument,
                    timeframe = %gap.timeframe,
                    side = ?gap.side,
                    top = gap.top,
                    bottom = gap.bottom,
                    "registered new fair value gap"
                );
                self.gaps.push(gap);
            }
        }
        self.enforce_cap();
    }

    /// Mark gaps filled once price has traded back through the band:
    /// a bullish gap when price re-enters at or below its top edge, a
    /// bearish gap at or above its bottom edge. Filled never reverts.
    pub fn fill_at(&mut self, price: f64) {
        for gap in self.gaps.iter_mut().filter(|g| !g.filled) {
            let filled = match gap.side {
                GapSide::Bull => price <= gap.top,
                GapSide::Bear => price >= gap.bottom,
            };
            if filled {
                gap.filled = true;
                debug!(
                    instrument = %gap.instrument,
                    side = ?gap.side,
                    price,
                    "fair value gap filled"
                );
            }
        }
    }

    pub fn unfilled(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter().filter(|g| !g.filled)
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter()
    }

    // Cap the store; filled gaps go first, then the oldest unfilled.
    fn enforce_cap(&mut self) {
        let max = self.config.max_gaps;
        if self.gaps.len() <= max {
            return;
        }

        let excess = self.gaps.len() - max;
        let mut removed = 0;
        self.gaps.retain(|g| {
            if removed < excess && g.filled {
                removed += 1;
                false
            } else {
                true
            }
        });

        if self.gaps.len() > max {
            self.gaps.drain(..self.gaps.len() - max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64) -> Candle {
        let mid = (high + low) / 2.0;
        Candle {
            timestamp: 0,
            open: mid,
            high,
            low,
            close: mid,
            volume: 1.0,
        }
    }

    fn flat(price: f64) -> Candle {
        candle(price + 0.0005, price - 0.0005)
    }

    #[test]
    fn bullish_gap_band_orientation() {
        // high = 1.0 two bars back, low = 1.1 at the end: bull gap
        // with top = 1.0, bottom = 1.1.
        let series = vec![candle(1.0, 0.98), flat(1.02), candle(1.15, 1.1)];
        let gaps = detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0);

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].side, GapSide::Bull);
        assert_eq!(gaps[0].top, 1.0);
        assert_eq!(gaps[0].bottom, 1.1);
    }

    #[test]
    fn bearish_gap_band_orientation() {
        let series = vec![candle(1.12, 1.1), flat(1.05), candle(1.0, 0.98)];
        let gaps = detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0);

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].side, GapSide::Bear);
        assert_eq!(gaps[0].top, 1.0);
        assert_eq!(gaps[0].bottom, 1.1);
    }

    #[test]
    fn no_gap_on_overlapping_candles() {
        let series = vec![flat(1.0), flat(1.0005), flat(1.001)];
        assert!(detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0).is_empty());
    }

    #[test]
    fn absorb_deduplicates_overlapping_scans() {
        let series = vec![candle(1.0, 0.98), flat(1.02), candle(1.15, 1.1)];
        let mut store = GapStore::new(FvgConfig::default());

        store.absorb(detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0));
        store.absorb(detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 1));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fill_is_monotonic() {
        let series = vec![candle(1.0, 0.98), flat(1.02), candle(1.15, 1.1)];
        let mut store = GapStore::new(FvgConfig::default());
        store.absorb(detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0));

        // Above the band: still open.
        store.fill_at(1.2);
        assert_eq!(store.unfilled().count(), 1);

        // Traded back through the whole band.
        store.fill_at(0.99);
        assert_eq!(store.unfilled().count(), 0);

        // Price leaving the band again must not reopen the gap.
        store.fill_at(1.3);
        assert_eq!(store.unfilled().count(), 0);
        assert!(store.iter().all(|g| g.filled));
    }

    #[test]
    fn bear_gap_fills_from_below() {
        let series = vec![candle(1.12, 1.1), flat(1.05), candle(1.0, 0.98)];
        let mut store = GapStore::new(FvgConfig::default());
        store.absorb(detect_gaps("EURUSD-OTC", Timeframe::M5, &series, 50, 0));

        store.fill_at(1.05);
        assert_eq!(store.unfilled().count(), 1);
        store.fill_at(1.11);
        assert_eq!(store.unfilled().count(), 0);
    }

    #[test]
    fn cap_prunes_filled_gaps_first() {
        let config = FvgConfig {
            max_gaps: 2,
            ..FvgConfig::default()
        };
        let mut store = GapStore::new(config);

        let mut gap = |top: f64, filled: bool| FairValueGap {
            instrument: "EURUSD-OTC".to_string(),
            timeframe: Timeframe::M5,
            side: GapSide::Bull,
            top,
            bottom: top + 0.1,
            created_at: 0,
            filled,
        };

        store.absorb(vec![gap(1.0, false)]);
        store.gaps[0].filled = true;
        store.absorb(vec![gap(2.0, false), gap(3.0, false)]);

        assert_eq!(store.len(), 2);
        assert!(store.iter().all(|g| !g.filled));
    }
}
