//! Support/resistance zone clustering
//!
//! Swing highs and lows are clustered into price bands where historical
//! turning points concentrate. Clustering is online and greedy: each new
//! swing point either reinforces the first existing zone whose midpoint
//! lies within the match tolerance, or seeds a new padded zone.
//!
//! The first-match-in-store-order tie-break is inherited behavior: when a
//! swing point is within tolerance of several zones, only the earliest
//! created zone is reinforced, even if a later zone is a closer fit. Past
//! assignments are never re-optimized.

use crate::config::ZoneConfig;
use serde::{Deserialize, Serialize};
use signal_types::Candle;
use tracing::debug;

/// A clustered price band touched by one or more swing points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrZone {
    pub instrument: String,
    pub low: f64,
    pub high: f64,
    pub strength: u32,
    pub last_touched: u64,
}

impl SrZone {
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Swing point extraction: a bar is a swing high iff its high is the
/// strict maximum over the `2 * lookback + 1` bars centered on it, and a
/// swing low by the mirrored rule.
pub fn detect_swing_points(series: &[Candle], lookback: usize) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if series.len() < 2 * lookback + 1 {
        return (highs, lows);
    }

    for i in lookback..series.len() - lookback {
        let window = &series[i - lookback..=i + lookback];

        let is_swing_high = window
            .iter()
            .enumerate()
            .all(|(j, c)| j == lookback || series[i].high > c.high);
        if is_swing_high {
            highs.push(series[i].high);
        }

        let is_swing_low = window
            .iter()
            .enumerate()
            .all(|(j, c)| j == lookback || series[i].low < c.low);
        if is_swing_low {
            lows.push(series[i].low);
        }
    }

    (highs, lows)
}

/// Per-instrument zone store with greedy first-match clustering.
#[derive(Debug)]
pub struct ZoneStore {
    instrument: String,
    config: ZoneConfig,
    zones: Vec<SrZone>,
}

impl ZoneStore {
    pub fn new(instrument: impl Into<String>, config: ZoneConfig) -> Self {
        Self {
            instrument: instrument.into(),
            config,
            zones: Vec::new(),
        }
    }

    /// Cluster a batch of swing prices, highs first then lows, matching
    /// the detector's emission order.
    pub fn cluster(&mut self, highs: &[f64], lows: &[f64], now: u64) {
        for &price in highs.iter().chain(lows.iter()) {
            self.assign(price, now);
        }
    }

    // First zone in store order whose midpoint is within the relative
    // tolerance wins; otherwise a new padded zone is created.
    fn assign(&mut self, price: f64, now: u64) {
        let tolerance = self.config.match_tolerance * price;
        if let Some(zone) = self
            .zones
            .iter_mut()
            .find(|z| (z.midpoint() - price).abs() <= tolerance)
        {
            zone.low = zone.low.min(price);
            zone.high = zone.high.max(price);
            zone.strength += 1;
            zone.last_touched = now;
            return;
        }

        let pad = self.config.zone_padding * price;
        debug!(
            instrument = %self.instrument,
            price,
            "created new support/resistance zone"
        );
        self.zones.push(SrZone {
            instrument: self.instrument.clone(),
            low: price - pad,
            high: price + pad,
            strength: 1,
            last_touched: now,
        });
    }

    /// Drop zones that have gone stale without accumulating strength.
    pub fn prune(&mut self, now: u64) {
        let stale_after = self.config.stale_after_secs;
        let before = self.zones.len();
        self.zones
            .retain(|z| !(now.saturating_sub(z.last_touched) > stale_after && z.strength <= 1));
        if self.zones.len() < before {
            debug!(
                instrument = %self.instrument,
                pruned = before - self.zones.len(),
                "pruned stale zones"
            );
        }
    }

    /// Zones strong enough to contribute to scoring that contain `price`.
    pub fn strong_zones_at(&self, price: f64) -> impl Iterator<Item = &SrZone> {
        let min_strength = self.config.score_min_strength;
        self.zones
            .iter()
            .filter(move |z| z.strength >= min_strength && z.contains(price))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SrZone> {
        self.zones.iter()
    }
}
