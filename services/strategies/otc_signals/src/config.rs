//! Engine configuration - runtime parameter management
//!
//! All tunable parameters for the signal engine live here: instrument set,
//! timeframe roles, buffer sizing, detector thresholds, and scoring/gating
//! intervals. Defaults are production values; a TOML file and environment
//! variables can override them at startup without code changes.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use signal_types::{Timeframe, TimeframeRole};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the OTC signal engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Instruments to run workers for
    pub instruments: Vec<String>,
    /// Timeframe role assignment
    pub roles: RoleConfig,
    /// Candle buffer and polling parameters
    pub market: MarketConfig,
    /// Fair value gap detection parameters
    pub fvg: FvgConfig,
    /// Support/resistance clustering parameters
    pub zones: ZoneConfig,
    /// Breakout detection parameters
    pub breakout: BreakoutConfig,
    /// Scoring and signal gating parameters
    pub scoring: ScoringConfig,
}

/// Which timeframe fills each scoring role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Trend direction
    pub high: Timeframe,
    /// Main analysis
    pub medium: Timeframe,
    /// Entry refinement
    pub low: Timeframe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Candle history per (instrument, timeframe) pair
    pub candle_capacity: usize,
    /// Bars required before indicators are computed
    pub min_history: usize,
    /// Seconds between worker cycles
    pub poll_interval_secs: u64,
    /// Seconds to wait after a recoverable cycle error
    pub error_backoff_secs: u64,
    /// Timeout for a single feed fetch
    pub feed_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FvgConfig {
    /// Most recent bars scanned for 3-candle gaps
    pub scan_bars: usize,
    /// Epsilon for deduplicating gaps by (top, bottom)
    pub dedup_epsilon: f64,
    /// Retained gap cap; filled gaps are pruned first
    pub max_gaps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Bars on each side of a swing point
    pub swing_lookback: usize,
    /// Relative distance from a zone midpoint that still matches (0.003 = 0.3%)
    pub match_tolerance: f64,
    /// Half-width of a freshly created zone, relative to price
    pub zone_padding: f64,
    /// Minimum strength for a zone to contribute to scoring
    pub score_min_strength: u32,
    /// Zones older than this with strength <= 1 are pruned
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutConfig {
    /// Bars in the rolling range, current candle excluded
    pub range_bars: usize,
    /// Minimum body / range of the breakout candle
    pub body_ratio_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// |value| at or above this resolves to Buy/Sell
    pub signal_threshold: i32,
    /// Minimum seconds between emissions for one instrument
    pub cooldown_secs: u64,
    /// Reasons included in the alert body
    pub max_alert_reasons: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: vec![
                "EURUSD-OTC".to_string(),
                "GBPUSD-OTC".to_string(),
                "USDJPY-OTC".to_string(),
                "AUDUSD-OTC".to_string(),
            ],
            roles: RoleConfig::default(),
            market: MarketConfig::default(),
            fvg: FvgConfig::default(),
            zones: ZoneConfig::default(),
            breakout: BreakoutConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl RoleConfig {
    /// Timeframe assigned to a scoring role.
    pub fn timeframe(&self, role: TimeframeRole) -> Timeframe {
        match role {
            TimeframeRole::High => self.high,
            TimeframeRole::Medium => self.medium,
            TimeframeRole::Low => self.low,
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            high: Timeframe::M15,
            medium: Timeframe::M5,
            low: Timeframe::M1,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            candle_capacity: 200,
            min_history: 50,
            poll_interval_secs: 45,
            error_backoff_secs: 1,
            feed_timeout_secs: 10,
        }
    }
}

impl Default for FvgConfig {
    fn default() -> Self {
        Self {
            scan_bars: 50,
            dedup_epsilon: 1e-6,
            max_gaps: 256,
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 3,
            match_tolerance: 0.003,
            zone_padding: 0.0015,
            score_min_strength: 3,
            stale_after_secs: 24 * 3600,
        }
    }
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            range_bars: 20,
            body_ratio_min: 0.35,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            signal_threshold: 80,
            cooldown_secs: 1800,
            max_alert_reasons: 8,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content).map_err(|e| EngineError::Configuration {
            message: format!("failed to parse {}: {e}", path.as_ref().display()),
        })?;
        Ok(config)
    }

    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(instruments) = std::env::var("OTC_SIGNALS_INSTRUMENTS") {
            let parsed: Vec<String> = instruments
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.instruments = parsed;
            }
        }

        if let Ok(threshold) = std::env::var("OTC_SIGNALS_THRESHOLD") {
            if let Ok(value) = threshold.parse::<i32>() {
                config.scoring.signal_threshold = value;
            }
        }

        if let Ok(cooldown) = std::env::var("OTC_SIGNALS_COOLDOWN_SECS") {
            if let Ok(value) = cooldown.parse::<u64>() {
                config.scoring.cooldown_secs = value;
            }
        }

        if let Ok(poll) = std::env::var("OTC_SIGNALS_POLL_SECS") {
            if let Ok(value) = poll.parse::<u64>() {
                config.market.poll_interval_secs = value;
            }
        }

        config
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(EngineError::Configuration {
                message: "at least one instrument is required".to_string(),
            });
        }

        if self.market.candle_capacity == 0 {
            return Err(EngineError::Configuration {
                message: "candle_capacity must be positive".to_string(),
            });
        }

        if self.market.min_history > self.market.candle_capacity {
            return Err(EngineError::Configuration {
                message: "min_history cannot exceed candle_capacity".to_string(),
            });
        }

        if self.roles.high == self.roles.medium
            || self.roles.medium == self.roles.low
            || self.roles.high == self.roles.low
        {
            return Err(EngineError::Configuration {
                message: "timeframe roles must be distinct".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.breakout.body_ratio_min) {
            return Err(EngineError::Configuration {
                message: "body_ratio_min must be within [0, 1]".to_string(),
            });
        }

        if self.zones.match_tolerance <= 0.0 || self.zones.zone_padding <= 0.0 {
            return Err(EngineError::Configuration {
                message: "zone tolerance and padding must be positive".to_string(),
            });
        }

        if self.scoring.signal_threshold <= 0 {
            return Err(EngineError::Configuration {
                message: "signal_threshold must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Timeframes the aggregator maintains buffers for, in role order.
    pub fn role_timeframes(&self) -> [Timeframe; 3] {
        [
            self.roles.timeframe(TimeframeRole::High),
            self.roles.timeframe(TimeframeRole::Medium),
            self.roles.timeframe(TimeframeRole::Low),
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.market.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.market.error_backoff_secs)
    }
}
