//! Alert delivery
//!
//! Scores that clear the threshold and the debounce gate become a
//! [`SignalAlert`] and go out through an [`AlertSink`]. The default sink
//! writes structured log lines; messaging integrations implement the
//! same trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signal_types::{Direction, Timeframe};
use tracing::info;

/// Last medium-timeframe indicator values carried into the alert body.
/// Undefined values are omitted from the rendered readout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorReadout {
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub macd: Option<f64>,
    pub williams_r: Option<f64>,
    pub cci: Option<f64>,
}

/// One actionable signal, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAlert {
    pub instrument: String,
    pub direction: Direction,
    pub value: i32,
    pub price: f64,
    pub timestamp: u64,
    /// Timeframes in role order: trend, analysis, refinement.
    pub roles: [Timeframe; 3],
    pub reasons: Vec<String>,
    pub readout: Option<IndicatorReadout>,
}

impl SignalAlert {
    /// Render the alert as a multi-line body: headline, role timeframes,
    /// enumerated reasons truncated to `max_reasons`, and the key
    /// medium-timeframe indicator readout when available.
    pub fn format(&self, max_reasons: usize) -> String {
        let mut out = format!(
            "{} {} score={} price={:.5}\ntimeframes: {} + {} + {}\nanalysis:\n",
            self.instrument,
            self.direction,
            self.value,
            self.price,
            self.roles[0],
            self.roles[1],
            self.roles[2],
        );

        let shown = self.reasons.len().min(max_reasons);
        for (i, reason) in self.reasons[..shown].iter().enumerate() {
            out.push_str(&format!("  {}. {reason}\n", i + 1));
        }
        let hidden = self.reasons.len() - shown;
        if hidden > 0 {
            out.push_str(&format!("  ... and {hidden} more indicators\n"));
        }

        if let Some(r) = &self.readout {
            out.push_str(&format!("key indicators ({}):", self.roles[1]));
            if let Some(v) = r.rsi {
                out.push_str(&format!(" RSI={v:.1}"));
            }
            if let (Some(k), Some(d)) = (r.stoch_k, r.stoch_d) {
                out.push_str(&format!(" K/D={k:.1}/{d:.1}"));
            }
            if let Some(v) = r.macd {
                out.push_str(&format!(" MACD={v:.6}"));
            }
            if let Some(v) = r.williams_r {
                out.push_str(&format!(" W%R={v:.1}"));
            }
            if let Some(v) = r.cci {
                out.push_str(&format!(" CCI={v:.1}"));
            }
            out.push('\n');
        }

        out
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&mut self, alert: &SignalAlert) -> Result<()>;
}

/// Sink that publishes alerts to the service log.
#[derive(Debug)]
pub struct LogAlertSink {
    max_reasons: usize,
}

impl LogAlertSink {
    pub fn new(max_reasons: usize) -> Self {
        Self { max_reasons }
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn emit(&mut self, alert: &SignalAlert) -> Result<()> {
        info!(
            instrument = %alert.instrument,
            direction = %alert.direction,
            value = alert.value,
            price = alert.price,
            "{}",
            alert.format(self.max_reasons)
        );
        Ok(())
    }
}
