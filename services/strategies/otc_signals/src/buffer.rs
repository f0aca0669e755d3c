//! Candle buffering and per-timeframe routing
//!
//! [`CandleBuffer`] is a fixed-capacity, time-ordered store of completed
//! candles for one (instrument, timeframe) pair. [`CandleAggregator`] owns
//! one buffer per configured timeframe and is the only mutation path:
//! candles are validated at this boundary and malformed ones never reach
//! the indicator pipeline.

use crate::error::{EngineError, Result};
use signal_types::{Candle, Timeframe};
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::warn;

/// Fixed-capacity FIFO candle store with ring-buffer semantics.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    /// Append in arrival order, evicting the oldest candle at capacity.
    pub fn append(&mut self, candle: Candle) {
        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }

    /// Immutable ordered copy for downstream computation. Later appends are
    /// not reflected in a snapshot already taken.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }
}

/// Routes completed candles into the correct per-timeframe buffer.
///
/// Owned exclusively by one instrument's worker; buffers are created
/// lazily on first append for a timeframe.
#[derive(Debug)]
pub struct CandleAggregator {
    instrument: String,
    capacity: usize,
    buffers: HashMap<Timeframe, CandleBuffer>,
}

impl CandleAggregator {
    pub fn new(instrument: impl Into<String>, capacity: usize) -> Self {
        Self {
            instrument: instrument.into(),
            capacity,
            buffers: HashMap::new(),
        }
    }

    /// Validate and append one pre-finalized candle.
    ///
    /// Boundary alignment is the feed's responsibility; this only rejects
    /// candles that violate OHLC invariants.
    pub fn append(&mut self, timeframe: Timeframe, candle: Candle) -> Result<()> {
        if let Err(source) = candle.validate() {
            warn!(
                instrument = %self.instrument,
                %timeframe,
                error = %source,
                "rejecting malformed candle at aggregator boundary"
            );
            return Err(EngineError::InvalidCandle { timeframe, source });
        }

        self.buffers
            .entry(timeframe)
            .or_insert_with(|| CandleBuffer::new(self.capacity))
            .append(candle);
        Ok(())
    }

    pub fn buffer(&self, timeframe: Timeframe) -> Option<&CandleBuffer> {
        self.buffers.get(&timeframe)
    }

    /// Snapshot for one timeframe; empty when no candle has arrived yet.
    pub fn snapshot(&self, timeframe: Timeframe) -> Vec<Candle> {
        self.buffers
            .get(&timeframe)
            .map(|b| b.snapshot())
            .unwrap_or_default()
    }

    /// Close of the most recent candle on the given timeframe.
    pub fn last_close(&self, timeframe: Timeframe) -> Option<f64> {
        self.buffers
            .get(&timeframe)
            .and_then(|b| b.last())
            .map(|c| c.close)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}
