//! Error types for the OTC signal engine

use signal_types::{CandleError, Timeframe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The feed did not deliver an update within the configured timeout.
    #[error("feed timeout for {instrument}")]
    FeedTimeout { instrument: String },

    /// The feed returned an error other than a timeout.
    #[error("feed error for {instrument}: {message}")]
    Feed { instrument: String, message: String },

    /// Alert delivery failed. Recoverable; the debounce timer is only
    /// advanced on confirmed delivery.
    #[error("alert sink error for {instrument}: {message}")]
    Sink { instrument: String, message: String },

    /// Malformed candle rejected at the aggregator boundary.
    #[error("invalid candle on {timeframe}: {source}")]
    InvalidCandle {
        timeframe: Timeframe,
        #[source]
        source: CandleError,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Every engine error is recoverable at the worker boundary; none may
    /// terminate a worker or the process. Kept as a method so the worker
    /// loop documents the policy in one place.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}
