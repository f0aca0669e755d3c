//! OTC Multi-Timeframe Signal Engine
//!
//! Streaming analytics over OTC currency-pair candles: per-instrument
//! workers buffer completed bars on three timeframes, compute a standard
//! indicator set, track fair value gaps and support/resistance zones,
//! and fuse everything into a single signed score. Scores that clear the
//! threshold become debounced alerts.
//!
//! Workers share nothing; each owns its buffers, structural stores, feed
//! and sink, and communicates only through the shutdown channel.

pub mod breakout;
pub mod buffer;
pub mod config;
pub mod error;
pub mod feed;
pub mod fvg;
pub mod gate;
pub mod indicators;
pub mod scoring;
pub mod sink;
pub mod worker;
pub mod zones;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use feed::{CandleFeed, SyntheticFeed};
pub use sink::{AlertSink, IndicatorReadout, LogAlertSink, SignalAlert};
pub use worker::{EngineStats, InstrumentWorker};
