//! # Shared Signal Engine Types
//!
//! Common type definitions used across the OTC signal engine:
//!
//! - **Market data**: [`Candle`], [`Timeframe`], [`TimeframeRole`]
//! - **Signals**: [`Direction`], [`Score`]
//!
//! ## Design Philosophy
//!
//! - **Plain data**: no behavior beyond validation and formatting; the
//!   analytics live in the strategy service
//! - **Boundary validation**: malformed candles are rejected where they
//!   enter the system, never deep inside the indicator pipeline
//! - **Serde throughout**: every type round-trips through configuration
//!   files and structured logs

pub mod market;
pub mod signal;

pub use market::{Candle, CandleError, Timeframe, TimeframeRole};
pub use signal::{Direction, Score};
