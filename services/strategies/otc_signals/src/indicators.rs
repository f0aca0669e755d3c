//! Windowed technical indicator computation
//!
//! Pure computation: takes a candle snapshot and produces an
//! [`IndicatorFrame`] pairing each bar with its indicator values. The
//! whole window is recomputed on every update; with buffers capped at a
//! few hundred bars this is cheaper than carrying incremental state and
//! keeps every cycle deterministic from the snapshot alone.
//!
//! Every series is aligned to the input: index `i` of a series belongs to
//! candle `i`, and positions without enough history are `None`. Consumers
//! must treat `None` as non-contributing, never as an error.
//!
//! Formulas are the standard closed forms: Wilder smoothing for RSI and
//! ATR, SMA-seeded EMA, MACD as EMA12−EMA26 with a 9-bar signal EMA,
//! Bollinger as 20-bar SMA ± 2σ, Keltner as EMA20 ± 1.5×ATR10.

use signal_types::Candle;

pub const RSI_PERIOD: usize = 14;
pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const ATR_PERIOD: usize = 10;
pub const KELTNER_EMA: usize = 20;
pub const KELTNER_MULT: f64 = 1.5;
pub const CCI_PERIOD: usize = 20;
pub const WILLIAMS_PERIOD: usize = 14;
pub const MOMENTUM_PERIOD: usize = 10;

/// Per-bar indicator values for one candle snapshot.
///
/// Derived and read-only; rebuilt from the full buffer window on every
/// cycle and discarded afterwards.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub candles: Vec<Candle>,
    pub rsi14: Vec<Option<f64>>,
    pub stoch_k: Vec<Option<f64>>,
    pub stoch_d: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub atr10: Vec<Option<f64>>,
    pub keltner_upper: Vec<Option<f64>>,
    pub keltner_lower: Vec<Option<f64>>,
    pub ema20: Vec<Option<f64>>,
    pub ema50: Vec<Option<f64>>,
    pub ema200: Vec<Option<f64>>,
    pub williams_r: Vec<Option<f64>>,
    pub cci20: Vec<Option<f64>>,
    pub momentum10: Vec<Option<f64>>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

/// Last defined position of an aligned series.
pub fn last(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Second-to-last position of an aligned series.
pub fn prev(series: &[Option<f64>]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    series[series.len() - 2]
}

/// Stateless full-window indicator computation.
#[derive(Debug, Clone)]
pub struct IndicatorPipeline {
    min_history: usize,
}

impl IndicatorPipeline {
    pub fn new(min_history: usize) -> Self {
        Self { min_history }
    }

    /// Compute the frame for a snapshot, or `None` below the warm-up
    /// history requirement.
    pub fn compute(&self, snapshot: &[Candle]) -> Option<IndicatorFrame> {
        if snapshot.len() < self.min_history {
            return None;
        }

        let closes: Vec<f64> = snapshot.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = snapshot.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = snapshot.iter().map(|c| c.low).collect();

        let (stoch_k, stoch_d) = stochastic(&highs, &lows, &closes, STOCH_K_PERIOD, STOCH_D_PERIOD);
        let (macd_line, macd_sig, macd_hist) =
            macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let (bb_upper, bb_middle, bb_lower) = bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD);
        let atr10 = atr(&highs, &lows, &closes, ATR_PERIOD);
        let ema20 = ema(&closes, KELTNER_EMA);
        let (keltner_upper, keltner_lower) = keltner(&ema20, &atr10, KELTNER_MULT);

        Some(IndicatorFrame {
            candles: snapshot.to_vec(),
            rsi14: rsi(&closes, RSI_PERIOD),
            stoch_k,
            stoch_d,
            macd: macd_line,
            macd_signal: macd_sig,
            macd_histogram: macd_hist,
            bb_upper,
            bb_middle,
            bb_lower,
            atr10,
            keltner_upper,
            keltner_lower,
            ema20,
            ema50: ema(&closes, 50),
            ema200: ema(&closes, 200),
            williams_r: williams_r(&highs, &lows, &closes, WILLIAMS_PERIOD),
            cci20: cci(&highs, &lows, &closes, CCI_PERIOD),
            momentum10: rate_of_change(&closes, MOMENTUM_PERIOD),
        })
    }
}

fn undefined(len: usize) -> Vec<Option<f64>> {
    vec![None; len]
}

/// Simple moving average, defined from index `period - 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = undefined(values.len());
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Exponential moving average with multiplier `2 / (period + 1)`, seeded
/// with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = undefined(values.len());
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);

    let mut current = seed;
    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = Some(current);
    }
    out
}

/// RSI with Wilder's smoothing (factor `1/period`), defined from index
/// `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = undefined(closes.len());
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let gains_losses: Vec<(f64, f64)> = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .collect();

    let mut avg_gain: f64 = gains_losses[..period].iter().map(|g| g.0).sum::<f64>() / period as f64;
    let mut avg_loss: f64 = gains_losses[..period].iter().map(|g| g.1).sum::<f64>() / period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for (i, &(gain, loss)) in gains_losses.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i + 1] = rsi_value(avg_gain, avg_loss);
    }
    out
}

// A window with no movement at all has no momentum reading.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return None;
    }
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Stochastic oscillator: raw %K over `k_period` bars, %D as the
/// `d_period`-bar SMA of %K. A flat window yields an undefined %K.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = closes.len();
    let mut k_out = undefined(len);
    if k_period == 0 || len < k_period {
        return (k_out, undefined(len));
    }

    for i in (k_period - 1)..len {
        let window = (i + 1 - k_period)..=i;
        let highest = highs[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
        let lowest = lows[window].iter().cloned().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range > 0.0 {
            k_out[i] = Some((closes[i] - lowest) / range * 100.0);
        }
    }

    let d_out = sma_of_options(&k_out, d_period);
    (k_out, d_out)
}

/// SMA over an aligned `Option` series; a window containing any undefined
/// value is itself undefined.
fn sma_of_options(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = undefined(series.len());
    if period == 0 || series.len() < period {
        return out;
    }

    for i in (period - 1)..series.len() {
        let window = &series[(i + 1 - period)..=i];
        if window.iter().all(|v| v.is_some()) {
            let sum: f64 = window.iter().map(|v| v.unwrap()).sum();
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

/// MACD line (fast EMA − slow EMA), signal line (EMA of the MACD line),
/// and histogram (line − signal).
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = closes.len();
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let mut line = undefined(len);
    for i in 0..len {
        if let (Some(f), Some(s)) = (fast_ema[i], slow_ema[i]) {
            line[i] = Some(f - s);
        }
    }

    // Signal EMA runs over the defined portion of the MACD line.
    let mut signal_out = undefined(len);
    let defined: Vec<f64> = line.iter().flatten().copied().collect();
    let first_defined = len - defined.len();
    let signal_values = ema(&defined, signal);
    for (j, value) in signal_values.into_iter().enumerate() {
        signal_out[first_defined + j] = value;
    }

    let mut histogram = undefined(len);
    for i in 0..len {
        if let (Some(l), Some(s)) = (line[i], signal_out[i]) {
            histogram[i] = Some(l - s);
        }
    }

    (line, signal_out, histogram)
}

/// Bollinger bands: SMA ± `n_std` population standard deviations.
pub fn bollinger(
    closes: &[f64],
    period: usize,
    n_std: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = closes.len();
    let middle = sma(closes, period);
    let mut upper = undefined(len);
    let mut lower = undefined(len);
    if period == 0 || len < period {
        return (upper, middle, lower);
    }

    for i in (period - 1)..len {
        let mean = match middle[i] {
            Some(m) => m,
            None => continue,
        };
        let window = &closes[(i + 1 - period)..=i];
        let variance =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();
        upper[i] = Some(mean + n_std * std_dev);
        lower[i] = Some(mean - n_std * std_dev);
    }

    (upper, middle, lower)
}

/// Average true range with Wilder smoothing, defined from index
/// `period - 1`.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = closes.len();
    let mut out = undefined(len);
    if period == 0 || len < period {
        return out;
    }

    let mut true_ranges = Vec::with_capacity(len);
    true_ranges.push(highs[0] - lows[0]);
    for i in 1..len {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        true_ranges.push(tr);
    }

    let mut current: f64 = true_ranges[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..len {
        current = (current * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
        out[i] = Some(current);
    }
    out
}

/// Keltner channels around an EMA center line.
fn keltner(
    center: &[Option<f64>],
    atr: &[Option<f64>],
    mult: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = center.len();
    let mut upper = undefined(len);
    let mut lower = undefined(len);
    for i in 0..len {
        if let (Some(c), Some(a)) = (center[i], atr[i]) {
            upper[i] = Some(c + mult * a);
            lower[i] = Some(c - mult * a);
        }
    }
    (upper, lower)
}

/// Williams %R over `period` bars, in [-100, 0].
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = closes.len();
    let mut out = undefined(len);
    if period == 0 || len < period {
        return out;
    }

    for i in (period - 1)..len {
        let window = (i + 1 - period)..=i;
        let highest = highs[window.clone()].iter().cloned().fold(f64::MIN, f64::max);
        let lowest = lows[window].iter().cloned().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        if range > 0.0 {
            out[i] = Some((highest - closes[i]) / range * -100.0);
        }
    }
    out
}

/// Commodity channel index over typical price with the 0.015 scaling
/// constant. Undefined when the window's mean deviation is zero.
pub fn cci(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = closes.len();
    let mut out = undefined(len);
    if period == 0 || len < period {
        return out;
    }

    let typical: Vec<f64> = (0..len)
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect();

    for i in (period - 1)..len {
        let window = &typical[(i + 1 - period)..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let mean_dev = window.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        if mean_dev > 0.0 {
            out[i] = Some((typical[i] - mean) / (0.015 * mean_dev));
        }
    }
    out
}

/// Rate-of-change momentum: percent change versus `period` bars ago.
pub fn rate_of_change(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = closes.len();
    let mut out = undefined(len);
    if period == 0 || len < period + 1 {
        return out;
    }

    for i in period..len {
        let past = closes[i - period];
        if past != 0.0 {
            out[i] = Some((closes[i] - past) / past * 100.0);
        }
    }
    out
}
