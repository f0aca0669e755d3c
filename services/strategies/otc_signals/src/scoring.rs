//! Multi-timeframe score fusion
//!
//! Fuses indicator states across the three timeframe roles, structural
//! context (unfilled gaps, strong zones), and breakout detection into a
//! single signed score: positive contributions are bullish, negative
//! bearish. One axis gives one unambiguous tie-break rule - conflicting
//! conditions cancel instead of accumulating.
//!
//! The engine fails closed: if any role's indicator frame is missing the
//! result is a zero-valued Hold. Scoring is purely a function of its
//! inputs - no wall clock, no randomness - so identical frames and
//! structural state always produce an identical score, reasons included.

use crate::breakout::{is_breakout, BreakoutDirection};
use crate::config::BreakoutConfig;
use crate::fvg::{GapSide, GapStore};
use crate::indicators::{last, prev, IndicatorFrame};
use crate::zones::ZoneStore;
use signal_types::{Direction, Score, Timeframe};

// Per-condition weights, ordered as evaluated.
const W_HTF_RSI: i32 = 25;
const W_HTF_TREND: i32 = 20;
const W_HTF_MACD: i32 = 15;
const W_MTF_RSI: i32 = 20;
const W_MTF_STOCH: i32 = 15;
const W_MTF_MACD_HIST: i32 = 10;
const W_MTF_BOLLINGER: i32 = 12;
const W_MTF_WILLIAMS: i32 = 10;
const W_MTF_CCI: i32 = 8;
const W_MTF_KELTNER: i32 = 10;
const W_LTF_RSI: i32 = 8;
const W_LTF_MOMENTUM: i32 = 5;
const W_FVG: i32 = 12;
const W_ZONE: i32 = 8;
const W_BREAKOUT: i32 = 15;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// Signed-axis scoring over the three timeframe roles.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    threshold: i32,
    breakout: BreakoutConfig,
}

struct Tally {
    value: i32,
    reasons: Vec<String>,
}

impl Tally {
    fn new() -> Self {
        Self {
            value: 0,
            reasons: Vec::new(),
        }
    }

    fn add(&mut self, delta: i32, reason: String) {
        self.value += delta;
        self.reasons.push(reason);
    }
}

impl ScoringEngine {
    pub fn new(threshold: i32, breakout: BreakoutConfig) -> Self {
        Self { threshold, breakout }
    }

    /// Fuse the three role frames plus structural state into a score.
    pub fn score(
        &self,
        htf: (Timeframe, Option<&IndicatorFrame>),
        mtf: (Timeframe, Option<&IndicatorFrame>),
        ltf: (Timeframe, Option<&IndicatorFrame>),
        gaps: &GapStore,
        zones: &ZoneStore,
    ) -> Score {
        let (htf_tf, htf_frame) = htf;
        let (mtf_tf, mtf_frame) = mtf;
        let (ltf_tf, ltf_frame) = ltf;

        // Fail closed when any required frame is absent.
        let (htf_frame, mtf_frame, ltf_frame) = match (htf_frame, mtf_frame, ltf_frame) {
            (Some(h), Some(m), Some(l)) if !h.is_empty() && !m.is_empty() && !l.is_empty() => {
                (h, m, l)
            }
            _ => return Score::hold(),
        };

        let mut tally = Tally::new();
        self.score_htf(htf_tf, htf_frame, &mut tally);
        self.score_mtf(mtf_tf, mtf_frame, &mut tally);
        self.score_ltf(ltf_tf, ltf_frame, &mut tally);
        self.score_structure(mtf_frame, gaps, zones, &mut tally);
        self.score_breakout(mtf_frame, &mut tally);

        let direction = if tally.value >= self.threshold {
            Direction::Buy
        } else if tally.value <= -self.threshold {
            Direction::Sell
        } else {
            Direction::Hold
        };

        Score {
            direction,
            value: tally.value,
            reasons: tally.reasons,
        }
    }

    // Trend role: RSI extremes, EMA stack alignment, MACD position.
    fn score_htf(&self, tf: Timeframe, frame: &IndicatorFrame, tally: &mut Tally) {
        let close = match frame.last_close() {
            Some(c) => c,
            None => return,
        };

        if let Some(rsi) = last(&frame.rsi14) {
            if rsi < RSI_OVERSOLD {
                tally.add(W_HTF_RSI, format!("HTF: RSI oversold ({tf})"));
            } else if rsi > RSI_OVERBOUGHT {
                tally.add(-W_HTF_RSI, format!("HTF: RSI overbought ({tf})"));
            }
        }

        if let (Some(ema20), Some(ema50)) = (last(&frame.ema20), last(&frame.ema50)) {
            if close > ema20 && ema20 > ema50 {
                tally.add(W_HTF_TREND, format!("HTF: strong uptrend ({tf})"));
            } else if close < ema20 && ema20 < ema50 {
                tally.add(-W_HTF_TREND, format!("HTF: strong downtrend ({tf})"));
            }
        }

        if let (Some(macd), Some(signal)) = (last(&frame.macd), last(&frame.macd_signal)) {
            if macd > signal && macd > 0.0 {
                tally.add(W_HTF_MACD, format!("HTF: MACD bullish ({tf})"));
            } else if macd < signal && macd < 0.0 {
                tally.add(-W_HTF_MACD, format!("HTF: MACD bearish ({tf})"));
            }
        }
    }

    // Main analysis role: oscillator extremes and band breaches.
    fn score_mtf(&self, tf: Timeframe, frame: &IndicatorFrame, tally: &mut Tally) {
        let close = match frame.last_close() {
            Some(c) => c,
            None => return,
        };

        if let Some(rsi) = last(&frame.rsi14) {
            if rsi < RSI_OVERSOLD {
                tally.add(W_MTF_RSI, format!("MTF: RSI oversold ({tf})"));
            } else if rsi > RSI_OVERBOUGHT {
                tally.add(-W_MTF_RSI, format!("MTF: RSI overbought ({tf})"));
            }
        }

        if let (Some(k), Some(d)) = (last(&frame.stoch_k), last(&frame.stoch_d)) {
            if k < 20.0 && k < d {
                tally.add(W_MTF_STOCH, format!("MTF: stochastic oversold ({tf})"));
            } else if k > 80.0 && k > d {
                tally.add(-W_MTF_STOCH, format!("MTF: stochastic overbought ({tf})"));
            }
        }

        if let (Some(hist), Some(hist_prev)) =
            (last(&frame.macd_histogram), prev(&frame.macd_histogram))
        {
            if hist > 0.0 && hist > hist_prev {
                tally.add(
                    W_MTF_MACD_HIST,
                    format!("MTF: MACD momentum increasing ({tf})"),
                );
            } else if hist < 0.0 && hist < hist_prev {
                tally.add(
                    -W_MTF_MACD_HIST,
                    format!("MTF: MACD momentum decreasing ({tf})"),
                );
            }
        }

        if let (Some(lower), Some(upper)) = (last(&frame.bb_lower), last(&frame.bb_upper)) {
            if close < lower {
                tally.add(W_MTF_BOLLINGER, format!("MTF: price below BB lower ({tf})"));
            } else if close > upper {
                tally.add(
                    -W_MTF_BOLLINGER,
                    format!("MTF: price above BB upper ({tf})"),
                );
            }
        }

        if let Some(williams) = last(&frame.williams_r) {
            if williams < -80.0 {
                tally.add(W_MTF_WILLIAMS, format!("MTF: Williams %R oversold ({tf})"));
            } else if williams > -20.0 {
                tally.add(
                    -W_MTF_WILLIAMS,
                    format!("MTF: Williams %R overbought ({tf})"),
                );
            }
        }

        if let Some(cci) = last(&frame.cci20) {
            if cci < -100.0 {
                tally.add(W_MTF_CCI, format!("MTF: CCI oversold ({tf})"));
            } else if cci > 100.0 {
                tally.add(-W_MTF_CCI, format!("MTF: CCI overbought ({tf})"));
            }
        }

        if let (Some(lower), Some(upper)) = (last(&frame.keltner_lower), last(&frame.keltner_upper))
        {
            if close < lower {
                tally.add(
                    W_MTF_KELTNER,
                    format!("MTF: price below Keltner lower ({tf})"),
                );
            } else if close > upper {
                tally.add(
                    -W_MTF_KELTNER,
                    format!("MTF: price above Keltner upper ({tf})"),
                );
            }
        }
    }

    // Refinement role: softer RSI bands and short-term MACD momentum.
    fn score_ltf(&self, tf: Timeframe, frame: &IndicatorFrame, tally: &mut Tally) {
        if let Some(rsi) = last(&frame.rsi14) {
            if rsi < 40.0 {
                tally.add(W_LTF_RSI, format!("LTF: RSI supportive ({tf})"));
            } else if rsi > 60.0 {
                tally.add(-W_LTF_RSI, format!("LTF: RSI resistive ({tf})"));
            }
        }

        if let (Some(macd), Some(macd_prev)) = (last(&frame.macd), prev(&frame.macd)) {
            if macd > macd_prev {
                tally.add(W_LTF_MOMENTUM, format!("LTF: quick momentum up ({tf})"));
            } else if macd < macd_prev {
                tally.add(-W_LTF_MOMENTUM, format!("LTF: quick momentum down ({tf})"));
            }
        }
    }

    // Structural context at the medium timeframe's last close.
    fn score_structure(
        &self,
        mtf_frame: &IndicatorFrame,
        gaps: &GapStore,
        zones: &ZoneStore,
        tally: &mut Tally,
    ) {
        let price = match mtf_frame.last_close() {
            Some(c) => c,
            None => return,
        };

        for gap in gaps.unfilled() {
            match gap.side {
                GapSide::Bull if price < gap.bottom => {
                    tally.add(W_FVG, "FVG: unfilled bullish gap overhead".to_string());
                }
                GapSide::Bear if price > gap.top => {
                    tally.add(-W_FVG, "FVG: unfilled bearish gap below".to_string());
                }
                _ => {}
            }
        }

        for zone in zones.strong_zones_at(price) {
            if price < zone.midpoint() {
                tally.add(
                    W_ZONE,
                    format!("SR: strong support zone (strength {})", zone.strength),
                );
            } else {
                tally.add(
                    -W_ZONE,
                    format!("SR: strong resistance zone (strength {})", zone.strength),
                );
            }
        }
    }

    fn score_breakout(&self, mtf_frame: &IndicatorFrame, tally: &mut Tally) {
        if is_breakout(&mtf_frame.candles, BreakoutDirection::Up, &self.breakout) {
            tally.add(W_BREAKOUT, "breakout: bullish range breakout".to_string());
        } else if is_breakout(&mtf_frame.candles, BreakoutDirection::Down, &self.breakout) {
            tally.add(-W_BREAKOUT, "breakout: bearish range breakout".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FvgConfig, ZoneConfig};
    use crate::fvg::FairValueGap;
    use signal_types::Candle;

    const HTF: Timeframe = Timeframe::M15;
    const MTF: Timeframe = Timeframe::M5;
    const LTF: Timeframe = Timeframe::M1;

    fn flat_candle(close: f64) -> Candle {
        Candle {
            timestamp: 0,
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            volume: 1.0,
        }
    }

    /// Frame where every indicator is undefined; individual tests set
    /// just the series they exercise.
    fn neutral_frame(len: usize, close: f64) -> IndicatorFrame {
        IndicatorFrame {
            candles: (0..len).map(|_| flat_candle(close)).collect(),
            rsi14: vec![None; len],
            stoch_k: vec![None; len],
            stoch_d: vec![None; len],
            macd: vec![None; len],
            macd_signal: vec![None; len],
            macd_histogram: vec![None; len],
            bb_upper: vec![None; len],
            bb_middle: vec![None; len],
            bb_lower: vec![None; len],
            atr10: vec![None; len],
            keltner_upper: vec![None; len],
            keltner_lower: vec![None; len],
            ema20: vec![None; len],
            ema50: vec![None; len],
            ema200: vec![None; len],
            williams_r: vec![None; len],
            cci20: vec![None; len],
            momentum10: vec![None; len],
        }
    }

    fn set_last(series: &mut [Option<f64>], value: f64) {
        let idx = series.len() - 1;
        series[idx] = Some(value);
    }

    fn engine(threshold: i32) -> ScoringEngine {
        ScoringEngine::new(threshold, BreakoutConfig::default())
    }

    fn empty_gaps() -> GapStore {
        GapStore::new(FvgConfig::default())
    }

    fn empty_zones() -> ZoneStore {
        ZoneStore::new("EURUSD-OTC", ZoneConfig::default())
    }

    #[test]
    fn fails_closed_when_any_frame_missing() {
        let frame = neutral_frame(3, 1.0);
        let score = engine(80).score(
            (HTF, Some(&frame)),
            (MTF, None),
            (LTF, Some(&frame)),
            &empty_gaps(),
            &empty_zones(),
        );
        assert_eq!(score, Score::hold());
    }

    #[test]
    fn neutral_frames_score_zero() {
        let frame = neutral_frame(3, 1.0);
        let score = engine(80).score(
            (HTF, Some(&frame)),
            (MTF, Some(&frame)),
            (LTF, Some(&frame)),
            &empty_gaps(),
            &empty_zones(),
        );
        assert_eq!(score.value, 0);
        assert_eq!(score.direction, Direction::Hold);
        assert!(score.reasons.is_empty());
    }

    #[test]
    fn htf_conditions_accumulate_bullish() {
        let mut htf = neutral_frame(3, 1.0);
        set_last(&mut htf.rsi14, 25.0); // +25
        set_last(&mut htf.ema20, 0.99); // close 1.0 > ema20 > ema50: +20
        set_last(&mut htf.ema50, 0.98);
        set_last(&mut htf.macd, 0.002); // above signal, above zero: +15
        set_last(&mut htf.macd_signal, 0.001);
        let neutral = neutral_frame(3, 1.0);

        let score = engine(40).score(
            (HTF, Some(&htf)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &empty_zones(),
        );

        assert_eq!(score.value, 60);
        assert_eq!(score.direction, Direction::Buy);
        assert_eq!(score.reasons.len(), 3);
        assert!(score.reasons[0].contains("RSI oversold"));
    }

    #[test]
    fn bearish_mirror_resolves_sell() {
        let mut htf = neutral_frame(3, 1.0);
        set_last(&mut htf.rsi14, 75.0); // -25
        set_last(&mut htf.ema20, 1.01); // downtrend: -20
        set_last(&mut htf.ema50, 1.02);
        let neutral = neutral_frame(3, 1.0);

        let score = engine(40).score(
            (HTF, Some(&htf)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &empty_zones(),
        );

        assert_eq!(score.value, -45);
        assert_eq!(score.direction, Direction::Sell);
    }

    #[test]
    fn below_threshold_resolves_hold() {
        let mut htf = neutral_frame(3, 1.0);
        set_last(&mut htf.rsi14, 25.0); // +25 only
        let neutral = neutral_frame(3, 1.0);

        let score = engine(40).score(
            (HTF, Some(&htf)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &empty_zones(),
        );

        assert_eq!(score.value, 25);
        assert_eq!(score.direction, Direction::Hold);
    }

    #[test]
    fn conflicting_conditions_cancel_on_signed_axis() {
        let mut htf = neutral_frame(3, 1.0);
        set_last(&mut htf.rsi14, 25.0); // +25
        set_last(&mut htf.ema20, 1.01); // downtrend: -20
        set_last(&mut htf.ema50, 1.02);
        let neutral = neutral_frame(3, 1.0);

        let score = engine(80).score(
            (HTF, Some(&htf)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &empty_zones(),
        );

        assert_eq!(score.value, 5);
        assert_eq!(score.reasons.len(), 2);
    }

    #[test]
    fn unfilled_gaps_contribute_with_direction_sign() {
        let neutral = neutral_frame(3, 1.0);
        let mut gaps = empty_gaps();
        gaps.absorb(vec![FairValueGap {
            instrument: "EURUSD-OTC".to_string(),
            timeframe: MTF,
            side: GapSide::Bull,
            top: 1.05,
            bottom: 1.10, // price 1.0 < bottom: overhead bull gap
            created_at: 0,
            filled: false,
        }]);

        let score = engine(80).score(
            (HTF, Some(&neutral)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &gaps,
            &empty_zones(),
        );
        assert_eq!(score.value, W_FVG);

        let mut bear_gaps = empty_gaps();
        bear_gaps.absorb(vec![FairValueGap {
            instrument: "EURUSD-OTC".to_string(),
            timeframe: MTF,
            side: GapSide::Bear,
            top: 0.90, // price 1.0 > top: bear gap below
            bottom: 0.95,
            created_at: 0,
            filled: false,
        }]);

        let score = engine(80).score(
            (HTF, Some(&neutral)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &bear_gaps,
            &empty_zones(),
        );
        assert_eq!(score.value, -W_FVG);
    }

    #[test]
    fn strong_zone_support_and_resistance_signs() {
        let neutral = neutral_frame(3, 1.0);
        let mut zones = empty_zones();
        // Build a strength-3 zone just above the price so 1.0 sits in the
        // lower half (support side).
        for _ in 0..3 {
            zones.cluster(&[1.0008], &[], 0);
        }

        let score = engine(80).score(
            (HTF, Some(&neutral)),
            (MTF, Some(&neutral)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &zones,
        );
        assert_eq!(score.value, W_ZONE);
        assert!(score.reasons[0].contains("support"));
    }

    #[test]
    fn breakout_contributes_on_mtf_series() {
        let mut mtf = neutral_frame(21, 1.0);
        let idx = mtf.candles.len() - 1;
        // Strong-bodied candle closing above the flat range high of 1.001.
        mtf.candles[idx] = Candle {
            timestamp: 0,
            open: 0.9995,
            high: 1.0020,
            low: 0.9995,
            close: 1.0015,
            volume: 1.0,
        };
        let neutral = neutral_frame(3, 1.0);

        let score = engine(80).score(
            (HTF, Some(&neutral)),
            (MTF, Some(&mtf)),
            (LTF, Some(&neutral)),
            &empty_gaps(),
            &empty_zones(),
        );
        assert_eq!(score.value, W_BREAKOUT);
        assert!(score.reasons[0].contains("bullish range breakout"));
    }

    #[test]
    fn identical_inputs_yield_identical_scores() {
        let mut htf = neutral_frame(3, 1.0);
        set_last(&mut htf.rsi14, 25.0);
        set_last(&mut htf.ema20, 0.99);
        set_last(&mut htf.ema50, 0.98);
        let mut mtf = neutral_frame(3, 1.0);
        set_last(&mut mtf.williams_r, -90.0);
        let ltf = neutral_frame(3, 1.0);

        let engine = engine(40);
        let first = engine.score(
            (HTF, Some(&htf)),
            (MTF, Some(&mtf)),
            (LTF, Some(&ltf)),
            &empty_gaps(),
            &empty_zones(),
        );
        let second = engine.score(
            (HTF, Some(&htf)),
            (MTF, Some(&mtf)),
            (LTF, Some(&ltf)),
            &empty_gaps(),
            &empty_zones(),
        );

        assert_eq!(first, second);
        assert_eq!(first.reasons, second.reasons);
    }
}
