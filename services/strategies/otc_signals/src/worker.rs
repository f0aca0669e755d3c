//! Per-instrument analysis worker
//!
//! One worker owns everything for one instrument: candle buffers,
//! structural stores, the debounce gate, its feed, and its sink. Nothing
//! is shared between instruments, so there is no cross-instrument
//! locking and a slow or failing instrument cannot stall the others.
//!
//! The cycle is fetch, ingest, evaluate, deliver. Every error reaching
//! the run loop is recoverable: the worker logs it, backs off, and
//! polls again. Only the shutdown channel ends a worker.

use crate::buffer::CandleAggregator;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::feed::CandleFeed;
use crate::fvg::{detect_gaps, GapStore};
use crate::gate::SignalGate;
use crate::indicators::{last, IndicatorPipeline};
use crate::scoring::ScoringEngine;
use crate::sink::{AlertSink, IndicatorReadout, SignalAlert};
use crate::zones::{detect_swing_points, ZoneStore};
use signal_types::{Candle, Direction, Score, Timeframe};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Per-worker counters, reported at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub cycles: u64,
    pub cycle_errors: u64,
    pub candles_accepted: u64,
    pub candles_rejected: u64,
    pub signals_emitted: u64,
    pub buy_signals: u64,
    pub sell_signals: u64,
    pub gated_signals: u64,
    pub delivery_failures: u64,
}

pub struct InstrumentWorker<F, S> {
    instrument: String,
    config: EngineConfig,
    aggregator: CandleAggregator,
    pipeline: IndicatorPipeline,
    scoring: ScoringEngine,
    gaps: GapStore,
    zones: ZoneStore,
    gate: SignalGate,
    feed: F,
    sink: S,
    stats: EngineStats,
    last_readout: Option<IndicatorReadout>,
}

impl<F: CandleFeed, S: AlertSink> InstrumentWorker<F, S> {
    pub fn new(instrument: impl Into<String>, config: EngineConfig, feed: F, sink: S) -> Self {
        let instrument = instrument.into();
        Self {
            aggregator: CandleAggregator::new(&instrument, config.market.candle_capacity),
            pipeline: IndicatorPipeline::new(config.market.min_history),
            scoring: ScoringEngine::new(config.scoring.signal_threshold, config.breakout.clone()),
            gaps: GapStore::new(config.fvg.clone()),
            zones: ZoneStore::new(&instrument, config.zones.clone()),
            gate: SignalGate::new(config.scoring.cooldown_secs),
            instrument,
            config,
            feed,
            sink,
            stats: EngineStats::default(),
            last_readout: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn gaps(&self) -> &GapStore {
        &self.gaps
    }

    pub fn zones(&self) -> &ZoneStore {
        &self.zones
    }

    /// Run until the shutdown channel flips to `true` or closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(instrument = %self.instrument, "worker started");
        let mut delay = std::time::Duration::ZERO;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    let now = unix_now();
                    delay = match self.cycle(now).await {
                        Ok(_) => self.config.poll_interval(),
                        Err(e) => {
                            self.stats.cycle_errors += 1;
                            warn!(
                                instrument = %self.instrument,
                                error = %e,
                                recoverable = e.is_recoverable(),
                                "cycle failed, backing off"
                            );
                            self.config.error_backoff()
                        }
                    };
                }
            }
        }

        info!(
            instrument = %self.instrument,
            cycles = self.stats.cycles,
            errors = self.stats.cycle_errors,
            signals = self.stats.signals_emitted,
            gated = self.stats.gated_signals,
            rejected = self.stats.candles_rejected,
            "worker stopped"
        );
    }

    /// One full fetch-ingest-evaluate-deliver pass.
    pub async fn cycle(&mut self, now: u64) -> Result<Option<SignalAlert>> {
        self.stats.cycles += 1;

        let fetch = self.feed.fetch(&self.instrument);
        let batch = timeout(
            std::time::Duration::from_secs(self.config.market.feed_timeout_secs),
            fetch,
        )
        .await
        .map_err(|_| EngineError::FeedTimeout {
            instrument: self.instrument.clone(),
        })??;

        self.ingest(batch);

        let (score, price) = self.evaluate(now);
        match price {
            Some(price) => self.deliver(score, price, now).await,
            None => Ok(None),
        }
    }

    /// Route a fetched batch into the buffers. A malformed candle is
    /// dropped and counted; it never aborts the batch.
    pub fn ingest(&mut self, batch: Vec<(Timeframe, Candle)>) {
        for (timeframe, candle) in batch {
            match self.aggregator.append(timeframe, candle) {
                Ok(()) => self.stats.candles_accepted += 1,
                Err(_) => self.stats.candles_rejected += 1,
            }
        }
    }

    /// Update structural stores and compute the current score. Returns
    /// the score plus the medium-timeframe reference price, `None` until
    /// the first medium-timeframe candle arrives.
    pub fn evaluate(&mut self, now: u64) -> (Score, Option<f64>) {
        let [high, medium, low] = self.config.role_timeframes();
        let mtf_snapshot = self.aggregator.snapshot(medium);
        let price = self.aggregator.last_close(medium);

        // Structural state lives on the medium timeframe and is only
        // maintained once that buffer is warm, matching the indicator
        // warm-up threshold.
        if mtf_snapshot.len() >= self.config.market.min_history {
            self.gaps.absorb(detect_gaps(
                &self.instrument,
                medium,
                &mtf_snapshot,
                self.config.fvg.scan_bars,
                now,
            ));
            if let Some(price) = price {
                self.gaps.fill_at(price);
            }

            let (swing_highs, swing_lows) =
                detect_swing_points(&mtf_snapshot, self.config.zones.swing_lookback);
            self.zones.cluster(&swing_highs, &swing_lows, now);
            self.zones.prune(now);
        }

        let htf_frame = self.pipeline.compute(&self.aggregator.snapshot(high));
        let mtf_frame = self.pipeline.compute(&mtf_snapshot);
        let ltf_frame = self.pipeline.compute(&self.aggregator.snapshot(low));

        self.last_readout = mtf_frame.as_ref().map(|frame| IndicatorReadout {
            rsi: last(&frame.rsi14),
            stoch_k: last(&frame.stoch_k),
            stoch_d: last(&frame.stoch_d),
            macd: last(&frame.macd),
            williams_r: last(&frame.williams_r),
            cci: last(&frame.cci20),
        });

        let score = self.scoring.score(
            (high, htf_frame.as_ref()),
            (medium, mtf_frame.as_ref()),
            (low, ltf_frame.as_ref()),
            &self.gaps,
            &self.zones,
        );
        (score, price)
    }

    /// Emit an actionable score through the sink, honoring the debounce
    /// gate. The gate is armed only after the sink confirms delivery, so
    /// a failed emission does not consume the cooldown.
    pub async fn deliver(&mut self, score: Score, price: f64, now: u64) -> Result<Option<SignalAlert>> {
        if !score.is_actionable() {
            return Ok(None);
        }
        if !self.gate.allows(now) {
            self.stats.gated_signals += 1;
            debug!(
                instrument = %self.instrument,
                direction = %score.direction,
                value = score.value,
                "signal suppressed by cooldown"
            );
            return Ok(None);
        }

        let alert = SignalAlert {
            instrument: self.instrument.clone(),
            direction: score.direction,
            value: score.value,
            price,
            timestamp: now,
            roles: self.config.role_timeframes(),
            reasons: score.reasons,
            readout: self.last_readout,
        };

        match self.sink.emit(&alert).await {
            Ok(()) => {
                self.gate.record(now);
                self.stats.signals_emitted += 1;
                match alert.direction {
                    Direction::Buy => self.stats.buy_signals += 1,
                    Direction::Sell => self.stats.sell_signals += 1,
                    Direction::Hold => {}
                }
                info!(
                    instrument = %self.instrument,
                    direction = %alert.direction,
                    value = alert.value,
                    "signal emitted"
                );
                Ok(Some(alert))
            }
            Err(e) => {
                self.stats.delivery_failures += 1;
                Err(e)
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedFeed {
        batches: VecDeque<Vec<(Timeframe, Candle)>>,
    }

    #[async_trait]
    impl CandleFeed for ScriptedFeed {
        async fn fetch(&mut self, _instrument: &str) -> Result<Vec<(Timeframe, Candle)>> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    struct StalledFeed;

    #[async_trait]
    impl CandleFeed for StalledFeed {
        async fn fetch(&mut self, _instrument: &str) -> Result<Vec<(Timeframe, Candle)>> {
            std::future::pending().await
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        alerts: Arc<Mutex<Vec<SignalAlert>>>,
        fail: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn emit(&mut self, alert: &SignalAlert) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(EngineError::Sink {
                    instrument: alert.instrument.clone(),
                    message: "delivery refused".to_string(),
                });
            }
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn candle(timestamp: u64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            volume: 100.0,
        }
    }

    fn worker(
        batches: Vec<Vec<(Timeframe, Candle)>>,
        config: EngineConfig,
    ) -> (InstrumentWorker<ScriptedFeed, RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        let feed = ScriptedFeed {
            batches: batches.into(),
        };
        let worker = InstrumentWorker::new("EURUSD-OTC", config, feed, sink.clone());
        (worker, sink)
    }

    fn buy_score(value: i32) -> Score {
        Score {
            direction: Direction::Buy,
            value,
            reasons: vec!["HTF: strong uptrend (15m)".to_string()],
        }
    }

    #[tokio::test]
    async fn warm_up_cycles_hold() {
        let batch = vec![
            (Timeframe::M5, candle(300, 1.1)),
            (Timeframe::M1, candle(60, 1.1)),
        ];
        let (mut worker, sink) = worker(vec![batch], EngineConfig::default());

        let emitted = worker.cycle(1_000).await.unwrap();
        assert!(emitted.is_none());
        assert!(sink.alerts.lock().unwrap().is_empty());
        assert_eq!(worker.stats().candles_accepted, 2);
    }

    #[tokio::test]
    async fn malformed_candle_dropped_without_aborting_batch() {
        let bad = Candle {
            timestamp: 60,
            open: 1.0,
            high: 0.9,
            low: 0.8,
            close: 0.95,
            volume: 1.0,
        };
        let batch = vec![
            (Timeframe::M5, bad),
            (Timeframe::M5, candle(300, 1.1)),
        ];
        let (mut worker, _) = worker(vec![batch], EngineConfig::default());

        worker.cycle(1_000).await.unwrap();
        assert_eq!(worker.stats().candles_rejected, 1);
        assert_eq!(worker.stats().candles_accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_feed_times_out() {
        let mut worker = InstrumentWorker::new(
            "EURUSD-OTC",
            EngineConfig::default(),
            StalledFeed,
            RecordingSink::default(),
        );

        let err = worker.cycle(1_000).await.unwrap_err();
        assert!(matches!(err, EngineError::FeedTimeout { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn cooldown_debounces_repeat_signals() {
        let mut config = EngineConfig::default();
        config.scoring.cooldown_secs = 180;
        let (mut worker, sink) = worker(vec![], config);

        // First emission goes out and arms the gate.
        let first = worker.deliver(buy_score(85), 1.1, 1_000).await.unwrap();
        assert!(first.is_some());

        // 60 seconds later the same condition is suppressed.
        let second = worker.deliver(buy_score(85), 1.1, 1_060).await.unwrap();
        assert!(second.is_none());

        // Past the cooldown it emits again.
        let third = worker.deliver(buy_score(85), 1.1, 1_200).await.unwrap();
        assert!(third.is_some());

        assert_eq!(sink.alerts.lock().unwrap().len(), 2);
        assert_eq!(worker.stats().signals_emitted, 2);
        assert_eq!(worker.stats().buy_signals, 2);
        assert_eq!(worker.stats().gated_signals, 1);
    }

    #[tokio::test]
    async fn emitted_alert_carries_role_timeframes() {
        let (mut worker, sink) = worker(vec![], EngineConfig::default());
        worker.deliver(buy_score(85), 1.1, 1_000).await.unwrap();

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(
            alerts[0].roles,
            [Timeframe::M15, Timeframe::M5, Timeframe::M1]
        );
    }

    #[test]
    fn structural_stores_wait_for_warm_history() {
        let (mut worker, _) = worker(vec![], EngineConfig::default());

        // A steady 0.01 decline per 5m bar leaves a bearish 3-candle gap
        // behind every bar, so detection would fire on each pass if the
        // store were maintained this early.
        let declining = |i: u64| (Timeframe::M5, candle(300 * (i + 1), 1.2 - 0.01 * i as f64));

        worker.ingest((0..30).map(declining).collect());
        worker.evaluate(9_000);
        assert!(worker.gaps().is_empty());

        worker.ingest((30..55).map(declining).collect());
        worker.evaluate(17_000);
        assert!(!worker.gaps().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_does_not_consume_cooldown() {
        let (mut worker, sink) = worker(vec![], EngineConfig::default());

        *sink.fail.lock().unwrap() = true;
        let err = worker.deliver(buy_score(85), 1.1, 1_000).await.unwrap_err();
        assert!(matches!(err, EngineError::Sink { .. }));
        assert_eq!(worker.stats().delivery_failures, 1);

        // The gate was never armed, so the retry on the next cycle emits.
        *sink.fail.lock().unwrap() = false;
        let retry = worker.deliver(buy_score(85), 1.1, 1_045).await.unwrap();
        assert!(retry.is_some());
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hold_scores_are_never_delivered() {
        let (mut worker, sink) = worker(vec![], EngineConfig::default());
        let emitted = worker.deliver(Score::hold(), 1.1, 1_000).await.unwrap();
        assert!(emitted.is_none());
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_channel_stops_the_run_loop() {
        let (worker_handle, _) = worker(vec![], EngineConfig::default());
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(worker_handle.run(rx));

        tx.send(true).unwrap();
        join.await.unwrap();
    }
}
