//! Step-by-step replay of a trade tape for backtesting.
//!
//! A [ReplayDriver] owns a replay [SeriesCache] and a [Strategy]. Each step consumes one trade:
//! the strategy is told about every cached candle the trade closes, the trade is folded into
//! the cache, and then the strategy sees the tick. The cache never sees a trade before the
//! strategy has been told about the candles it closes, so there is no lookahead.
//!
//! Stepping through the whole tape leaves the cache in the same state as building the same
//! series cold from the full tape, however the steps are batched.
use std::collections::HashMap;

use log::info;

use crate::cache::SeriesCache;
use crate::error::CacheError;
use crate::input::tape::{Trade, TradeTape};
use crate::options::Options;
use crate::series::FieldSeries;
use crate::strategy::Strategy;

/// Pseudo-indicator resolving to the strategy's own decisions.
pub const STRATEGY: &str = "STRATEGY";

/// Position in a trade tape, with the timestamps of the trades consumed before it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayCursor {
    position: usize,
    latest: Option<i64>,
    last_seen: HashMap<String, i64>,
}

impl ReplayCursor {
    pub fn start() -> Self {
        Self::default()
    }

    /// Cursor that has already consumed all of `tape`.
    pub fn at_end(tape: &TradeTape) -> Self {
        let mut cursor = Self::start();
        for trade in tape.trades() {
            cursor.consume(trade);
        }
        cursor
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn latest(&self) -> Option<i64> {
        self.latest
    }

    pub fn last_seen(&self, symbol: &str) -> Option<i64> {
        self.last_seen.get(symbol).copied()
    }

    pub(crate) fn consume(&mut self, trade: &Trade) {
        self.position += 1;
        self.latest = Some(trade.timestamp);
        self.last_seen.insert(trade.symbol.clone(), trade.timestamp);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayState {
    /// No trade consumed yet.
    Idle,
    Primed,
}

#[derive(Debug)]
pub struct ReplayDriver<S: Strategy> {
    cache: SeriesCache,
    strategy: S,
    state: ReplayState,
    end: Option<i64>,
}

impl<S: Strategy> ReplayDriver<S> {
    pub fn new(tape: TradeTape, strategy: S) -> Self {
        Self {
            cache: SeriesCache::replay(tape),
            strategy,
            state: ReplayState::Idle,
            end: None,
        }
    }

    /// Replays only the trades with `start <= timestamp <= end`.
    pub fn with_window(
        tape: TradeTape,
        strategy: S,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Self {
        let windowed = tape.window(start, end);
        info!(
            "REPLAY: Window {:?} to {:?} keeps {} of {} trades",
            start,
            end,
            windowed.len(),
            tape.len()
        );
        Self {
            cache: SeriesCache::replay(windowed),
            strategy,
            state: ReplayState::Idle,
            end,
        }
    }

    /// Consumes up to `steps` trades. Returns whether any trade was consumed.
    ///
    /// A failure stops the batch where it happened. Trades consumed before it stay consumed, and
    /// so does the current one when `on_tick` fails, so [ReplayDriver::cursor] tells how far the
    /// replay got.
    pub fn step(&mut self, steps: usize) -> Result<bool, CacheError> {
        let mut consumed = false;
        for _ in 0..steps {
            let Some(trade) = self.cache.peek_next().cloned() else {
                break;
            };
            for period in self.cache.sealed_periods(&trade) {
                self.strategy
                    .on_candle_close(&mut self.cache, &trade.symbol, period)?;
            }
            self.cache.advance()?;
            self.state = ReplayState::Primed;
            consumed = true;
            self.strategy.on_tick(&mut self.cache, &trade)?;
        }
        Ok(consumed)
    }

    /// Steps one trade at a time until the tape is exhausted. Returns the number of trades
    /// consumed.
    pub fn run(&mut self) -> Result<usize, CacheError> {
        let start = self.cache.cursor();
        while self.step(1)? {}
        let consumed = self.cache.cursor() - start;
        info!("REPLAY: Finished after {} trades", consumed);
        Ok(consumed)
    }

    /// Series from the cache, or the strategy's decisions for [STRATEGY].
    pub fn get(
        &mut self,
        symbol: &str,
        indicator: &str,
        period: i64,
        options: &Options,
    ) -> Result<&FieldSeries, CacheError> {
        if indicator.eq_ignore_ascii_case(STRATEGY) {
            return self
                .strategy
                .decisions()
                .ok_or_else(|| CacheError::UnknownIndicator {
                    name: indicator.to_string(),
                });
        }
        self.cache.get(symbol, indicator, period, options)
    }

    /// Timestamp of the last consumed trade for `symbol`. Before the first step this is the
    /// end of the replay window, if there is one.
    pub fn max_timestamp(&self, symbol: &str) -> Option<i64> {
        match self.state {
            ReplayState::Idle => self.end,
            ReplayState::Primed => self.cache.max_timestamp(symbol),
        }
    }

    /// Timestamp of the last consumed trade of any symbol, the window end before the first step.
    pub fn latest_timestamp(&self) -> Option<i64> {
        match self.state {
            ReplayState::Idle => self.end,
            ReplayState::Primed => self.cache.latest_timestamp(),
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.cache.is_exhausted()
    }

    pub fn cursor(&self) -> usize {
        self.cache.cursor()
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::{ReplayCursor, ReplayDriver, ReplayState};
    use crate::cache::SeriesCache;
    use crate::error::CacheError;
    use crate::input::tape::{Trade, TradeTape};
    use crate::options::Options;
    use crate::series::FieldSeries;
    use crate::strategy::{DecisionLog, NoopStrategy, Strategy};

    fn tape() -> TradeTape {
        TradeTape::from_trades(vec![
            Trade::new("BTC", 0, 100.0, 1.0),
            Trade::new("BTC", 30, 101.0, 1.0),
            Trade::new("BTC", 70, 99.0, 2.0),
            Trade::new("BTC", 130, 98.0, 1.0),
        ])
        .unwrap()
    }

    /// Records what the cache looked like at each callback.
    #[derive(Default)]
    struct Recorder {
        closes: Vec<(i64, Option<i64>)>,
        ticks: Vec<(i64, Option<i64>)>,
        log: DecisionLog,
    }

    impl Strategy for Recorder {
        fn on_tick(&mut self, cache: &mut SeriesCache, trade: &Trade) -> Result<(), CacheError> {
            let last = cache
                .get(&trade.symbol, "OHLCV", 60, &Options::new())?
                .last_timestamp();
            self.ticks.push((trade.timestamp, last));
            Ok(())
        }

        fn on_candle_close(
            &mut self,
            cache: &mut SeriesCache,
            symbol: &str,
            period: i64,
        ) -> Result<(), CacheError> {
            let ohlcv = cache.get(symbol, "OHLCV", period, &Options::new())?;
            let last = ohlcv.last_timestamp();
            let close = ohlcv.last_row().and_then(|row| row.values.get(3).copied());
            self.closes.push((period, last));
            if let (Some(timestamp), Some(close)) = (last, close) {
                self.log.record(timestamp, close, 1.0);
            }
            Ok(())
        }

        fn decisions(&self) -> Option<&FieldSeries> {
            Some(self.log.series())
        }
    }

    #[test]
    fn test_that_candle_close_is_seen_before_fold() {
        let mut driver = ReplayDriver::new(tape(), Recorder::default());
        driver.run().unwrap();

        let strategy = driver.strategy();
        assert_eq!(strategy.closes, vec![(60, Some(0)), (60, Some(60))]);
        assert_eq!(
            strategy.ticks,
            vec![
                (0, Some(0)),
                (30, Some(0)),
                (70, Some(60)),
                (130, Some(120))
            ]
        );
    }

    struct FailingTick {
        at: i64,
    }

    impl Strategy for FailingTick {
        fn on_tick(&mut self, cache: &mut SeriesCache, trade: &Trade) -> Result<(), CacheError> {
            if trade.timestamp == self.at {
                cache.get(&trade.symbol, "FOO", 60, &Options::new())?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_that_failed_step_leaves_cursor_after_consumed_trades() {
        let mut driver = ReplayDriver::new(tape(), FailingTick { at: 70 });
        assert!(matches!(
            driver.step(4),
            Err(CacheError::UnknownIndicator { .. })
        ));
        assert_eq!(driver.cursor(), 3);
        assert_eq!(driver.max_timestamp("BTC"), Some(70));
        assert!(driver.step(4).unwrap());
        assert_eq!(driver.cursor(), 4);
    }

    #[test]
    fn test_that_step_reports_exhaustion() {
        let mut driver = ReplayDriver::new(tape(), NoopStrategy);
        assert_eq!(driver.state(), ReplayState::Idle);
        assert!(driver.step(3).unwrap());
        assert_eq!(driver.state(), ReplayState::Primed);
        assert_eq!(driver.cursor(), 3);
        assert!(driver.step(10).unwrap());
        assert!(driver.is_exhausted());
        assert!(!driver.step(1).unwrap());
        assert_eq!(driver.cursor(), 4);
    }

    #[test]
    fn test_that_strategy_series_resolves_to_decisions() {
        let mut driver = ReplayDriver::new(tape(), Recorder::default());
        driver.run().unwrap();
        let decisions = driver.get("BTC", "strategy", 60, &Options::new()).unwrap();
        assert_eq!(decisions.timestamps(), &[0, 60]);

        let mut noop = ReplayDriver::new(tape(), NoopStrategy);
        assert!(noop.get("BTC", "STRATEGY", 60, &Options::new()).is_err());
    }

    #[test]
    fn test_that_idle_max_timestamp_is_window_end() {
        let mut driver = ReplayDriver::with_window(tape(), NoopStrategy, Some(30), Some(100));
        assert_eq!(driver.max_timestamp("BTC"), Some(100));
        driver.step(1).unwrap();
        assert_eq!(driver.max_timestamp("BTC"), Some(30));
        assert_eq!(driver.run().unwrap(), 1);
        assert_eq!(driver.max_timestamp("BTC"), Some(70));
        assert_eq!(driver.latest_timestamp(), Some(70));

        let unbounded = ReplayDriver::new(tape(), NoopStrategy);
        assert_eq!(unbounded.max_timestamp("BTC"), None);
    }

    #[test]
    fn test_that_cursor_at_end_has_seen_every_symbol() {
        let mut tape = tape();
        tape.push(Trade::new("ETH", 10, 5.0, 1.0)).unwrap();
        let cursor = ReplayCursor::at_end(&tape);
        assert_eq!(cursor.position(), 5);
        assert_eq!(cursor.latest(), Some(10));
        assert_eq!(cursor.last_seen("BTC"), Some(130));
        assert_eq!(cursor.last_seen("ETH"), Some(10));
        assert_eq!(ReplayCursor::start().last_seen("BTC"), None);
    }
}
