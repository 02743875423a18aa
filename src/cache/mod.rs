//! Lazily built, incrementally refreshed series keyed by symbol, indicator, period and options.
//!
//! A [SeriesCache] owns a [TradeTape] and a cursor into it. Everything before the cursor is the
//! history the cache has seen: a cold OHLCV build folds that prefix in one pass, and every trade
//! that moves the cursor forward is folded into the OHLCV entries already cached for its symbol.
//! Indicator entries are derived from the OHLCV entry for the same (symbol, period) and are
//! recomputed in full whenever that entry changes, before the call that changed it returns.
//!
//! A live cache starts with its cursor at the end of the tape and moves it with
//! [SeriesCache::ingest]. A replay cache starts at zero and is moved by
//! [ReplayDriver](crate::replay::ReplayDriver).
use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::aggregator;
use crate::error::CacheError;
use crate::indicator::{self, Indicator};
use crate::input::tape::{Trade, TradeTape};
use crate::options::{Fingerprint, Options};
use crate::replay::ReplayCursor;
use crate::series::FieldSeries;

pub mod bounded;

pub use bounded::BoundedCache;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub indicator: Indicator,
    pub period: i64,
    pub fingerprint: Fingerprint,
}

impl SeriesKey {
    /// OHLCV ignores options so there is one entry per (symbol, period).
    pub fn ohlcv(symbol: &str, period: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            indicator: Indicator::Ohlcv,
            period,
            fingerprint: Options::new().fingerprint(),
        }
    }

    pub fn is_ohlcv(&self) -> bool {
        self.indicator == Indicator::Ohlcv
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.symbol, self.indicator, self.period, self.fingerprint
        )
    }
}

#[derive(Debug)]
pub struct SeriesCache {
    tape: TradeTape,
    cursor: ReplayCursor,
    entries: HashMap<SeriesKey, FieldSeries>,
    builds: usize,
}

impl SeriesCache {
    /// Cache over the whole of `tape`, extended with [SeriesCache::ingest].
    pub fn live(tape: TradeTape) -> Self {
        Self {
            cursor: ReplayCursor::at_end(&tape),
            tape,
            entries: HashMap::new(),
            builds: 0,
        }
    }

    /// Cache that has seen none of `tape` yet.
    pub fn replay(tape: TradeTape) -> Self {
        Self {
            tape,
            cursor: ReplayCursor::start(),
            entries: HashMap::new(),
            builds: 0,
        }
    }

    pub fn get(
        &mut self,
        symbol: &str,
        indicator: &str,
        period: i64,
        options: &Options,
    ) -> Result<&FieldSeries, CacheError> {
        let indicator = Indicator::parse(indicator)?;
        self.get_indicator(symbol, indicator, period, options)
    }

    pub fn get_indicator(
        &mut self,
        symbol: &str,
        indicator: Indicator,
        period: i64,
        options: &Options,
    ) -> Result<&FieldSeries, CacheError> {
        let key = self.key(symbol, indicator, period, options)?;
        if !self.entries.contains_key(&key) {
            let series = self.build(&key, options)?;
            self.entries.insert(key.clone(), series);
        }
        match self.entries.get(&key) {
            Some(series) => Ok(series),
            None => {
                debug_assert!(false, "{key} missing after insert");
                Err(CacheError::Consistency {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Validates a request and returns the key it would be cached under.
    pub fn key(
        &self,
        symbol: &str,
        indicator: Indicator,
        period: i64,
        options: &Options,
    ) -> Result<SeriesKey, CacheError> {
        if period <= 0 || period > aggregator::MAX_PERIOD {
            return Err(CacheError::InvalidPeriod { period });
        }
        indicator.params(options)?;
        if indicator == Indicator::Ohlcv {
            return Ok(SeriesKey::ohlcv(symbol, period));
        }
        Ok(SeriesKey {
            symbol: symbol.to_string(),
            indicator,
            period,
            fingerprint: options.fingerprint(),
        })
    }

    fn build(&mut self, key: &SeriesKey, options: &Options) -> Result<FieldSeries, CacheError> {
        let series = if key.is_ohlcv() {
            aggregator::build(key.period, &key.symbol, &self.tape.trades()[..self.cursor.position()])
        } else {
            let ohlcv =
                self.get_indicator(&key.symbol, Indicator::Ohlcv, key.period, &Options::new())?;
            indicator::compute(key.indicator, ohlcv, options)?.series
        };
        self.builds += 1;
        debug!("CACHE: Built {} with {} rows", key, series.len());
        Ok(series)
    }

    /// Entry for `key` if it has been built.
    pub fn entry(&self, key: &SeriesKey) -> Option<&FieldSeries> {
        self.entries.get(key)
    }

    /// Drops an entry. Dropping an OHLCV entry drops the indicators derived from it as well.
    pub fn evict(&mut self, key: &SeriesKey) -> Option<FieldSeries> {
        let removed = self.entries.remove(key)?;
        if key.is_ohlcv() {
            self.entries
                .retain(|other, _| !(other.symbol == key.symbol && other.period == key.period));
        }
        debug!("CACHE: Evicted {}", key);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.entries.keys()
    }

    /// Number of cold builds so far. Refreshes after new trades are not counted.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn tape(&self) -> &TradeTape {
        &self.tape
    }

    /// Position of the next unseen trade on the tape.
    pub fn cursor(&self) -> usize {
        self.cursor.position()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.position() >= self.tape.len()
    }

    pub fn peek_next(&self) -> Option<&Trade> {
        self.tape.get(self.cursor.position())
    }

    /// Timestamp of the last trade seen for `symbol`.
    pub fn max_timestamp(&self, symbol: &str) -> Option<i64> {
        self.cursor.last_seen(symbol)
    }

    /// Timestamp of the last trade seen for any symbol.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.cursor.latest()
    }

    /// Periods of the cached candles for the trade's symbol that `trade` would close, ascending.
    pub fn sealed_periods(&self, trade: &Trade) -> Vec<i64> {
        let mut periods: Vec<i64> = self
            .entries
            .iter()
            .filter(|(key, series)| {
                key.is_ohlcv()
                    && key.symbol == trade.symbol
                    && aggregator::seals(series, key.period, trade.timestamp)
            })
            .map(|(key, _)| key.period)
            .collect();
        periods.sort_unstable();
        periods
    }

    /// Appends a trade to the tape. A cache that has seen the whole tape consumes it straight
    /// away, one that is behind only queues it.
    pub fn ingest(&mut self, trade: Trade) -> Result<(), CacheError> {
        let caught_up = self.is_exhausted();
        self.tape.push(trade)?;
        if caught_up {
            self.advance()?;
        }
        Ok(())
    }

    /// Consumes the next trade on the tape. Returns the trade, or `None` once the tape is
    /// exhausted.
    pub fn advance(&mut self) -> Result<Option<Trade>, CacheError> {
        let Some(trade) = self.peek_next().cloned() else {
            return Ok(None);
        };
        self.cursor.consume(&trade);
        self.apply(&trade)?;
        Ok(Some(trade))
    }

    fn apply(&mut self, trade: &Trade) -> Result<(), CacheError> {
        let mut touched = Vec::new();
        for (key, series) in self.entries.iter_mut() {
            if key.is_ohlcv() && key.symbol == trade.symbol {
                aggregator::add_trade(series, key.period, trade);
                touched.push(key.period);
            }
        }
        if touched.is_empty() {
            return Ok(());
        }
        self.refresh(&trade.symbol, &touched)
    }

    fn refresh(&mut self, symbol: &str, periods: &[i64]) -> Result<(), CacheError> {
        let stale: Vec<SeriesKey> = self
            .entries
            .keys()
            .filter(|key| {
                !key.is_ohlcv() && key.symbol == symbol && periods.contains(&key.period)
            })
            .cloned()
            .collect();

        for key in stale {
            let ohlcv_key = SeriesKey::ohlcv(symbol, key.period);
            let (Some(ohlcv), Some(current)) =
                (self.entries.get(&ohlcv_key), self.entries.get(&key))
            else {
                debug_assert!(false, "{key} has no candles to refresh from");
                return Err(CacheError::Consistency {
                    key: key.to_string(),
                });
            };
            let options = current.options().clone();
            let computed = indicator::compute(key.indicator, ohlcv, &options)?;
            self.entries.insert(key, computed.series);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SeriesCache, SeriesKey};
    use crate::error::CacheError;
    use crate::indicator::Indicator;
    use crate::input::tape::{Trade, TradeTape};
    use crate::options::Options;
    use crate::series::{Field, FieldSeries, Layout};

    fn tape() -> TradeTape {
        TradeTape::from_trades(vec![
            Trade::new("BTC", 0, 100.0, 1.0),
            Trade::new("BTC", 30, 101.0, 1.0),
            Trade::new("BTC", 70, 99.0, 2.0),
        ])
        .unwrap()
    }

    fn rising(count: i64) -> TradeTape {
        TradeTape::from_trades((0..count).map(|i| Trade::new("ABC", i * 60, 100.0 + i as f64, 1.0)))
            .unwrap()
    }

    #[test]
    fn test_that_ohlcv_is_built_from_history() {
        let mut cache = SeriesCache::live(tape());
        let series = cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        assert_eq!(series.timestamps(), &[0, 60]);
        assert_eq!(
            series.row(0).unwrap().values,
            &[100.0, 101.0, 100.0, 101.0, 2.0]
        );
        assert_eq!(
            series.row(60).unwrap().values,
            &[99.0, 99.0, 99.0, 99.0, 2.0]
        );
    }

    #[test]
    fn test_that_equal_requests_share_one_entry() {
        let mut cache = SeriesCache::live(rising(50));
        let first = Options::new()
            .with("fastPeriod", 3)
            .with("slowPeriod", 6)
            .with("signalPeriod", 2);
        let second = Options::new()
            .with("signalPeriod", 2)
            .with("slowPeriod", 6)
            .with("fastPeriod", 3);

        let ptr = cache.get("ABC", "MACD", 60, &first).unwrap() as *const FieldSeries;
        let builds = cache.builds();
        let again = cache.get("ABC", "macd", 60, &second).unwrap() as *const FieldSeries;
        assert_eq!(ptr, again);
        assert_eq!(cache.builds(), builds);
        // MACD and its OHLCV
        assert_eq!(builds, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_that_ohlcv_options_do_not_split_entries() {
        let mut cache = SeriesCache::live(tape());
        cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        cache
            .get("BTC", "OHLCV", 60, &Options::new().with("period", 3))
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn test_that_empty_history_gives_empty_series() {
        let mut cache = SeriesCache::live(TradeTape::new());
        let series = cache
            .get("XYZ", "SMA", 10, &Options::new().with("period", 5))
            .unwrap();
        assert!(series.is_empty());
        assert_eq!(series.layout(), Layout::Value);
    }

    #[test]
    fn test_that_configuration_errors_leave_cache_untouched() {
        let mut cache = SeriesCache::live(tape());
        assert_eq!(
            cache.get("BTC", "FOO", 60, &Options::new()).unwrap_err(),
            CacheError::UnknownIndicator {
                name: "FOO".to_string()
            }
        );
        assert_eq!(
            cache.get("BTC", "SMA", 0, &Options::new().with("period", 5)).unwrap_err(),
            CacheError::InvalidPeriod { period: 0 }
        );
        assert_eq!(
            cache.get("BTC", "OHLCV", i64::MAX, &Options::new()).unwrap_err(),
            CacheError::InvalidPeriod { period: i64::MAX }
        );
        assert!(cache.get("BTC", "SMA", 60, &Options::new()).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_that_ingest_refreshes_dependent_indicators() {
        let mut cache = SeriesCache::live(rising(10));
        let options = Options::new().with("period", 3);
        let before = cache.get("ABC", "SMA", 60, &options).unwrap().len();
        let builds = cache.builds();

        cache.ingest(Trade::new("ABC", 600, 200.0, 1.0)).unwrap();
        let sma = cache.get("ABC", "SMA", 60, &options).unwrap();
        assert_eq!(sma.len(), before + 1);
        assert_eq!(sma.value(600, Field::Value), Some((108.0 + 109.0 + 200.0) / 3.0));
        assert_eq!(cache.builds(), builds);
        assert_eq!(cache.max_timestamp("ABC"), Some(600));
    }

    #[test]
    fn test_that_ingest_updates_open_candle_in_place() {
        let mut cache = SeriesCache::live(tape());
        cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        cache.ingest(Trade::new("BTC", 90, 105.0, 0.5)).unwrap();
        let series = cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.value(60, Field::High), Some(105.0));
        assert_eq!(series.value(60, Field::Volume), Some(2.5));
    }

    #[test]
    fn test_that_out_of_order_ingest_is_rejected() {
        let mut cache = SeriesCache::live(tape());
        cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        let res = cache.ingest(Trade::new("BTC", 10, 1.0, 1.0));
        assert!(matches!(res, Err(CacheError::OutOfOrder { .. })));
        assert_eq!(cache.tape().len(), 3);
        let series = cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        assert_eq!(series.value(0, Field::Close), Some(101.0));
    }

    #[test]
    fn test_that_non_finite_ingest_leaves_indicators_clean() {
        let mut cache = SeriesCache::live(tape());
        let options = Options::new().with("period", 1);
        cache.get("BTC", "SMA", 60, &options).unwrap();

        let res = cache.ingest(Trade::new("BTC", 80, f64::NAN, 1.0));
        assert!(matches!(res, Err(CacheError::MalformedTrade { .. })));
        assert_eq!(cache.tape().len(), 3);

        cache.ingest(Trade::new("BTC", 130, 97.0, 1.0)).unwrap();
        let sma = cache.get("BTC", "SMA", 60, &options).unwrap();
        assert_eq!(sma.value(60, Field::Value), Some(99.0));
        assert_eq!(sma.value(120, Field::Value), Some(97.0));
        assert!(sma.iter().all(|row| row.values.iter().all(|v| v.is_finite())));
    }

    fn orphaned_indicator() -> SeriesCache {
        let mut cache = SeriesCache::live(tape());
        cache.get("BTC", "SMA", 60, &Options::new().with("period", 1)).unwrap();
        cache.entries.remove(&SeriesKey::ohlcv("BTC", 60));
        cache
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "has no candles to refresh from")]
    fn test_that_refresh_without_candles_panics_in_debug() {
        let _ = orphaned_indicator().refresh("BTC", &[60]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_that_refresh_without_candles_is_a_consistency_error() {
        let res = orphaned_indicator().refresh("BTC", &[60]);
        assert!(matches!(res, Err(CacheError::Consistency { .. })));
    }

    #[test]
    fn test_that_replay_cache_sees_only_consumed_trades() {
        let mut cache = SeriesCache::replay(tape());
        assert!(cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap().is_empty());
        assert_eq!(cache.max_timestamp("BTC"), None);

        cache.advance().unwrap();
        cache.advance().unwrap();
        let series = cache.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
        assert_eq!(series.timestamps(), &[0]);
        assert_eq!(cache.max_timestamp("BTC"), Some(30));

        let next = cache.peek_next().unwrap().clone();
        assert_eq!(cache.sealed_periods(&next), vec![60]);
        assert!(cache.advance().unwrap().is_some());
        assert!(cache.advance().unwrap().is_none());
        assert!(cache.is_exhausted());
    }

    #[test]
    fn test_that_evicting_ohlcv_drops_dependents() {
        let mut cache = SeriesCache::live(rising(10));
        cache.get("ABC", "SMA", 60, &Options::new().with("period", 2)).unwrap();
        cache.get("ABC", "EMA", 60, &Options::new().with("period", 2)).unwrap();
        cache.get("ABC", "OHLCV", 120, &Options::new()).unwrap();
        assert_eq!(cache.len(), 4);

        assert!(cache.evict(&SeriesKey::ohlcv("ABC", 60)).is_some());
        assert_eq!(cache.len(), 1);
        assert!(cache.keys().all(|key| key.indicator == Indicator::Ohlcv));
    }
}
