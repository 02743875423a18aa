use std::collections::HashMap;

use log::info;

use super::{SeriesCache, SeriesKey};
use crate::error::CacheError;
use crate::indicator::Indicator;
use crate::input::tape::Trade;
use crate::options::Options;
use crate::series::FieldSeries;

/// Caps the number of entries in a [SeriesCache], dropping the least recently requested ones
/// once a request takes it over capacity.
///
/// A request touches its own entry and the OHLCV entry it is derived from, and neither is
/// dropped while serving it, so the capacity is at least two. Indicators go before candles
/// requested at the same time, and dropping candles drops everything derived from them.
#[derive(Debug)]
pub struct BoundedCache {
    inner: SeriesCache,
    capacity: usize,
    clock: u64,
    last_used: HashMap<SeriesKey, u64>,
}

impl BoundedCache {
    pub fn new(inner: SeriesCache, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(2),
            clock: 0,
            last_used: HashMap::new(),
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
        let key = self.inner.key(symbol, indicator, period, options)?;
        let candles = SeriesKey::ohlcv(symbol, period);
        self.inner.get_indicator(symbol, indicator, period, options)?;

        self.clock += 1;
        self.last_used.insert(candles.clone(), self.clock);
        self.last_used.insert(key.clone(), self.clock);
        self.evict_over_capacity(&[&key, &candles]);

        self.inner.entry(&key).ok_or_else(|| CacheError::Consistency {
            key: key.to_string(),
        })
    }

    fn evict_over_capacity(&mut self, pinned: &[&SeriesKey]) {
        while self.inner.len() > self.capacity {
            let Some(oldest) = self
                .last_used
                .iter()
                .filter(|(key, _)| !pinned.contains(key))
                .min_by_key(|(key, tick)| (**tick, key.is_ohlcv()))
                .map(|(key, _)| key.clone())
            else {
                return;
            };
            self.last_used.remove(&oldest);
            self.inner.evict(&oldest);
            if oldest.is_ohlcv() {
                let inner = &self.inner;
                self.last_used.retain(|key, _| inner.entry(key).is_some());
            }
            info!("CACHE: Capacity {} reached, dropped {}", self.capacity, oldest);
        }
    }

    pub fn ingest(&mut self, trade: Trade) -> Result<(), CacheError> {
        self.inner.ingest(trade)
    }

    pub fn max_timestamp(&self, symbol: &str) -> Option<i64> {
        self.inner.max_timestamp(symbol)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn inner(&self) -> &SeriesCache {
        &self.inner
    }
}
