//! Folds trades into fixed-width OHLCV candles.
//!
//! A candle is keyed by the start of its bucket, `floor(timestamp / period) * period`. The
//! newest candle stays open and keeps absorbing trades until a trade with a later key arrives.
//!
//! [add_trade] does not check ordering. A trade that lands in an older bucket is folded into
//! that bucket as if it were the latest trade there, which overwrites its close and can leave an
//! open that was never the first price. Callers that can see unordered data go through
//! [TradeTape](crate::input::tape::TradeTape) or
//! [SeriesCache::ingest](crate::cache::SeriesCache::ingest), which reject it.
use crate::input::tape::Trade;
use crate::options::Options;
use crate::series::{FieldSeries, Layout};

const HIGH: usize = 1;
const LOW: usize = 2;
const CLOSE: usize = 3;
const VOLUME: usize = 4;

/// Largest candle period, in seconds.
pub const MAX_PERIOD: i64 = 1 << 62;
/// Earliest trade timestamp. Every bucket start of a timestamp at or after it is representable
/// for any period up to [MAX_PERIOD].
pub const MIN_TIMESTAMP: i64 = -(1 << 62);

/// Defined for `MIN_TIMESTAMP <= timestamp` and `0 < period <= MAX_PERIOD`, which the tape and
/// the cache enforce.
pub fn bucket_start(timestamp: i64, period: i64) -> i64 {
    debug_assert!(period > 0 && period <= MAX_PERIOD);
    timestamp - timestamp.rem_euclid(period)
}

pub fn empty() -> FieldSeries {
    FieldSeries::new(Layout::Ohlcv, Options::new())
}

/// Whether `timestamp` would open a new candle after an existing one, sealing it.
pub fn seals(series: &FieldSeries, period: i64, timestamp: i64) -> bool {
    match series.last_timestamp() {
        Some(last) => bucket_start(timestamp, period) > last,
        None => false,
    }
}

/// Folds one trade into `series`. Returns true if the trade sealed the previous candle.
pub fn add_trade(series: &mut FieldSeries, period: i64, trade: &Trade) -> bool {
    let key = bucket_start(trade.timestamp, period);
    let sealed = seals(series, period, trade.timestamp);
    let price = trade.price;

    if let Some(row) = series.row_mut(key) {
        row[HIGH] = row[HIGH].max(price);
        row[LOW] = row[LOW].min(price);
        row[CLOSE] = price;
        row[VOLUME] += trade.volume;
    } else {
        series.insert_row(key, &[price, price, price, price, trade.volume]);
    }
    sealed
}

/// Cold build: folds every trade for `symbol` in one pass.
pub fn build<'a>(
    period: i64,
    symbol: &str,
    trades: impl IntoIterator<Item = &'a Trade>,
) -> FieldSeries {
    let mut series = empty();
    for trade in trades {
        if trade.symbol == symbol {
            add_trade(&mut series, period, trade);
        }
    }
    series
}
