//! # What is Clio?
//!
//! Clio serves technical-analysis series (candles, moving averages, oscillators) computed over a
//! tape of trades. It runs in two modes: live, where every request sees the full tape and new
//! trades can be appended, and replay, where the tape is folded in one trade at a time so that a
//! strategy can be backtested without lookahead.
//!
//! The expensive part of answering "give me indicator X over period P with options O for symbol S"
//! is the computation, so every answer is built lazily once and then kept in a cache. When new
//! trades arrive the cache folds them into the candles it already holds and rebuilds the
//! indicators that depend on those candles before anything else can read them. A strategy that
//! steps through a tape one trade at a time therefore ends up with exactly the same state as a
//! client asking for the same series once over the same prefix of trades. That equivalence is
//! the main thing the tests in this crate check.
//!
//! # Implementation
//!
//! A session is composed of:
//! - An input, [TradeTape](crate::input::tape::TradeTape). The tape owns the ordered trades,
//! rejects trades that go backwards in time, and can be loaded from CSV or generated randomly.
//! - The [aggregator](crate::aggregator) that folds trades into fixed-width OHLCV candles.
//! - The [indicator](crate::indicator) engine: pure functions from a candle series and an
//! [Options](crate::options::Options) set to a new [FieldSeries](crate::series::FieldSeries).
//! - The [SeriesCache](crate::cache::SeriesCache) which owns every computed series, keyed by
//! symbol, indicator, period and option fingerprint, and owns invalidation when trades arrive.
//! [BoundedCache](crate::cache::bounded::BoundedCache) wraps it with LRU eviction for long-lived
//! live servers.
//! - The [ReplayDriver](crate::replay::ReplayDriver) which moves the tape cursor forward and calls
//! back into a [Strategy](crate::strategy::Strategy).
//! - The JSON server in [http](crate::http) which is a thin wrapper over all of the above.
//!
//! The core is single-threaded. The server wraps its state in a Mutex so every request runs its
//! get-or-build sequence without interleaving.
//!
//! ``
//! cargo run --bin series_server [ipv4_address] [port] [--capacity n] [name=path.csv:SYMBOL ...]
//! cargo run --bin backtest [path.csv or random:length] [symbol] [period] [start] [end]
//! ``
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod indicator;
pub mod input;
pub mod options;
pub mod replay;
pub mod series;
pub mod strategy;
