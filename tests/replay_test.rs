mod common;

use std::collections::BTreeMap;

use clio::cache::SeriesCache;
use clio::input::tape::{Trade, TradeTape};
use clio::options::Options;
use clio::replay::ReplayDriver;
use clio::series::{Field, FieldSeries};
use clio::strategy::NoopStrategy;

const SYMBOLS: [&str; 2] = ["ABC", "BCD"];
const PERIODS: [i64; 2] = [60, 120];

fn request_all(driver: &mut ReplayDriver<NoopStrategy>) {
    for symbol in SYMBOLS {
        for period in PERIODS {
            for (indicator, options) in common::requests() {
                driver.get(symbol, indicator, period, &options).unwrap();
            }
        }
    }
}

fn snapshot(driver: &mut ReplayDriver<NoopStrategy>) -> Vec<FieldSeries> {
    let mut all = Vec::new();
    for symbol in SYMBOLS {
        for period in PERIODS {
            for (indicator, options) in common::requests() {
                all.push(driver.get(symbol, indicator, period, &options).unwrap().clone());
            }
        }
    }
    all
}

fn cold(tape: TradeTape) -> Vec<FieldSeries> {
    let mut cache = SeriesCache::live(tape);
    let mut all = Vec::new();
    for symbol in SYMBOLS {
        for period in PERIODS {
            for (indicator, options) in common::requests() {
                all.push(cache.get(symbol, indicator, period, &options).unwrap().clone());
            }
        }
    }
    all
}

#[test]
fn test_that_batching_does_not_change_state() {
    common::init_logging();
    let tape = common::random_tape(11, 400);

    let mut single = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut single);
    while single.step(1).unwrap() {}

    let mut batched = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut batched);
    while batched.step(7).unwrap() {}

    let mut whole = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut whole);
    assert!(whole.step(tape.len() * 2).unwrap());

    assert_eq!(single.cursor(), tape.len());
    assert_eq!(batched.cursor(), tape.len());
    assert_eq!(whole.cursor(), tape.len());

    let expected = snapshot(&mut single);
    assert_eq!(snapshot(&mut batched), expected);
    assert_eq!(snapshot(&mut whole), expected);
}

#[test]
fn test_that_replay_to_exhaustion_matches_cold_build() {
    common::init_logging();
    let tape = common::random_tape(23, 500);

    let mut driver = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut driver);
    assert_eq!(driver.run().unwrap(), tape.len());

    let replayed = snapshot(&mut driver);
    assert_eq!(replayed, cold(tape));
    // Random walk over 500 trades per symbol is long enough for every indicator
    assert!(replayed.iter().all(|series| !series.is_empty()));
}

#[test]
fn test_that_partial_replay_matches_cold_build_of_prefix() {
    common::init_logging();
    let tape = common::random_tape(5, 300);
    let prefix = 317;

    let mut driver = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut driver);
    driver.step(prefix).unwrap();

    let consumed = TradeTape::from_trades(tape.trades()[..prefix].to_vec()).unwrap();
    assert_eq!(snapshot(&mut driver), cold(consumed));
}

#[test]
fn test_that_late_requests_match_early_requests() {
    common::init_logging();
    let tape = common::random_tape(99, 300);

    let mut early = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut early);
    early.run().unwrap();

    let mut late = ReplayDriver::new(tape.clone(), NoopStrategy);
    late.step(tape.len() / 2).unwrap();
    request_all(&mut late);
    late.run().unwrap();

    assert_eq!(snapshot(&mut early), snapshot(&mut late));
}

#[test]
fn test_that_every_trade_is_consumed_once() {
    common::init_logging();
    let tape = common::random_tape(3, 250);
    let mut driver = ReplayDriver::new(tape.clone(), NoopStrategy);
    request_all(&mut driver);
    driver.run().unwrap();

    for symbol in SYMBOLS {
        let expected: f64 = tape
            .trades()
            .iter()
            .filter(|trade| trade.symbol == symbol)
            .map(|trade| trade.volume)
            .sum();
        let ohlcv = driver.get(symbol, "OHLCV", 60, &Options::new()).unwrap();
        let folded: f64 = ohlcv.iter().filter_map(|row| row.get(Field::Volume)).sum();
        assert!((expected - folded).abs() < 1e-6);
    }
}

#[test]
fn test_that_candles_fold_trades_in_buckets() {
    common::init_logging();
    let tape = TradeTape::from_trades(vec![
        Trade::new("BTC", 0, 100.0, 1.0),
        Trade::new("BTC", 30, 101.0, 1.0),
        Trade::new("BTC", 70, 99.0, 2.0),
    ])
    .unwrap();

    let mut driver = ReplayDriver::new(tape, NoopStrategy);
    driver.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
    driver.run().unwrap();

    let ohlcv = driver.get("BTC", "OHLCV", 60, &Options::new()).unwrap();
    assert_eq!(ohlcv.timestamps(), &[0, 60]);
    assert_eq!(
        ohlcv.row(0).unwrap().values,
        &[100.0, 101.0, 100.0, 101.0, 2.0]
    );
    assert_eq!(
        ohlcv.row(60).unwrap().values,
        &[99.0, 99.0, 99.0, 99.0, 2.0]
    );
}

/// (open, high, low, close, volume) per bucket start, folded straight from the tape.
fn fold_by_bucket(tape: &TradeTape, symbol: &str, period: i64) -> BTreeMap<i64, [f64; 5]> {
    let mut buckets: BTreeMap<i64, [f64; 5]> = BTreeMap::new();
    for trade in tape.trades().iter().filter(|trade| trade.symbol == symbol) {
        let start = trade.timestamp.div_euclid(period) * period;
        buckets
            .entry(start)
            .and_modify(|bucket| {
                bucket[1] = bucket[1].max(trade.price);
                bucket[2] = bucket[2].min(trade.price);
                bucket[3] = trade.price;
                bucket[4] += trade.volume;
            })
            .or_insert([
                trade.price,
                trade.price,
                trade.price,
                trade.price,
                trade.volume,
            ]);
    }
    buckets
}

#[test]
fn test_that_candles_match_an_independent_fold_of_the_tape() {
    common::init_logging();
    let tape = common::random_tape(41, 400);
    let periods = [7, 60, 300];

    let mut driver = ReplayDriver::new(tape.clone(), NoopStrategy);
    for symbol in SYMBOLS {
        for period in periods {
            driver.get(symbol, "OHLCV", period, &Options::new()).unwrap();
        }
    }
    while driver.step(13).unwrap() {}
    let mut cache = SeriesCache::live(tape.clone());

    for symbol in SYMBOLS {
        for period in periods {
            let expected = fold_by_bucket(&tape, symbol, period);
            let replayed = driver
                .get(symbol, "OHLCV", period, &Options::new())
                .unwrap()
                .clone();
            let built = cache.get(symbol, "OHLCV", period, &Options::new()).unwrap();

            for ohlcv in [&replayed, built] {
                assert_eq!(ohlcv.len(), expected.len());
                for (row, (start, bucket)) in ohlcv.iter().zip(expected.iter()) {
                    assert_eq!(row.timestamp, *start);
                    assert_eq!(row.get(Field::Open), Some(bucket[0]));
                    assert_eq!(row.get(Field::High), Some(bucket[1]));
                    assert_eq!(row.get(Field::Low), Some(bucket[2]));
                    assert_eq!(row.get(Field::Close), Some(bucket[3]));
                    let volume = row.get(Field::Volume).unwrap();
                    assert!((volume - bucket[4]).abs() < 1e-9);
                }
            }
        }
    }
}
