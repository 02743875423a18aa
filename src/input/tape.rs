use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use rand::{thread_rng, Rng};
use rand_distr::{Distribution, StandardNormal, Uniform};
use serde::{Deserialize, Serialize};

use crate::aggregator::MIN_TIMESTAMP;
use crate::error::CacheError;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub timestamp: i64,
    pub price: f64,
    /// Negative volume is a sell.
    pub volume: f64,
}

impl Trade {
    pub fn new(symbol: impl Into<String>, timestamp: i64, price: f64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price,
            volume,
        }
    }
}

/// Ordered trade history. Timestamps never decrease within a symbol.
#[derive(Clone, Debug, Default)]
pub struct TradeTape {
    trades: Vec<Trade>,
    last_seen: HashMap<String, i64>,
}

impl TradeTape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trades(trades: impl IntoIterator<Item = Trade>) -> Result<Self, CacheError> {
        let mut tape = Self::new();
        for trade in trades {
            tape.push(trade)?;
        }
        Ok(tape)
    }

    /// Appends a trade, rejecting it if it is older than the last trade for its symbol or if it
    /// is malformed. Equal timestamps are accepted.
    pub fn push(&mut self, trade: Trade) -> Result<(), CacheError> {
        check_values(&trade)?;
        self.check_order(&trade)?;
        self.last_seen.insert(trade.symbol.clone(), trade.timestamp);
        self.trades.push(trade);
        Ok(())
    }

    pub fn check_order(&self, trade: &Trade) -> Result<(), CacheError> {
        match self.last_seen.get(&trade.symbol) {
            Some(last) if trade.timestamp < *last => Err(CacheError::OutOfOrder {
                symbol: trade.symbol.clone(),
                timestamp: trade.timestamp,
                last: *last,
            }),
            _ => Ok(()),
        }
    }

    pub fn get(&self, position: usize) -> Option<&Trade> {
        self.trades.get(position)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.last_seen.keys()
    }

    /// Trades with `start <= timestamp <= end`, either bound optional.
    pub fn window(&self, start: Option<i64>, end: Option<i64>) -> TradeTape {
        let mut windowed = TradeTape::new();
        for trade in &self.trades {
            if start.is_some_and(|start| trade.timestamp < start)
                || end.is_some_and(|end| trade.timestamp > end)
            {
                continue;
            }
            windowed.last_seen.insert(trade.symbol.clone(), trade.timestamp);
            windowed.trades.push(trade.clone());
        }
        windowed
    }

    /// Reads a headerless `timestamp,price,volume` trade log for a single symbol.
    pub fn from_csv(path: &Path, symbol: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let tape = Self::from_reader(file, symbol)
            .with_context(|| format!("reading trades from {}", path.display()))?;
        info!(
            "TAPE: Loaded {} trades for {} from {}",
            tape.len(),
            symbol,
            path.display()
        );
        Ok(tape)
    }

    pub fn from_reader<R: Read>(reader: R, symbol: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut tape = Self::new();
        for (line, record) in rdr.deserialize::<(i64, f64, f64)>().enumerate() {
            let (timestamp, price, volume) =
                record.with_context(|| format!("malformed trade on line {}", line + 1))?;
            tape.push(Trade::new(symbol, timestamp, price, volume))?;
        }
        Ok(tape)
    }

    /// Random walk of `length` trades per symbol, spaced up to a minute apart.
    pub fn random(length: usize, symbols: &[&str]) -> Self {
        Self::random_with_rng(&mut thread_rng(), length, symbols)
    }

    pub fn random_with_rng<R: Rng>(rng: &mut R, length: usize, symbols: &[&str]) -> Self {
        let gap_dist = Uniform::new_inclusive(0, 60);
        let size_dist = Uniform::new(0.01, 5.0);
        let volatility = 0.002;

        let mut prices: Vec<f64> = vec![100.0; symbols.len()];
        let mut tape = Self::new();
        let mut timestamp: i64 = 1_500_000_000;
        for _ in 0..length {
            timestamp += gap_dist.sample(rng);
            for (symbol, price) in symbols.iter().zip(prices.iter_mut()) {
                let shock: f64 = rng.sample(StandardNormal);
                *price *= 1.0 + volatility * shock;
                let mut volume = size_dist.sample(rng);
                if rng.gen_bool(0.5) {
                    volume = -volume;
                }
                tape.last_seen.insert(symbol.to_string(), timestamp);
                tape.trades
                    .push(Trade::new(*symbol, timestamp, *price, volume));
            }
        }
        tape
    }
}

/// A non-finite price or volume would poison every rolling window it enters.
fn check_values(trade: &Trade) -> Result<(), CacheError> {
    let reason = if !trade.price.is_finite() {
        "price is not finite"
    } else if !trade.volume.is_finite() {
        "volume is not finite"
    } else if trade.timestamp < MIN_TIMESTAMP {
        "timestamp is before -2^62"
    } else {
        return Ok(());
    };
    Err(CacheError::MalformedTrade {
        symbol: trade.symbol.clone(),
        timestamp: trade.timestamp,
        reason,
    })
}
