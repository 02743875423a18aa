//! Command-line configuration for the binaries.
//!
//! Both binaries take positional arguments. A trade tape is named either by a CSV path, read as
//! a headerless `timestamp,price,volume` log for one symbol, or by `random:<length>` for a
//! generated tape.
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::input::tape::TradeTape;

#[derive(Clone, Debug, PartialEq)]
pub enum TapeSource {
    Csv { path: PathBuf },
    Random { length: usize },
}

impl TapeSource {
    pub fn parse(value: &str) -> Result<Self> {
        match value.strip_prefix("random:") {
            Some(length) => {
                let length = length
                    .parse()
                    .with_context(|| format!("random tape length `{length}`"))?;
                Ok(TapeSource::Random { length })
            }
            None if value.is_empty() => bail!("empty tape source"),
            None => Ok(TapeSource::Csv {
                path: PathBuf::from(value),
            }),
        }
    }

    pub fn load(&self, symbol: &str) -> Result<TradeTape> {
        match self {
            TapeSource::Csv { path } => TradeTape::from_csv(path, symbol),
            TapeSource::Random { length } => Ok(TradeTape::random(*length, &[symbol])),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatasetConfig {
    pub name: String,
    pub symbol: String,
    pub source: TapeSource,
}

impl DatasetConfig {
    /// Parses `name=source:SYMBOL`, for example `btc=trades/btcusd.csv:BTCUSD` or
    /// `rand=random:3000:ABC`.
    pub fn parse(value: &str) -> Result<Self> {
        let (name, rest) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("dataset `{value}` is not name=source:SYMBOL"))?;
        let (source, symbol) = rest
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("dataset `{value}` has no symbol"))?;
        if name.is_empty() || symbol.is_empty() {
            bail!("dataset `{value}` is not name=source:SYMBOL");
        }
        Ok(Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            source: TapeSource::parse(source)?,
        })
    }

    pub fn load(&self) -> Result<TradeTape> {
        self.source
            .load(&self.symbol)
            .with_context(|| format!("loading dataset {}", self.name))
    }
}

/// `series_server <address> <port> [--capacity <n>] [name=source:SYMBOL ...]`
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Cache entries, candles included, kept per live dataset. Unbounded if unset.
    pub capacity: Option<usize>,
    pub datasets: Vec<DatasetConfig>,
}

impl ServerConfig {
    /// Parses arguments without the program name. With no datasets a random tape is served as
    /// `RANDOM`.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let address = args.next().ok_or_else(|| anyhow!("missing address"))?;
        let port = args
            .next()
            .ok_or_else(|| anyhow!("missing port"))?
            .parse()
            .context("port")?;

        let mut capacity = None;
        let mut datasets = Vec::new();
        while let Some(arg) = args.next() {
            if arg == "--capacity" {
                let value = args.next().ok_or_else(|| anyhow!("--capacity needs a value"))?;
                capacity = Some(value.parse().context("capacity")?);
            } else {
                datasets.push(DatasetConfig::parse(&arg)?);
            }
        }

        if datasets.is_empty() {
            datasets.push(DatasetConfig {
                name: "RANDOM".to_string(),
                symbol: "ABC".to_string(),
                source: TapeSource::Random { length: 3000 },
            });
        }

        Ok(Self {
            address,
            port,
            capacity,
            datasets,
        })
    }
}

/// `backtest <source> <symbol> <period> [start] [end]`
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    pub source: TapeSource,
    pub symbol: String,
    pub period: i64,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl BacktestConfig {
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let source = TapeSource::parse(&args.next().ok_or_else(|| anyhow!("missing source"))?)?;
        let symbol = args.next().ok_or_else(|| anyhow!("missing symbol"))?;
        let period: i64 = args
            .next()
            .ok_or_else(|| anyhow!("missing period"))?
            .parse()
            .context("period")?;
        if period <= 0 {
            bail!("period must be positive, got {period}");
        }
        let start = args.next().map(|v| v.parse()).transpose().context("start")?;
        let end = args.next().map(|v| v.parse()).transpose().context("end")?;

        Ok(Self {
            source,
            symbol,
            period,
            start,
            end,
        })
    }
}
