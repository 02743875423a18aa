use crate::cache::SeriesCache;
use crate::error::CacheError;
use crate::input::tape::Trade;
use crate::options::Options;
use crate::series::{Field, FieldSeries};

use super::{DecisionLog, Strategy};

/// Long-only parabolic SAR follower on one symbol and candle width.
///
/// When a candle closes above its SAR and within `threshold` of it (as a fraction of the close)
/// while flat, buys `size`. When a candle closes below its SAR while long, sells the position.
#[derive(Clone, Debug)]
pub struct SarFollower {
    symbol: String,
    period: i64,
    sar_options: Options,
    size: f64,
    threshold: f64,
    log: DecisionLog,
}

impl SarFollower {
    pub fn new(symbol: impl Into<String>, period: i64) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            sar_options: Options::new()
                .with("acceleration", 0.02)
                .with("maximum", 0.2),
            size: 0.1,
            threshold: 0.01,
            log: DecisionLog::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn position(&self) -> f64 {
        self.log.position()
    }
}

impl Strategy for SarFollower {
    fn on_tick(&mut self, cache: &mut SeriesCache, trade: &Trade) -> Result<(), CacheError> {
        if trade.symbol != self.symbol {
            return Ok(());
        }
        // Candle close notifications only cover cached candles
        cache.get(&self.symbol, "OHLCV", self.period, &Options::new())?;
        cache.get(&self.symbol, "SAR", self.period, &self.sar_options)?;
        Ok(())
    }

    fn on_candle_close(
        &mut self,
        cache: &mut SeriesCache,
        symbol: &str,
        period: i64,
    ) -> Result<(), CacheError> {
        if symbol != self.symbol || period != self.period {
            return Ok(());
        }

        let ohlcv = cache.get(symbol, "OHLCV", period, &Options::new())?;
        let Some((timestamp, close)) = ohlcv
            .last_row()
            .and_then(|row| row.get(Field::Close).map(|close| (row.timestamp, close)))
        else {
            return Ok(());
        };
        let Some(sar) = cache
            .get(symbol, "SAR", period, &self.sar_options)?
            .value(timestamp, Field::Value)
        else {
            return Ok(());
        };

        let delta = (close - sar) / close;
        let position = self.log.position();
        if position <= 0.0 && delta > 0.0 && delta < self.threshold {
            self.log.record(timestamp, close, self.size);
        } else if position > 0.0 && delta < 0.0 {
            self.log.record(timestamp, close, -position);
        }
        Ok(())
    }

    fn decisions(&self) -> Option<&FieldSeries> {
        Some(self.log.series())
    }
}

#[cfg(test)]
mod tests {
    use super::SarFollower;
    use crate::input::tape::{Trade, TradeTape};
    use crate::replay::ReplayDriver;
    use crate::series::Field;
    use crate::strategy::Strategy;

    #[test]
    fn test_that_follower_buys_trend_and_sells_reversal() {
        let mut trades: Vec<Trade> = (0..20)
            .map(|i| Trade::new("ABC", i * 60, 100.0 + i as f64, 1.0))
            .collect();
        trades.push(Trade::new("ABC", 1200, 50.0, 1.0));
        trades.push(Trade::new("ABC", 1260, 50.0, 1.0));
        let tape = TradeTape::from_trades(trades).unwrap();

        let mut driver = ReplayDriver::new(tape, SarFollower::new("ABC", 60));
        driver.run().unwrap();

        let decisions = driver.strategy().decisions().unwrap();
        assert_eq!(decisions.timestamps(), &[60, 1201]);
        assert_eq!(decisions.value(60, Field::Price), Some(101.0));
        assert_eq!(decisions.value(1201, Field::Volume), Some(-0.1));
        assert_eq!(driver.strategy().position(), 0.0);
    }
}
