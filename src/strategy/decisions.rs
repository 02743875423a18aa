use log::info;

use crate::options::Options;
use crate::series::{FieldSeries, Layout};

const PRICE: usize = 0;
const VOLUME: usize = 1;

/// Orders made by a strategy, kept as an `Orders` series so they can be served like any other
/// series.
///
/// Orders at the same timestamp are merged into one row at their volume-weighted price. Sells
/// are recorded one second after the timestamp they were made at so a buy and a sell on the
/// same candle stay on separate rows.
#[derive(Clone, Debug)]
pub struct DecisionLog {
    series: FieldSeries,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self {
            series: FieldSeries::new(Layout::Orders, Options::new()),
        }
    }

    pub fn record(&mut self, timestamp: i64, price: f64, volume: f64) {
        let timestamp = if volume < 0.0 { timestamp + 1 } else { timestamp };

        if let Some(row) = self.series.row_mut(timestamp) {
            let (current_price, current_volume) = (row[PRICE], row[VOLUME]);
            let merged_volume = current_volume + volume;
            // A row that nets out keeps the last price rather than dividing by zero
            let merged_price = if merged_volume == 0.0 {
                price
            } else {
                (current_price * current_volume + price * volume) / merged_volume
            };
            row[PRICE] = merged_price;
            row[VOLUME] = merged_volume;
            info!(
                "STRATEGY: Merged order at {} ({}, {}) -> ({}, {})",
                timestamp, current_price, current_volume, merged_price, merged_volume
            );
        } else {
            self.series.insert_row(timestamp, &[price, volume]);
            info!("STRATEGY: Order at {} {} @ {}", timestamp, volume, price);
        }
    }

    /// Net volume over every recorded order.
    pub fn position(&self) -> f64 {
        self.series.iter().map(|row| row.values[VOLUME]).sum()
    }

    pub fn series(&self) -> &FieldSeries {
        &self.series
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new()
    }
}
