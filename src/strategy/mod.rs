/* A Strategy is driven by a ReplayDriver and reads everything it knows
about the market through the cache it is handed. It never sees the tape
directly: each callback gets the cache in the state it would have been in
live at that moment.

on_candle_close runs before the trade that closes a candle is folded, so
the closed candle is still the last row of the OHLCV series. on_tick runs
after the trade has been folded and every dependent indicator refreshed.
*/

use crate::cache::SeriesCache;
use crate::error::CacheError;
use crate::input::tape::Trade;
use crate::series::FieldSeries;

pub mod decisions;
pub mod sar;

pub use decisions::DecisionLog;
pub use sar::SarFollower;

pub trait Strategy {
    fn on_tick(&mut self, _cache: &mut SeriesCache, _trade: &Trade) -> Result<(), CacheError> {
        Ok(())
    }

    fn on_candle_close(
        &mut self,
        _cache: &mut SeriesCache,
        _symbol: &str,
        _period: i64,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    /// Orders the strategy has made so far, if it keeps them.
    fn decisions(&self) -> Option<&FieldSeries> {
        None
    }
}

/// Does nothing, used when a replay only exists to be queried.
#[derive(Clone, Debug, Default)]
pub struct NoopStrategy;

impl Strategy for NoopStrategy {}
