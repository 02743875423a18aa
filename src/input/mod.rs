//! Inputs own the trade history that everything else is derived from.
//!
//! A [TradeTape](tape::TradeTape) is loaded once, either from a trade log on disk or from a
//! generator, and is append-only after that. Ordering is checked as trades are added so nothing
//! downstream has to deal with a trade that goes back in time.
pub mod tape;

pub use tape::{Trade, TradeTape};
