use derive_more::{Display, Error};

/// Everything that can make a cache operation fail.
///
/// Configuration problems (`UnknownIndicator`, `MissingOption`, `MalformedOption`,
/// `InvalidPeriod`) are raised before anything is built so the cache is left untouched.
/// `OutOfOrder` and `MalformedTrade` are raised at ingestion. `Consistency` means the cache broke one of its own
/// invariants and should never be seen outside of a bug.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum CacheError {
    #[display("unknown indicator `{name}`")]
    UnknownIndicator { name: String },
    #[display("missing required option `{key}` for {indicator}")]
    MissingOption {
        indicator: &'static str,
        key: &'static str,
    },
    #[display("malformed option `{key}`: {reason}")]
    MalformedOption { key: String, reason: String },
    #[display("invalid period {period}, periods must be positive and at most 2^62")]
    InvalidPeriod { period: i64 },
    #[display("trade for {symbol} at {timestamp} precedes last ingested trade at {last}")]
    OutOfOrder {
        symbol: String,
        timestamp: i64,
        last: i64,
    },
    #[display("malformed trade for {symbol} at {timestamp}: {reason}")]
    MalformedTrade {
        symbol: String,
        timestamp: i64,
        reason: &'static str,
    },
    #[display("cache entry for {key} vanished after insert")]
    Consistency { key: String },
}

impl CacheError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::UnknownIndicator { .. }
                | CacheError::MissingOption { .. }
                | CacheError::MalformedOption { .. }
                | CacheError::InvalidPeriod { .. }
        )
    }

    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CacheError::MalformedOption {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
