//! Indicator options.
//!
//! An [Options] set is an immutable value: it is built once, usually deserialized straight from a
//! request, and then only read. Two requests that carry the same options in a different order, or
//! that write a period as `5` in one place and `5.0` in another, have the same [Fingerprint] and
//! so land on the same cache entry.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CacheError;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl OptionValue {
    fn encode(&self) -> String {
        match self {
            OptionValue::Bool(value) => format!("b:{value}"),
            OptionValue::Number(value) => {
                // -0.0 and 0.0 are the same parameter
                let value = if *value == 0.0 { 0.0 } else { *value };
                format!("n:{value}")
            }
            OptionValue::Text(value) => format!("s:{}", Value::String(value.clone())),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Canonical encoding of an option set, used as part of every cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Options {
    inner: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.inner.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.inner.iter()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let encoded: Vec<String> = self
            .inner
            .iter()
            .map(|(key, value)| format!("{}={}", Value::String(key.clone()), value.encode()))
            .collect();
        Fingerprint(encoded.join(","))
    }

    /// A required window length: a whole number of at least one.
    pub fn period(&self, indicator: &'static str, key: &'static str) -> Result<usize, CacheError> {
        match self.inner.get(key) {
            Some(value) => Self::as_period(key, value),
            None => Err(CacheError::MissingOption { indicator, key }),
        }
    }

    pub fn period_or(&self, key: &str, default: usize) -> Result<usize, CacheError> {
        match self.inner.get(key) {
            Some(value) => Self::as_period(key, value),
            None => Ok(default),
        }
    }

    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, CacheError> {
        match self.inner.get(key) {
            Some(OptionValue::Number(value)) if value.is_finite() => Ok(*value),
            Some(OptionValue::Number(value)) => {
                Err(CacheError::malformed(key, format!("{value} is not finite")))
            }
            Some(other) => Err(CacheError::malformed(
                key,
                format!("expected a number, got {other:?}"),
            )),
            None => Ok(default),
        }
    }

    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, CacheError> {
        match self.inner.get(key) {
            Some(OptionValue::Text(value)) => Ok(value.as_str()),
            Some(other) => Err(CacheError::malformed(
                key,
                format!("expected text, got {other:?}"),
            )),
            None => Ok(default),
        }
    }

    fn as_period(key: &str, value: &OptionValue) -> Result<usize, CacheError> {
        match value {
            OptionValue::Number(number) if number.fract() == 0.0 && *number >= 1.0 => {
                Ok(*number as usize)
            }
            OptionValue::Number(number) => Err(CacheError::malformed(
                key,
                format!("{number} is not a positive whole number"),
            )),
            other => Err(CacheError::malformed(
                key,
                format!("expected a number, got {other:?}"),
            )),
        }
    }
}
