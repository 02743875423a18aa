//! Timestamped rows of named fields.
//!
//! Every series computed by this crate is a [FieldSeries]: a strictly increasing list of
//! timestamps, each with exactly one value per field of the series' [Layout]. Rows are stored
//! contiguously so the current candle, which is always the last row when trades arrive in order,
//! can be updated in place.
use serde::{Deserialize, Serialize};

use crate::options::Options;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Value,
    Macd,
    Signal,
    Histogram,
    Upper,
    Middle,
    Lower,
    Price,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
            Field::Value => "value",
            Field::Macd => "macd",
            Field::Signal => "signal",
            Field::Histogram => "histogram",
            Field::Upper => "upper",
            Field::Middle => "middle",
            Field::Lower => "lower",
            Field::Price => "price",
        }
    }

    /// Input fields an indicator may be computed over.
    pub fn parse_ohlcv(name: &str) -> Option<Field> {
        match name.to_ascii_lowercase().as_str() {
            "open" => Some(Field::Open),
            "high" => Some(Field::High),
            "low" => Some(Field::Low),
            "close" => Some(Field::Close),
            "volume" => Some(Field::Volume),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Layout {
    Ohlcv,
    Value,
    Macd,
    Bands,
    Orders,
}

impl Layout {
    /// Fields in canonical order, which is also the order values are stored and serialized in.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Layout::Ohlcv => &[
                Field::Open,
                Field::High,
                Field::Low,
                Field::Close,
                Field::Volume,
            ],
            Layout::Value => &[Field::Value],
            Layout::Macd => &[Field::Macd, Field::Signal, Field::Histogram],
            Layout::Bands => &[Field::Upper, Field::Middle, Field::Lower],
            Layout::Orders => &[Field::Price, Field::Volume],
        }
    }

    pub fn width(&self) -> usize {
        self.fields().len()
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields().iter().position(|candidate| *candidate == field)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    pub timestamp: i64,
    pub values: &'a [f64],
    fields: &'static [Field],
}

impl<'a> Row<'a> {
    pub fn get(&self, field: Field) -> Option<f64> {
        let position = self.fields.iter().position(|candidate| *candidate == field)?;
        self.values.get(position).copied()
    }

    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSeries {
    layout: Layout,
    options: Options,
    timestamps: Vec<i64>,
    values: Vec<f64>,
}

impl FieldSeries {
    pub fn new(layout: Layout, options: Options) -> Self {
        Self {
            layout,
            options,
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Builds a series from indicator output columns, where `columns[j][i - begin]` is the value
    /// of field `j` at `timestamps[i]`. Rows before `begin` are dropped.
    pub(crate) fn from_columns(
        layout: Layout,
        options: Options,
        timestamps: &[i64],
        begin: usize,
        columns: &[Vec<f64>],
    ) -> Self {
        debug_assert_eq!(columns.len(), layout.width());
        let mut series = Self::new(layout, options);
        if begin >= timestamps.len() {
            return series;
        }
        let rows = timestamps.len() - begin;
        debug_assert!(columns.iter().all(|column| column.len() == rows));

        series.timestamps.extend_from_slice(&timestamps[begin..]);
        series.values.reserve(rows * layout.width());
        for row in 0..rows {
            for column in columns {
                series.values.push(column[row]);
            }
        }
        series
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn fields(&self) -> &'static [Field] {
        self.layout.fields()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    pub fn row_at(&self, index: usize) -> Option<Row<'_>> {
        let timestamp = *self.timestamps.get(index)?;
        let width = self.layout.width();
        Some(Row {
            timestamp,
            values: &self.values[index * width..(index + 1) * width],
            fields: self.layout.fields(),
        })
    }

    pub fn row(&self, timestamp: i64) -> Option<Row<'_>> {
        let index = self.locate(timestamp).ok()?;
        self.row_at(index)
    }

    pub fn last_row(&self) -> Option<Row<'_>> {
        self.row_at(self.len().checked_sub(1)?)
    }

    pub fn value(&self, timestamp: i64, field: Field) -> Option<f64> {
        self.row(timestamp)?.get(field)
    }

    /// Copies one field out as a contiguous column.
    pub fn column(&self, field: Field) -> Option<Vec<f64>> {
        let position = self.layout.position(field)?;
        let width = self.layout.width();
        Some(
            self.values
                .iter()
                .skip(position)
                .step_by(width)
                .copied()
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.len()).filter_map(move |index| self.row_at(index))
    }

    /// Rows with `start <= timestamp < end`.
    pub fn range(&self, start: i64, end: i64) -> impl Iterator<Item = Row<'_>> {
        let from = self.timestamps.partition_point(|timestamp| *timestamp < start);
        let to = self
            .timestamps
            .partition_point(|timestamp| *timestamp < end)
            .max(from);
        (from..to).filter_map(move |index| self.row_at(index))
    }

    pub fn payload(&self, start: i64, end: i64) -> SeriesPayload {
        SeriesPayload {
            fields: self.fields().to_vec(),
            rows: self
                .range(start, end)
                .map(|row| PayloadRow {
                    timestamp: row.timestamp,
                    values: row.values.to_vec(),
                })
                .collect(),
        }
    }

    fn locate(&self, timestamp: i64) -> Result<usize, usize> {
        // The common case is touching the newest row
        match self.timestamps.last() {
            Some(last) if *last == timestamp => Ok(self.timestamps.len() - 1),
            Some(last) if *last < timestamp => Err(self.timestamps.len()),
            _ => self.timestamps.binary_search(&timestamp),
        }
    }

    pub(crate) fn row_mut(&mut self, timestamp: i64) -> Option<&mut [f64]> {
        let index = self.locate(timestamp).ok()?;
        let width = self.layout.width();
        Some(&mut self.values[index * width..(index + 1) * width])
    }

    /// Inserts a row at its sorted position, overwriting a row with the same timestamp.
    pub(crate) fn insert_row(&mut self, timestamp: i64, row: &[f64]) {
        debug_assert_eq!(row.len(), self.layout.width());
        let width = self.layout.width();
        match self.locate(timestamp) {
            Ok(index) => {
                self.values[index * width..(index + 1) * width].copy_from_slice(row);
            }
            Err(index) if index == self.timestamps.len() => {
                self.timestamps.push(timestamp);
                self.values.extend_from_slice(row);
            }
            Err(index) => {
                self.timestamps.insert(index, timestamp);
                let at = index * width;
                self.values.splice(at..at, row.iter().copied());
            }
        }
    }
}

/// Serializable view of a time range of a series, used by the JSON server.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SeriesPayload {
    pub fields: Vec<Field>,
    pub rows: Vec<PayloadRow>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PayloadRow {
    pub timestamp: i64,
    pub values: Vec<f64>,
}
