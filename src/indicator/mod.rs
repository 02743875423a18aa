//! Technical indicators over OHLCV candles.
//!
//! Every indicator is a pure function of an OHLCV [FieldSeries] and an [Options] set. The
//! output keeps the candle timestamps from the first index at which the indicator is defined,
//! so an input shorter than the indicator's window gives an empty series rather than an error.
//!
//! Options are validated into [Params] before anything is computed. The cache relies on this to
//! reject bad requests without touching its entries.
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::CacheError;
use crate::options::Options;
use crate::series::{Field, FieldSeries, Layout};

pub mod bands;
pub mod hilbert;
pub mod linreg;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod sar;

pub use ma::MaKind;

/// One output column starting at input index `begin`.
#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub begin: usize,
    pub values: Vec<f64>,
}

/// Several output columns sharing a start index, in the order of the indicator's layout.
#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    pub begin: usize,
    pub columns: Vec<Vec<f64>>,
}

impl From<Line> for Output {
    fn from(line: Line) -> Self {
        Output {
            begin: line.begin,
            columns: vec![line.values],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    Ohlcv,
    Sma,
    Ema,
    Rsi,
    Macd,
    BollingerBands,
    ParabolicSar,
    LinearRegression,
    HtDcPeriod,
    HtDcPhase,
    HtTrendline,
    HtTrendMode,
}

impl Indicator {
    pub fn parse(name: &str) -> Result<Indicator, CacheError> {
        match name.to_ascii_uppercase().as_str() {
            "OHLCV" => Ok(Indicator::Ohlcv),
            "SMA" => Ok(Indicator::Sma),
            "EMA" => Ok(Indicator::Ema),
            "RSI" => Ok(Indicator::Rsi),
            "MACD" => Ok(Indicator::Macd),
            "BBANDS" | "BOLLINGERBANDS" => Ok(Indicator::BollingerBands),
            "SAR" | "PARABOLICSAR" => Ok(Indicator::ParabolicSar),
            "LINEARREG" | "LINEARREGRESSION" => Ok(Indicator::LinearRegression),
            "HT_DCPERIOD" | "HILBERTDOMINANTCYCLEPERIOD" => Ok(Indicator::HtDcPeriod),
            "HT_DCPHASE" | "HILBERTDOMINANTCYCLEPHASE" => Ok(Indicator::HtDcPhase),
            "HT_TRENDLINE" | "HILBERTTRENDLINE" => Ok(Indicator::HtTrendline),
            "HT_TRENDMODE" | "HILBERTTRENDMODE" => Ok(Indicator::HtTrendMode),
            _ => Err(CacheError::UnknownIndicator {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Ohlcv => "OHLCV",
            Indicator::Sma => "SMA",
            Indicator::Ema => "EMA",
            Indicator::Rsi => "RSI",
            Indicator::Macd => "MACD",
            Indicator::BollingerBands => "BBANDS",
            Indicator::ParabolicSar => "SAR",
            Indicator::LinearRegression => "LINEARREG",
            Indicator::HtDcPeriod => "HT_DCPERIOD",
            Indicator::HtDcPhase => "HT_DCPHASE",
            Indicator::HtTrendline => "HT_TRENDLINE",
            Indicator::HtTrendMode => "HT_TRENDMODE",
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            Indicator::Ohlcv => Layout::Ohlcv,
            Indicator::Sma
            | Indicator::Ema
            | Indicator::Rsi
            | Indicator::ParabolicSar
            | Indicator::LinearRegression
            | Indicator::HtDcPeriod
            | Indicator::HtDcPhase
            | Indicator::HtTrendline
            | Indicator::HtTrendMode => Layout::Value,
            Indicator::Macd => Layout::Macd,
            Indicator::BollingerBands => Layout::Bands,
        }
    }

    /// Validates `options` for this indicator. Unknown keys are ignored.
    pub fn params(&self, options: &Options) -> Result<Params, CacheError> {
        let name = self.name();
        let params = match self {
            Indicator::Ohlcv => Params::Ohlcv,
            Indicator::Sma => Params::Sma {
                field: input_field(options)?,
                period: options.period(name, "period")?,
            },
            Indicator::Ema => Params::Ema {
                field: input_field(options)?,
                period: options.period(name, "period")?,
            },
            Indicator::Rsi => Params::Rsi {
                field: input_field(options)?,
                period: options.period(name, "period")?,
            },
            Indicator::Macd => Params::Macd {
                field: input_field(options)?,
                fast: options.period(name, "fastPeriod")?,
                slow: options.period(name, "slowPeriod")?,
                signal: options.period(name, "signalPeriod")?,
            },
            Indicator::BollingerBands => {
                let ma_type = options.text_or("maType", "SMA")?;
                let kind = MaKind::parse(ma_type).ok_or_else(|| {
                    CacheError::malformed("maType", format!("unknown moving average {ma_type}"))
                })?;
                Params::BollingerBands {
                    field: input_field(options)?,
                    period: options.period(name, "period")?,
                    up: options.number_or("deviationUp", 2.0)?,
                    down: options.number_or("deviationDown", 2.0)?,
                    kind,
                }
            }
            Indicator::ParabolicSar => {
                let acceleration = options.number_or("acceleration", 0.02)?;
                let maximum = options.number_or("maximum", 0.2)?;
                if acceleration < 0.0 {
                    return Err(CacheError::malformed("acceleration", "must not be negative"));
                }
                if maximum < 0.0 {
                    return Err(CacheError::malformed("maximum", "must not be negative"));
                }
                Params::ParabolicSar {
                    acceleration,
                    maximum,
                }
            }
            Indicator::LinearRegression => Params::LinearRegression {
                field: input_field(options)?,
                period: options.period(name, "period")?,
            },
            Indicator::HtDcPeriod => Params::HtDcPeriod {
                field: input_field(options)?,
            },
            Indicator::HtDcPhase => Params::HtDcPhase {
                field: input_field(options)?,
            },
            Indicator::HtTrendline => Params::HtTrendline {
                field: input_field(options)?,
            },
            Indicator::HtTrendMode => Params::HtTrendMode {
                field: input_field(options)?,
            },
        };
        Ok(params)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Indicator {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indicator::parse(s)
    }
}

fn input_field(options: &Options) -> Result<Field, CacheError> {
    let name = options.text_or("field", "close")?;
    Field::parse_ohlcv(name)
        .ok_or_else(|| CacheError::malformed("field", format!("{name} is not an OHLCV field")))
}

/// Validated indicator parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Params {
    Ohlcv,
    Sma {
        field: Field,
        period: usize,
    },
    Ema {
        field: Field,
        period: usize,
    },
    Rsi {
        field: Field,
        period: usize,
    },
    Macd {
        field: Field,
        fast: usize,
        slow: usize,
        signal: usize,
    },
    BollingerBands {
        field: Field,
        period: usize,
        up: f64,
        down: f64,
        kind: MaKind,
    },
    ParabolicSar {
        acceleration: f64,
        maximum: f64,
    },
    LinearRegression {
        field: Field,
        period: usize,
    },
    HtDcPeriod {
        field: Field,
    },
    HtDcPhase {
        field: Field,
    },
    HtTrendline {
        field: Field,
    },
    HtTrendMode {
        field: Field,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Computed {
    pub series: FieldSeries,
    /// Index into the candles of the first row of `series`.
    pub begin: usize,
}

/// Computes `indicator` over `ohlcv`. The result carries `options` as given.
pub fn compute(
    indicator: Indicator,
    ohlcv: &FieldSeries,
    options: &Options,
) -> Result<Computed, CacheError> {
    let params = indicator.params(options)?;
    let column = |field: Field| -> Result<Vec<f64>, CacheError> {
        ohlcv
            .column(field)
            .ok_or_else(|| CacheError::malformed("field", format!("input has no {field:?} field")))
    };

    let output: Option<Output> = match params {
        Params::Ohlcv => {
            return Ok(Computed {
                series: ohlcv.clone(),
                begin: 0,
            })
        }
        Params::Sma { field, period } => ma::sma(&column(field)?, period).map(Output::from),
        Params::Ema { field, period } => ma::ema(&column(field)?, period).map(Output::from),
        Params::Rsi { field, period } => rsi::rsi(&column(field)?, period).map(Output::from),
        Params::Macd {
            field,
            fast,
            slow,
            signal,
        } => macd::macd(&column(field)?, fast, slow, signal),
        Params::BollingerBands {
            field,
            period,
            up,
            down,
            kind,
        } => bands::bbands(&column(field)?, period, up, down, kind),
        Params::ParabolicSar {
            acceleration,
            maximum,
        } => sar::sar(
            &column(Field::High)?,
            &column(Field::Low)?,
            acceleration,
            maximum,
        )
        .map(Output::from),
        Params::LinearRegression { field, period } => {
            linreg::linear_regression(&column(field)?, period).map(Output::from)
        }
        Params::HtDcPeriod { field } => hilbert::ht_dcperiod(&column(field)?).map(Output::from),
        Params::HtDcPhase { field } => hilbert::ht_dcphase(&column(field)?).map(Output::from),
        Params::HtTrendline { field } => {
            hilbert::ht_trendline(&column(field)?).map(Output::from)
        }
        Params::HtTrendMode { field } => {
            hilbert::ht_trendmode(&column(field)?).map(Output::from)
        }
    };

    let layout = indicator.layout();
    match output {
        Some(output) => Ok(Computed {
            series: FieldSeries::from_columns(
                layout,
                options.clone(),
                ohlcv.timestamps(),
                output.begin,
                &output.columns,
            ),
            begin: output.begin,
        }),
        None => {
            debug!(
                "INDICATOR: {} candles too few for {} with {}",
                ohlcv.len(),
                indicator,
                options.fingerprint()
            );
            Ok(Computed {
                series: FieldSeries::new(layout, options.clone()),
                begin: ohlcv.len(),
            })
        }
    }
}
