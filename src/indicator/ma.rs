use super::{hilbert, Line};

/// Moving averages selectable by name, as for the middle Bollinger band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaKind {
    Sma,
    Ema,
    Wma,
    Dema,
    Tema,
    Trima,
    Kama,
    /// MESA adaptive average with fast limit 0.5 and slow limit 0.05. Ignores the period.
    Mama,
    /// Tillson T3 with volume factor 0.7.
    T3,
}

impl MaKind {
    pub fn parse(name: &str) -> Option<MaKind> {
        match name.to_ascii_uppercase().as_str() {
            "SMA" => Some(MaKind::Sma),
            "EMA" => Some(MaKind::Ema),
            "WMA" => Some(MaKind::Wma),
            "DEMA" => Some(MaKind::Dema),
            "TEMA" => Some(MaKind::Tema),
            "TRIMA" => Some(MaKind::Trima),
            "KAMA" => Some(MaKind::Kama),
            "MAMA" => Some(MaKind::Mama),
            "T3" => Some(MaKind::T3),
            _ => None,
        }
    }

    /// A period of one is the input itself, whatever the kind.
    pub fn compute(&self, input: &[f64], period: usize) -> Option<Line> {
        if period == 1 {
            return (!input.is_empty()).then(|| Line {
                begin: 0,
                values: input.to_vec(),
            });
        }
        match self {
            MaKind::Sma => sma(input, period),
            MaKind::Ema => ema(input, period),
            MaKind::Wma => wma(input, period),
            MaKind::Dema => dema(input, period),
            MaKind::Tema => tema(input, period),
            MaKind::Trima => trima(input, period),
            MaKind::Kama => kama(input, period),
            MaKind::Mama => hilbert::mama(input, 0.5, 0.05).map(|output| Line {
                begin: output.begin,
                values: output.columns.into_iter().next().unwrap_or_default(),
            }),
            MaKind::T3 => t3(input, period, 0.7),
        }
    }
}

pub fn sma(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() < period {
        return None;
    }
    let mut sum: f64 = input[..period].iter().sum();
    let mut values = Vec::with_capacity(input.len() - period + 1);
    values.push(sum / period as f64);
    for i in period..input.len() {
        sum += input[i] - input[i - period];
        values.push(sum / period as f64);
    }
    Some(Line {
        begin: period - 1,
        values,
    })
}

/// Seeded with the simple average of the first `period` values.
pub fn ema(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = input[..period].iter().sum::<f64>() / period as f64;
    let mut values = Vec::with_capacity(input.len() - period + 1);
    values.push(prev);
    for value in &input[period..] {
        prev += (value - prev) * k;
        values.push(prev);
    }
    Some(Line {
        begin: period - 1,
        values,
    })
}

/// Linearly weighted, newest value weighted `period`.
pub fn wma(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() < period {
        return None;
    }
    let divisor = (period * (period + 1)) as f64 / 2.0;
    let values = input
        .windows(period)
        .map(|window| {
            window
                .iter()
                .enumerate()
                .map(|(i, value)| (i + 1) as f64 * value)
                .sum::<f64>()
                / divisor
        })
        .collect();
    Some(Line {
        begin: period - 1,
        values,
    })
}

pub fn dema(input: &[f64], period: usize) -> Option<Line> {
    let first = ema(input, period)?;
    let second = ema(&first.values, period)?;
    let values = second
        .values
        .iter()
        .enumerate()
        .map(|(i, smoothed)| 2.0 * first.values[i + second.begin] - smoothed)
        .collect();
    Some(Line {
        begin: first.begin + second.begin,
        values,
    })
}

pub fn tema(input: &[f64], period: usize) -> Option<Line> {
    let first = ema(input, period)?;
    let second = ema(&first.values, period)?;
    let third = ema(&second.values, period)?;
    let values = third
        .values
        .iter()
        .enumerate()
        .map(|(i, e3)| {
            let e2 = second.values[i + third.begin];
            let e1 = first.values[i + third.begin + second.begin];
            3.0 * e1 - 3.0 * e2 + e3
        })
        .collect();
    Some(Line {
        begin: first.begin + second.begin + third.begin,
        values,
    })
}

/// Triangular average: a simple average of a simple average, weighting the middle of the window
/// most.
pub fn trima(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 {
        return None;
    }
    let (inner, outer) = if period % 2 == 1 {
        ((period + 1) / 2, (period + 1) / 2)
    } else {
        (period / 2, period / 2 + 1)
    };
    let first = sma(input, inner)?;
    let second = sma(&first.values, outer)?;
    Some(Line {
        begin: first.begin + second.begin,
        values: second.values,
    })
}

/// Kaufman adaptive average. The smoothing constant moves between the 2 and 30 bar EMA
/// constants with the efficiency ratio of the last `period` changes.
pub fn kama(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() <= period {
        return None;
    }
    let fastest = 2.0 / 3.0;
    let slowest = 2.0 / 31.0;

    let mut volatility: f64 = input[..=period]
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();
    let mut kama = input[period - 1];
    let mut values = Vec::with_capacity(input.len() - period);
    for i in period..input.len() {
        if i > period {
            volatility += (input[i] - input[i - 1]).abs();
            volatility -= (input[i - period] - input[i - period - 1]).abs();
        }
        let change = input[i] - input[i - period];
        let efficiency = if volatility <= change || volatility.abs() < 1e-8 {
            1.0
        } else {
            (change / volatility).abs()
        };
        let constant = (efficiency * (fastest - slowest) + slowest).powi(2);
        kama += (input[i] - kama) * constant;
        values.push(kama);
    }
    Some(Line {
        begin: period,
        values,
    })
}

/// Tillson T3: six chained EMAs combined with weights from the volume factor.
pub fn t3(input: &[f64], period: usize, volume_factor: f64) -> Option<Line> {
    let mut chain = Vec::with_capacity(6);
    let mut begin = 0;
    let mut current = ema(input, period)?;
    begin += current.begin;
    chain.push(current.clone());
    for _ in 1..6 {
        current = ema(&current.values, period)?;
        begin += current.begin;
        chain.push(current.clone());
    }

    let v = volume_factor;
    let c1 = -v * v * v;
    let c2 = 3.0 * v * v + 3.0 * v * v * v;
    let c3 = -6.0 * v * v - 3.0 * v - 3.0 * v * v * v;
    let c4 = 1.0 + 3.0 * v + v * v * v + 3.0 * v * v;

    // Offset of each stage's values against the last stage's
    let mut offsets = [0usize; 6];
    for stage in (0..5).rev() {
        offsets[stage] = offsets[stage + 1] + chain[stage + 1].begin;
    }
    let at = |stage: usize, i: usize| chain[stage].values[i + offsets[stage]];
    let values = (0..chain[5].values.len())
        .map(|i| c1 * at(5, i) + c2 * at(4, i) + c3 * at(3, i) + c4 * at(2, i))
        .collect();
    Some(Line { begin, values })
}
