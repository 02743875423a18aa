use super::ma::MaKind;
use super::Output;

/// Upper, middle and lower bands. The middle is a moving average of `kind`, the bands sit
/// `up` and `down` population standard deviations away from it.
pub fn bbands(input: &[f64], period: usize, up: f64, down: f64, kind: MaKind) -> Option<Output> {
    let middle = kind.compute(input, period)?;
    let begin = middle.begin.max(period.checked_sub(1)?);
    if begin >= input.len() {
        return None;
    }

    let size = input.len() - begin;
    let mut upper = Vec::with_capacity(size);
    let mut centre = Vec::with_capacity(size);
    let mut lower = Vec::with_capacity(size);
    for i in begin..input.len() {
        let mid = middle.values[i - middle.begin];
        let deviation = std_dev(&input[i + 1 - period..=i]);
        upper.push(mid + up * deviation);
        centre.push(mid);
        lower.push(mid - down * deviation);
    }

    Some(Output {
        begin,
        columns: vec![upper, centre, lower],
    })
}

fn std_dev(window: &[f64]) -> f64 {
    let first = window[0];
    if window.iter().all(|value| *value == first) {
        return 0.0;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.max(0.0).sqrt()
}
