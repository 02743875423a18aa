use super::ma::ema;
use super::Output;

/// MACD line, signal line and histogram. A slow period shorter than the fast period is swapped.
pub fn macd(input: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Output> {
    let (fast, slow) = if slow < fast {
        (slow, fast)
    } else {
        (fast, slow)
    };
    let fast_line = ema(input, fast)?;
    let slow_line = ema(input, slow)?;

    let difference: Vec<f64> = (slow_line.begin..input.len())
        .map(|i| fast_line.values[i - fast_line.begin] - slow_line.values[i - slow_line.begin])
        .collect();
    let signal_line = ema(&difference, signal)?;

    let macd_values = difference[signal_line.begin..].to_vec();
    let histogram = macd_values
        .iter()
        .zip(signal_line.values.iter())
        .map(|(macd, signal)| macd - signal)
        .collect();

    Some(Output {
        begin: slow_line.begin + signal_line.begin,
        columns: vec![macd_values, signal_line.values, histogram],
    })
}
