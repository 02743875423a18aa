use super::Line;

/// Wilder's RSI. The first averages are simple means over the first `period` changes, after that
/// each average is smoothed by `(avg * (period - 1) + change) / period`.
pub fn rsi(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() <= period {
        return None;
    }
    let p = period as f64;

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = input[i] - input[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= p;
    avg_loss /= p;

    let mut values = Vec::with_capacity(input.len() - period);
    values.push(score(avg_gain, avg_loss));
    for i in period + 1..input.len() {
        let change = input[i] - input[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        values.push(score(avg_gain, avg_loss));
    }
    Some(Line {
        begin: period,
        values,
    })
}

fn score(avg_gain: f64, avg_loss: f64) -> f64 {
    let total = avg_gain + avg_loss;
    // No movement at all in the window
    if total == 0.0 {
        return 0.0;
    }
    (100.0 * avg_gain / total).clamp(0.0, 100.0)
}
