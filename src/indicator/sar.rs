use super::Line;

/// Wilder's parabolic stop and reverse. The opening direction is chosen from the first two
/// candles' directional movement, output starts at the second candle.
pub fn sar(high: &[f64], low: &[f64], acceleration: f64, maximum: f64) -> Option<Line> {
    let n = high.len().min(low.len());
    if n < 2 {
        return None;
    }
    let step = acceleration.min(maximum);
    let mut af = step;

    let up_move = high[1] - high[0];
    let down_move = low[0] - low[1];
    let mut is_long = !(down_move > 0.0 && up_move < down_move);

    let (mut ep, mut stop) = if is_long {
        (high[1], low[0])
    } else {
        (low[1], high[0])
    };

    let mut new_high = high[0];
    let mut new_low = low[0];
    let mut values = Vec::with_capacity(n - 1);
    for i in 1..n {
        let prev_high = new_high;
        let prev_low = new_low;
        new_high = high[i];
        new_low = low[i];

        if is_long {
            if new_low <= stop {
                is_long = false;
                stop = ep.max(prev_high).max(new_high);
                values.push(stop);

                af = step;
                ep = new_low;
                stop += af * (ep - stop);
                stop = stop.max(prev_high).max(new_high);
            } else {
                values.push(stop);
                if new_high > ep {
                    ep = new_high;
                    af = (af + step).min(maximum);
                }
                stop += af * (ep - stop);
                stop = stop.min(prev_low).min(new_low);
            }
        } else if new_high >= stop {
            is_long = true;
            stop = ep.min(prev_low).min(new_low);
            values.push(stop);

            af = step;
            ep = new_high;
            stop += af * (ep - stop);
            stop = stop.min(prev_low).min(new_low);
        } else {
            values.push(stop);
            if new_low < ep {
                ep = new_low;
                af = (af + step).min(maximum);
            }
            stop += af * (ep - stop);
            stop = stop.max(prev_high).max(new_high);
        }
    }

    Some(Line { begin: 1, values })
}
