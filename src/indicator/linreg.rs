use super::Line;

/// Least-squares line over each trailing window, evaluated at the newest point.
pub fn linear_regression(input: &[f64], period: usize) -> Option<Line> {
    if period == 0 || input.len() < period {
        return None;
    }
    if period == 1 {
        return Some(Line {
            begin: 0,
            values: input.to_vec(),
        });
    }

    let p = period as f64;
    let sum_x = p * (p - 1.0) / 2.0;
    let sum_xx = p * (p - 1.0) * (2.0 * p - 1.0) / 6.0;
    let divisor = p * sum_xx - sum_x * sum_x;

    let values = input
        .windows(period)
        .map(|window| {
            let mut sum_y = 0.0;
            let mut sum_xy = 0.0;
            for (x, y) in window.iter().enumerate() {
                sum_y += y;
                sum_xy += x as f64 * y;
            }
            let slope = (p * sum_xy - sum_x * sum_y) / divisor;
            let intercept = (sum_y - slope * sum_x) / p;
            intercept + slope * (p - 1.0)
        })
        .collect();

    Some(Line {
        begin: period - 1,
        values,
    })
}
