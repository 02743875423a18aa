//! Hilbert transform cycle measurement.
//!
//! Price is smoothed with a four-bar weighted average, split into in-phase and quadrature
//! components by a Hilbert transform on alternating bars, and the homodyne discriminator turns
//! those into a dominant cycle period. The dominant cycle indicators and MAMA are built on
//! that measurement.
use std::f64::consts::PI;

use super::{Line, Output};

const A: f64 = 0.0962;
const B: f64 = 0.5769;
const RAD_TO_DEG: f64 = 180.0 / PI;
const DEG_TO_RAD: f64 = PI / 180.0;
const SMOOTH_PRICE_SIZE: usize = 50;

/// First defined index of [ht_dcperiod] and [mama].
pub const CYCLE_LOOKBACK: usize = 32;
/// First defined index of [ht_dcphase], [ht_trendline] and [ht_trendmode].
pub const PHASE_LOOKBACK: usize = 63;

/// Running 4-3-2-1 weighted average, newest price weighted 4.
struct PriceSmoother {
    sum: f64,
    sub: f64,
    trailing: f64,
    trailing_idx: usize,
}

impl PriceSmoother {
    fn new(input: &[f64]) -> Self {
        Self {
            sum: input[0] + 2.0 * input[1] + 3.0 * input[2],
            sub: input[0] + input[1] + input[2],
            trailing: 0.0,
            trailing_idx: 0,
        }
    }

    fn next(&mut self, input: &[f64], price: f64) -> f64 {
        self.sub += price - self.trailing;
        self.sum += 4.0 * price;
        self.trailing = input[self.trailing_idx];
        self.trailing_idx += 1;
        let smoothed = self.sum * 0.1;
        self.sum -= self.sub;
        smoothed
    }
}

#[derive(Default)]
struct Taps {
    ring: [f64; 3],
    prev: f64,
    prev_input: f64,
}

/// Hilbert FIR kept separately for odd and even bars.
#[derive(Default)]
struct Transform {
    odd: Taps,
    even: Taps,
}

impl Transform {
    fn apply(&mut self, input: f64, even: bool, slot: usize, gain: f64) -> f64 {
        let taps = if even { &mut self.even } else { &mut self.odd };
        let scaled = A * input;
        let mut value = scaled - taps.ring[slot];
        taps.ring[slot] = scaled;
        value -= taps.prev;
        taps.prev = B * taps.prev_input;
        value += taps.prev;
        taps.prev_input = input;
        value * gain
    }
}

struct Bar {
    index: usize,
    price: f64,
    smoothed: f64,
    /// Phase of the in-phase/quadrature pair in degrees, used by MAMA.
    phase: f64,
    smooth_period: f64,
}

struct Cycle<'a> {
    input: &'a [f64],
    smoother: PriceSmoother,
    today: usize,
    slot: usize,
    detrender: Transform,
    q1: Transform,
    ji: Transform,
    jq: Transform,
    i1_odd_prev2: f64,
    i1_odd_prev3: f64,
    i1_even_prev2: f64,
    i1_even_prev3: f64,
    prev_i2: f64,
    prev_q2: f64,
    re: f64,
    im: f64,
    period: f64,
    smooth_period: f64,
}

impl<'a> Cycle<'a> {
    /// Callers check that `input` is longer than their lookback, which covers the warmup.
    fn new(input: &'a [f64], warmup: usize) -> Self {
        let mut smoother = PriceSmoother::new(input);
        let mut today = 3;
        for _ in 0..warmup {
            smoother.next(input, input[today]);
            today += 1;
        }
        Self {
            input,
            smoother,
            today,
            slot: 0,
            detrender: Transform::default(),
            q1: Transform::default(),
            ji: Transform::default(),
            jq: Transform::default(),
            i1_odd_prev2: 0.0,
            i1_odd_prev3: 0.0,
            i1_even_prev2: 0.0,
            i1_even_prev3: 0.0,
            prev_i2: 0.0,
            prev_q2: 0.0,
            re: 0.0,
            im: 0.0,
            period: 0.0,
            smooth_period: 0.0,
        }
    }

    /// Measurement starting at the first bar of a `lookback` indicator.
    fn for_lookback(input: &'a [f64], lookback: usize) -> Option<Self> {
        if input.len() <= lookback {
            return None;
        }
        let warmup = if lookback == PHASE_LOOKBACK { 34 } else { 9 };
        Some(Self::new(input, warmup))
    }
}

impl Iterator for Cycle<'_> {
    type Item = Bar;

    fn next(&mut self) -> Option<Bar> {
        let price = *self.input.get(self.today)?;
        let gain = 0.075 * self.period + 0.54;
        let smoothed = self.smoother.next(self.input, price);

        let even = self.today % 2 == 0;
        let slot = self.slot;
        let detrender = self.detrender.apply(smoothed, even, slot, gain);
        let q1 = self.q1.apply(detrender, even, slot, gain);
        let i1 = if even {
            self.i1_even_prev3
        } else {
            self.i1_odd_prev3
        };
        let phase = if i1 != 0.0 {
            (q1 / i1).atan() * RAD_TO_DEG
        } else {
            0.0
        };
        let ji = self.ji.apply(i1, even, slot, gain);
        let jq = self.jq.apply(q1, even, slot, gain);
        if even {
            self.slot = (self.slot + 1) % 3;
            self.i1_odd_prev3 = self.i1_odd_prev2;
            self.i1_odd_prev2 = detrender;
        } else {
            self.i1_even_prev3 = self.i1_even_prev2;
            self.i1_even_prev2 = detrender;
        }

        let q2 = 0.2 * (q1 + ji) + 0.8 * self.prev_q2;
        let i2 = 0.2 * (i1 - jq) + 0.8 * self.prev_i2;
        self.re = 0.2 * (i2 * self.prev_i2 + q2 * self.prev_q2) + 0.8 * self.re;
        self.im = 0.2 * (i2 * self.prev_q2 - q2 * self.prev_i2) + 0.8 * self.im;
        self.prev_q2 = q2;
        self.prev_i2 = i2;

        let previous = self.period;
        if self.im != 0.0 && self.re != 0.0 {
            self.period = 360.0 / ((self.im / self.re).atan() * RAD_TO_DEG);
        }
        self.period = self
            .period
            .min(1.5 * previous)
            .max(0.67 * previous)
            .clamp(6.0, 50.0);
        self.period = 0.2 * self.period + 0.8 * previous;
        self.smooth_period = 0.33 * self.period + 0.67 * self.smooth_period;

        let index = self.today;
        self.today += 1;
        Some(Bar {
            index,
            price,
            smoothed,
            phase,
            smooth_period: self.smooth_period,
        })
    }
}

/// Phase of the dominant cycle over the last smoothed prices.
struct PhaseTracker {
    prices: [f64; SMOOTH_PRICE_SIZE],
    slot: usize,
    phase: f64,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            prices: [0.0; SMOOTH_PRICE_SIZE],
            slot: 0,
            phase: 0.0,
        }
    }

    fn update(&mut self, smoothed: f64, smooth_period: f64) -> f64 {
        self.prices[self.slot] = smoothed;
        let count = (smooth_period + 0.5) as usize;
        let mut real = 0.0;
        let mut imag = 0.0;
        let mut idx = self.slot;
        for i in 0..count {
            let angle = i as f64 * 2.0 * PI / count as f64;
            real += angle.sin() * self.prices[idx];
            imag += angle.cos() * self.prices[idx];
            idx = if idx == 0 { SMOOTH_PRICE_SIZE - 1 } else { idx - 1 };
        }

        if imag.abs() > 0.0 {
            self.phase = (real / imag).atan() * RAD_TO_DEG;
        } else if real < 0.0 {
            self.phase -= 90.0;
        } else if real > 0.0 {
            self.phase += 90.0;
        }
        self.phase += 90.0;
        // One bar of lag from the price smoother
        self.phase += 360.0 / smooth_period;
        if imag < 0.0 {
            self.phase += 180.0;
        }
        if self.phase > 315.0 {
            self.phase -= 360.0;
        }

        self.slot = (self.slot + 1) % SMOOTH_PRICE_SIZE;
        self.phase
    }
}

/// Average over the dominant cycle, smoothed over four bars.
#[derive(Default)]
struct Trendline {
    recent: [f64; 3],
}

impl Trendline {
    fn update(&mut self, input: &[f64], index: usize, smooth_period: f64) -> f64 {
        let count = (smooth_period + 0.5) as usize;
        let mut average: f64 = input[..=index].iter().rev().take(count).sum();
        if count > 0 {
            average /= count as f64;
        }
        let [first, second, third] = self.recent;
        let line = (4.0 * average + 3.0 * first + 2.0 * second + third) / 10.0;
        self.recent = [average, first, second];
        line
    }
}

/// Dominant cycle period in bars.
pub fn ht_dcperiod(input: &[f64]) -> Option<Line> {
    let cycle = Cycle::for_lookback(input, CYCLE_LOOKBACK)?;
    let values = cycle
        .filter(|bar| bar.index >= CYCLE_LOOKBACK)
        .map(|bar| bar.smooth_period)
        .collect();
    Some(Line {
        begin: CYCLE_LOOKBACK,
        values,
    })
}

/// Dominant cycle phase in degrees, within (-45, 315].
pub fn ht_dcphase(input: &[f64]) -> Option<Line> {
    let cycle = Cycle::for_lookback(input, PHASE_LOOKBACK)?;
    let mut tracker = PhaseTracker::new();
    let mut values = Vec::with_capacity(input.len() - PHASE_LOOKBACK);
    for bar in cycle {
        let phase = tracker.update(bar.smoothed, bar.smooth_period);
        if bar.index >= PHASE_LOOKBACK {
            values.push(phase);
        }
    }
    Some(Line {
        begin: PHASE_LOOKBACK,
        values,
    })
}

/// Instantaneous trendline.
pub fn ht_trendline(input: &[f64]) -> Option<Line> {
    let cycle = Cycle::for_lookback(input, PHASE_LOOKBACK)?;
    let mut trendline = Trendline::default();
    let mut values = Vec::with_capacity(input.len() - PHASE_LOOKBACK);
    for bar in cycle {
        let line = trendline.update(input, bar.index, bar.smooth_period);
        if bar.index >= PHASE_LOOKBACK {
            values.push(line);
        }
    }
    Some(Line {
        begin: PHASE_LOOKBACK,
        values,
    })
}

/// 1 while price is trending, 0 while it is in a cycle.
pub fn ht_trendmode(input: &[f64]) -> Option<Line> {
    let cycle = Cycle::for_lookback(input, PHASE_LOOKBACK)?;
    let mut tracker = PhaseTracker::new();
    let mut trendline = Trendline::default();
    let mut days_in_trend = 0usize;
    let mut sine = 0.0;
    let mut lead_sine = 0.0;
    let mut values = Vec::with_capacity(input.len() - PHASE_LOOKBACK);

    for bar in cycle {
        let prev_phase = tracker.phase;
        let phase = tracker.update(bar.smoothed, bar.smooth_period);
        let (prev_sine, prev_lead_sine) = (sine, lead_sine);
        sine = (phase * DEG_TO_RAD).sin();
        lead_sine = ((phase + 45.0) * DEG_TO_RAD).sin();
        let line = trendline.update(input, bar.index, bar.smooth_period);

        let mut trending = true;
        if (sine > lead_sine && prev_sine <= prev_lead_sine)
            || (sine < lead_sine && prev_sine >= prev_lead_sine)
        {
            days_in_trend = 0;
            trending = false;
        }
        days_in_trend += 1;
        if (days_in_trend as f64) < 0.5 * bar.smooth_period {
            trending = false;
        }
        let change = phase - prev_phase;
        if bar.smooth_period != 0.0
            && change > 0.67 * 360.0 / bar.smooth_period
            && change < 1.5 * 360.0 / bar.smooth_period
        {
            trending = false;
        }
        if line != 0.0 && ((bar.smoothed - line) / line).abs() >= 0.015 {
            trending = true;
        }

        if bar.index >= PHASE_LOOKBACK {
            values.push(if trending { 1.0 } else { 0.0 });
        }
    }
    Some(Line {
        begin: PHASE_LOOKBACK,
        values,
    })
}

/// MESA adaptive moving average and its following average, as two columns.
pub fn mama(input: &[f64], fast_limit: f64, slow_limit: f64) -> Option<Output> {
    let cycle = Cycle::for_lookback(input, CYCLE_LOOKBACK)?;
    let mut prev_phase = 0.0;
    let mut mama = 0.0;
    let mut fama = 0.0;
    let size = input.len() - CYCLE_LOOKBACK;
    let mut mamas = Vec::with_capacity(size);
    let mut famas = Vec::with_capacity(size);

    for bar in cycle {
        let delta = (prev_phase - bar.phase).max(1.0);
        prev_phase = bar.phase;
        let alpha = if delta > 1.0 {
            (fast_limit / delta).max(slow_limit)
        } else {
            fast_limit
        };
        mama = alpha * bar.price + (1.0 - alpha) * mama;
        let half = alpha * 0.5;
        fama = half * mama + (1.0 - half) * fama;
        if bar.index >= CYCLE_LOOKBACK {
            mamas.push(mama);
            famas.push(fama);
        }
    }
    Some(Output {
        begin: CYCLE_LOOKBACK,
        columns: vec![mamas, famas],
    })
}
