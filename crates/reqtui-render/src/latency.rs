//! Latency Series (spec §4.11): a fixed-capacity ring of recent send
//! durations rendered as a sparkline with a short-formatted last value.

use std::collections::VecDeque;
use std::time::Duration;

const DEFAULT_CAPACITY: usize = 120;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const GAMMA: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct LatencySeries {
    capacity: usize,
    samples: VecDeque<Duration>,
}

impl LatencySeries {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), samples: VecDeque::with_capacity(capacity) }
    }

    /// Ignores non-positive durations (spec §4.11: "`add(d)` ignores
    /// non-positive durations").
    pub fn add(&mut self, d: Duration) {
        if d.is_zero() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(d);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Renders a sparkline plus the last sample formatted as a short
    /// duration string. Bounds clamp to the 10th/90th percentile so a single
    /// hot sample cannot flatten the rest of the chart, and a gamma curve
    /// compresses the upper range for readability (spec §4.11).
    pub fn render(&self) -> String {
        if self.samples.is_empty() {
            return placeholder();
        }
        let micros: Vec<f64> = self.samples.iter().map(|d| d.as_secs_f64() * 1_000_000.0).collect();
        let (lo, hi) = bounds(&micros);
        let spark: String = micros.iter().map(|v| level(*v, lo, hi)).collect();
        let last = *self.samples.back().unwrap();
        format!("{spark} {}", format_short(last))
    }
}

impl Default for LatencySeries {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder() -> String {
    let bars: String = std::iter::repeat(SPARK_LEVELS[0]).take(8).collect();
    format!("{bars} --")
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let lo = percentile(&sorted, 0.10);
    let hi = percentile(&sorted, 0.90);
    if hi > lo { (lo, hi) } else { (sorted[0], sorted[sorted.len() - 1].max(sorted[0] + 1.0)) }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn level(value: f64, lo: f64, hi: f64) -> char {
    let clamped = value.clamp(lo, hi);
    let ratio = if hi > lo { (clamped - lo) / (hi - lo) } else { 0.0 };
    let shaped = ratio.powf(GAMMA);
    let idx = (shaped * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
    SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
}

/// Short duration formatting used in the sparkline label ("123ms", "1.2s").
pub fn format_short(d: Duration) -> String {
    let millis = d.as_secs_f64() * 1000.0;
    if millis < 1000.0 {
        format!("{}ms", millis.round() as u64)
    } else {
        format!("{:.1}s", millis / 1000.0)
    }
}
