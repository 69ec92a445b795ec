//! Profile Runner (spec §4.9): repeats a request `warmup + count` times
//! through the normal Dispatcher, then reduces the per-iteration durations
//! into the stats a pane's Stats tab renders.

use std::path::Path;
use std::time::{Duration, Instant};

use reqtui_model::snapshot::{
    FailureTally, HistogramBucket, LatencyStats, ProfileStats, RunStatus, WorkflowStats,
};
use reqtui_model::{CancelToken, Document, Environment, ProfileSpec, RequestDescriptor};
use reqtui_dispatcher::{Dispatcher, ExecutionContext};
use reqtui_oauth::OAuthTransport;

struct Sample {
    duration: Duration,
    error: Option<String>,
}

/// Runs `descriptor` `spec.warmup + spec.count` times. Warmup iterations run
/// through the same Dispatcher path but are excluded from the reported
/// stats. Returns immediately with a `Canceled` status report if `cancel`
/// fires between iterations (spec §4.9: "on cancellation the runner
/// finalizes immediately with a canceled stats report").
pub async fn run_profile<T: OAuthTransport>(
    dispatcher: &Dispatcher<T>,
    descriptor: &RequestDescriptor,
    spec: &ProfileSpec,
    base_timeout: Duration,
    doc: &Document,
    environment: &Environment,
    cwd: &Path,
    cancel: &CancelToken,
) -> ProfileStats {
    let total_iterations = spec.warmup + spec.count;
    let mut samples: Vec<Sample> = Vec::with_capacity(spec.count);
    let start = Instant::now();
    let mut canceled = false;

    for i in 0..total_iterations {
        if cancel.is_canceled() {
            canceled = true;
            break;
        }
        let ctx = ExecutionContext {
            doc,
            environment,
            capture_env_override: None,
            cwd,
            chained_vars: Default::default(),
        };
        let iter_start = Instant::now();
        let outcome = dispatcher.execute_request(descriptor, base_timeout, ctx).await;
        let duration = iter_start.elapsed();
        let error = outcome_error(&outcome.response);

        if i >= spec.warmup {
            samples.push(Sample { duration, error });
        }

        if let Some(delay) = spec.delay {
            if i + 1 < total_iterations {
                tokio::select! {
                    biased;
                    _ = cancel.canceled() => { canceled = true; }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        if canceled {
            break;
        }
    }

    build_stats(samples, start.elapsed(), canceled)
}

/// Runs every descriptor in `steps` through the Dispatcher in document
/// order, stopping early if `cancel` fires. A lighter-weight sibling of
/// `run_profile`: one pass, no percentiles, just a pass/fail tally.
pub async fn run_workflow<T: OAuthTransport>(
    dispatcher: &Dispatcher<T>,
    steps: &[RequestDescriptor],
    base_timeout: Duration,
    doc: &Document,
    environment: &Environment,
    cwd: &Path,
    cancel: &CancelToken,
) -> WorkflowStats {
    let start = Instant::now();
    let mut steps_run = 0;
    let mut steps_failed = 0;

    for descriptor in steps {
        if cancel.is_canceled() {
            break;
        }
        let ctx = ExecutionContext {
            doc,
            environment,
            capture_env_override: None,
            cwd,
            chained_vars: Default::default(),
        };
        let outcome = dispatcher.execute_request(descriptor, base_timeout, ctx).await;
        steps_run += 1;
        if outcome_error(&outcome.response).is_some() {
            steps_failed += 1;
        }
    }

    WorkflowStats { steps_run, steps_failed, elapsed: start.elapsed() }
}

fn outcome_error(response: &reqtui_model::ResponseMsg) -> Option<String> {
    use reqtui_model::ResponseMsg;
    match response {
        ResponseMsg::Http { result: Err(e), .. } => Some(e.to_string()),
        ResponseMsg::Grpc { result: Err(e), .. } => Some(e.to_string()),
        _ => None,
    }
}

fn build_stats(samples: Vec<Sample>, elapsed: Duration, canceled: bool) -> ProfileStats {
    let runs = samples.len();
    let failures = samples.iter().filter(|s| s.error.is_some()).count();
    let successes = runs - failures;

    let mut durations: Vec<Duration> = samples.iter().map(|s| s.duration).collect();
    durations.sort();

    let latency = (!durations.is_empty()).then(|| latency_stats(&durations));
    let histogram = if durations.is_empty() { Vec::new() } else { build_histogram(&durations) };

    let mut failure_counts: Vec<FailureTally> = Vec::new();
    for sample in &samples {
        if let Some(msg) = &sample.error {
            match failure_counts.iter_mut().find(|f| &f.message == msg) {
                Some(tally) => tally.count += 1,
                None => failure_counts.push(FailureTally { message: msg.clone(), count: 1 }),
            }
        }
    }

    let throughput_per_sec = if elapsed.as_secs_f64() > 0.0 {
        runs as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    ProfileStats {
        runs,
        successes,
        failures,
        elapsed,
        throughput_per_sec,
        status: if canceled { RunStatus::Canceled } else { RunStatus::Completed },
        note: canceled.then(|| "canceled before completion".to_string()),
        latency,
        histogram,
        failure_messages: failure_counts,
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn latency_stats(sorted: &[Duration]) -> LatencyStats {
    let n = sorted.len() as f64;
    let mean_micros = sorted.iter().map(|d| d.as_secs_f64() * 1_000_000.0).sum::<f64>() / n;
    let variance = sorted
        .iter()
        .map(|d| (d.as_secs_f64() * 1_000_000.0 - mean_micros).powi(2))
        .sum::<f64>()
        / n;
    LatencyStats {
        min: sorted[0],
        p50: percentile(sorted, 0.50),
        p90: percentile(sorted, 0.90),
        p95: percentile(sorted, 0.95),
        p99: percentile(sorted, 0.99),
        max: sorted[sorted.len() - 1],
        mean: Duration::from_secs_f64(mean_micros / 1_000_000.0),
        median: percentile(sorted, 0.50),
        stddev_micros: variance.sqrt(),
    }
}

/// 10 equal-width buckets spanning [min, max], used by the colorized stats
/// renderer to shade against p50/p90 thresholds (spec §4.9).
fn build_histogram(sorted: &[Duration]) -> Vec<HistogramBucket> {
    const BUCKETS: usize = 10;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if min == max {
        return vec![HistogramBucket { lower: min, upper: max, count: sorted.len() }];
    }
    let span = (max - min).as_secs_f64();
    let width = span / BUCKETS as f64;
    let mut buckets: Vec<HistogramBucket> = (0..BUCKETS)
        .map(|i| HistogramBucket {
            lower: min + Duration::from_secs_f64(width * i as f64),
            upper: min + Duration::from_secs_f64(width * (i + 1) as f64),
            count: 0,
        })
        .collect();
    for d in sorted {
        let offset = (*d - min).as_secs_f64();
        let idx = ((offset / span) * BUCKETS as f64).floor() as usize;
        buckets[idx.min(BUCKETS - 1)].count += 1;
    }
    buckets
}
