use std::future::Future;
use std::time::{Duration, Instant};

use crate::Symbol;

/// Pacing for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Reporting group size; does not change execution order.
    pub batch_size: usize,
    /// Pause between two consecutive symbols.
    pub inter_call_delay: Duration,
    /// No new symbol is started after this instant.
    pub deadline: Option<Instant>,
}

/// Step results plus the batch bookkeeping of one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReport<T> {
    pub outcomes: Vec<T>,
    /// Number of symbols processed in each batch, in order.
    pub batches: Vec<usize>,
    pub deadline_exceeded: bool,
}

/// Runs `step` once per symbol, strictly in order and one at a time.
///
/// Sleeps `inter_call_delay` after every symbol except the last. Stops
/// early, keeping the outcomes gathered so far, once `deadline` passes.
pub async fn run_batches<T, F, Fut>(
    symbols: &[Symbol],
    config: &ScheduleConfig,
    mut step: F,
) -> ScheduleReport<T>
where
    F: FnMut(Symbol) -> Fut,
    Fut: Future<Output = T>,
{
    let batch_size = config.batch_size.max(1);
    let total_batches = symbols.len().div_ceil(batch_size);
    let mut report = ScheduleReport {
        outcomes: Vec::with_capacity(symbols.len()),
        batches: Vec::with_capacity(total_batches),
        deadline_exceeded: false,
    };

    'batches: for (batch_index, batch) in symbols.chunks(batch_size).enumerate() {
        tracing::debug!(
            batch = batch_index + 1,
            total_batches,
            size = batch.len(),
            "starting batch"
        );
        report.batches.push(0);

        for symbol in batch {
            if config.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                report.deadline_exceeded = true;
                tracing::warn!(
                    processed = report.outcomes.len(),
                    remaining = symbols.len() - report.outcomes.len(),
                    "run deadline exceeded; no further symbols scheduled"
                );
                break 'batches;
            }

            report.outcomes.push(step(symbol.clone()).await);
            if let Some(count) = report.batches.last_mut() {
                *count += 1;
            }

            let is_last = report.outcomes.len() == symbols.len();
            if !is_last && !config.inter_call_delay.is_zero() {
                tokio::time::sleep(config.inter_call_delay).await;
            }
        }
    }

    if report.batches.last() == Some(&0) {
        report.batches.pop();
    }
    report
}
