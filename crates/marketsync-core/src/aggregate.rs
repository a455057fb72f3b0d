use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{JobKind, ProviderId, Symbol, UtcDateTime};

/// Maximum number of per-symbol outcomes echoed in a summary.
pub const DEFAULT_OUTCOME_CAP: usize = 100;

/// Terminal result of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    NoPeersFound,
    NoDataFound,
    TransformFailed,
    SaveFailed,
    ProcessingFailed,
    /// No provider answered and at least one refused on its request budget.
    RateLimited,
}

impl OutcomeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoPeersFound => "no_peers_found",
            Self::NoDataFound => "no_data_found",
            Self::TransformFailed => "transform_failed",
            Self::SaveFailed => "save_failed",
            Self::ProcessingFailed => "processing_failed",
            Self::RateLimited => "rate_limited",
        }
    }

    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::TransformFailed | Self::SaveFailed | Self::ProcessingFailed | Self::RateLimited
        )
    }
}

/// Per-symbol record counts and status.
///
/// Counts are per candidate record. A watchlist quote fans out to
/// one record per watchlist item holding the symbol, so one fetched quote
/// watched by two users counts as two fetched records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolOutcome {
    pub symbol: Symbol,
    pub records_fetched: usize,
    pub records_saved: usize,
    pub errors: usize,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
}

impl SymbolOutcome {
    /// No provider returned data. Not an error.
    pub fn empty(symbol: Symbol, job: JobKind) -> Self {
        Self {
            symbol,
            records_fetched: 0,
            records_saved: 0,
            errors: 0,
            status: job.empty_status(),
            provider: None,
        }
    }

    /// The symbol could not be processed at all.
    pub fn processing_failed(symbol: Symbol) -> Self {
        Self {
            symbol,
            records_fetched: 0,
            records_saved: 0,
            errors: 1,
            status: OutcomeStatus::ProcessingFailed,
            provider: None,
        }
    }

    /// Every provider failed and the budget refusals leave it unknown
    /// whether data exists. Counted as one error.
    pub fn rate_limited(symbol: Symbol) -> Self {
        Self {
            symbol,
            records_fetched: 0,
            records_saved: 0,
            errors: 1,
            status: OutcomeStatus::RateLimited,
            provider: None,
        }
    }

    /// Classifies a symbol that resolved data.
    ///
    /// No valid record after transform is `transform_failed`; valid records
    /// with none saved is `save_failed`; anything saved is `success`.
    pub fn resolved(
        symbol: Symbol,
        provider: ProviderId,
        records_fetched: usize,
        records_valid: usize,
        records_saved: usize,
        errors: usize,
    ) -> Self {
        let status = if records_valid == 0 {
            OutcomeStatus::TransformFailed
        } else if records_saved == 0 {
            OutcomeStatus::SaveFailed
        } else {
            OutcomeStatus::Success
        };
        Self {
            symbol,
            records_fetched,
            records_saved,
            errors,
            status,
            provider: Some(provider),
        }
    }
}

/// Run configuration echoed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigEcho {
    pub batch_size: usize,
    pub delay_between_requests_ms: u64,
}

/// Run-level facts not derived from outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryHeader {
    pub run_id: Uuid,
    pub job: JobKind,
    pub symbols_requested: usize,
    pub elapsed_ms: u64,
    pub timestamp: UtcDateTime,
    pub batches: Vec<usize>,
    pub deadline_exceeded: bool,
    pub config: ConfigEcho,
}

/// Aggregated result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub job: JobKind,
    pub symbols_requested: usize,
    pub symbols_processed: usize,
    pub total_saved: usize,
    pub total_errors: usize,
    pub status_counts: BTreeMap<OutcomeStatus, usize>,
    pub elapsed_ms: u64,
    pub timestamp: UtcDateTime,
    /// First outcomes in processing order, at most the aggregator cap.
    pub outcomes: Vec<SymbolOutcome>,
    pub results_truncated: bool,
    pub batches: Vec<usize>,
    pub deadline_exceeded: bool,
    pub config: ConfigEcho,
}

/// Accumulates outcomes; totals always cover every pushed outcome, while the
/// detail list stops at `cap`.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    cap: usize,
    outcomes: Vec<SymbolOutcome>,
    processed: usize,
    total_saved: usize,
    total_errors: usize,
    status_counts: BTreeMap<OutcomeStatus, usize>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_OUTCOME_CAP)
    }
}

impl ResultAggregator {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            outcomes: Vec::with_capacity(cap.min(64)),
            processed: 0,
            total_saved: 0,
            total_errors: 0,
            status_counts: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, outcome: SymbolOutcome) {
        self.processed += 1;
        self.total_saved += outcome.records_saved;
        self.total_errors += outcome.errors;
        *self.status_counts.entry(outcome.status).or_insert(0) += 1;
        if self.outcomes.len() < self.cap {
            self.outcomes.push(outcome);
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn finish(self, header: SummaryHeader) -> RunSummary {
        RunSummary {
            run_id: header.run_id,
            job: header.job,
            symbols_requested: header.symbols_requested,
            symbols_processed: self.processed,
            total_saved: self.total_saved,
            total_errors: self.total_errors,
            status_counts: self.status_counts,
            elapsed_ms: header.elapsed_ms,
            timestamp: header.timestamp,
            results_truncated: self.processed > self.outcomes.len(),
            outcomes: self.outcomes,
            batches: header.batches,
            deadline_exceeded: header.deadline_exceeded,
            config: header.config,
        }
    }
}

/// Folds a finished list of outcomes into a summary.
pub fn accumulate<I>(outcomes: I, cap: usize, header: SummaryHeader) -> RunSummary
where
    I: IntoIterator<Item = SymbolOutcome>,
{
    let mut aggregator = ResultAggregator::new(cap);
    for outcome in outcomes {
        aggregator.push(outcome);
    }
    aggregator.finish(header)
}
