use std::collections::BTreeMap;

use marketsync_core::{ConfigEcho, JobKind, OutcomeStatus, RunSummary, SymbolOutcome};
use serde::Serialize;

/// Body of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub summary: SummaryBody,
    pub results: Vec<SymbolOutcome>,
    pub config: ConfigEcho,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryBody {
    pub total_symbols_requested: usize,
    pub symbols_processed: usize,
    pub total_saved: usize,
    pub total_errors: usize,
    pub processing_time_ms: u64,
    pub timestamp: String,
    pub run_id: String,
    pub job: JobKind,
    pub status_counts: BTreeMap<OutcomeStatus, usize>,
    pub batches: Vec<usize>,
    pub results_truncated: bool,
    pub deadline_exceeded: bool,
}

/// Body of a rejected request or a run that failed before processing.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<&'static str>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: Some(code),
            allowed_methods: None,
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            success: false,
            error: String::from("Method not allowed"),
            code: None,
            allowed_methods: Some(vec!["POST"]),
        }
    }
}

impl From<RunSummary> for SyncResponse {
    fn from(summary: RunSummary) -> Self {
        let mut message = format!(
            "{} sync completed: {} of {} symbols processed, {} records saved, {} errors",
            summary.job,
            summary.symbols_processed,
            summary.symbols_requested,
            summary.total_saved,
            summary.total_errors
        );
        if summary.deadline_exceeded {
            message.push_str(" (stopped at run deadline)");
        }

        Self {
            success: true,
            message,
            summary: SummaryBody {
                total_symbols_requested: summary.symbols_requested,
                symbols_processed: summary.symbols_processed,
                total_saved: summary.total_saved,
                total_errors: summary.total_errors,
                processing_time_ms: summary.elapsed_ms,
                timestamp: summary.timestamp.format_rfc3339(),
                run_id: summary.run_id.to_string(),
                job: summary.job,
                status_counts: summary.status_counts,
                batches: summary.batches,
                results_truncated: summary.results_truncated,
                deadline_exceeded: summary.deadline_exceeded,
            },
            results: summary.outcomes,
            config: summary.config,
        }
    }
}
