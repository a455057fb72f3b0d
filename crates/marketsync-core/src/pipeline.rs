//! Run controller: one bounded enrichment run per invocation.
//!
//! ```text
//! Idle -> ValidatingInput -> ResolvingSymbols -> Processing -> Summarizing -> Done
//!              \                   \
//!               `-------------------`--> Failed
//! ```
//!
//! `Failed` is only reachable before processing starts. Once the first
//! symbol is scheduled the run always ends in `Done`, with per-symbol
//! failures encoded in the summary.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::{ConfigEcho, ResultAggregator, SummaryHeader};
use crate::resolver::Unresolved;
use crate::config::{PipelineSettings, ProviderRegistry};
use crate::scheduler::{run_batches, ScheduleConfig};
use crate::store::{RecordSink, StoreError, StoreFuture, SymbolSource};
use crate::transform::{transform, TransformContext};
use crate::{
    CanonicalRecord, JobKind, RunSummary, Symbol, SymbolOutcome, UtcDateTime, WatchlistItem,
};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_DELAY_MS: u64 = 1_000;
pub const MAX_DELAY_MS: u64 = 60_000;

/// Extra wait past a write deadline before the controller stops listening.
/// Sinks refuse late writes themselves; this only catches a sink that hangs.
const SINK_GRACE: Duration = Duration::from_millis(250);

/// Trigger input as received. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub symbols: Option<Vec<String>>,
    pub batch_size: Option<i64>,
    pub delay_ms: Option<i64>,
}

impl RunRequest {
    /// Reads a JSON body field by field. A missing, non-JSON or non-object
    /// body, or a field of the wrong type, falls back to the default for
    /// that field.
    pub fn from_json_lenient(body: &[u8]) -> Self {
        let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };

        let symbols = object.get("symbols").and_then(Value::as_array).map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        });
        let integer = |key: &str| {
            object.get(key).and_then(|value| {
                value
                    .as_i64()
                    .or_else(|| value.as_f64().filter(|n| n.is_finite()).map(|n| n as i64))
            })
        };

        Self {
            symbols,
            batch_size: integer("batch_size"),
            delay_ms: integer("delay_ms"),
        }
    }
}

/// Immutable per-run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Replaces the symbol-source query when present and non-empty.
    pub symbol_override: Option<Vec<Symbol>>,
    pub batch_size: usize,
    pub inter_call_delay_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            symbol_override: None,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_call_delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl RunConfig {
    /// Normalizes a request: non-positive or absent batch size becomes 10,
    /// negative or absent delay becomes 1000 ms, both are capped, and
    /// override entries that are not valid symbols are dropped.
    pub fn from_request(request: &RunRequest) -> Self {
        let batch_size = match request.batch_size {
            Some(size) if size > 0 => usize::try_from(size)
                .unwrap_or(MAX_BATCH_SIZE)
                .min(MAX_BATCH_SIZE),
            _ => DEFAULT_BATCH_SIZE,
        };
        let inter_call_delay_ms = match request.delay_ms {
            Some(delay) if delay >= 0 => u64::try_from(delay)
                .unwrap_or(MAX_DELAY_MS)
                .min(MAX_DELAY_MS),
            _ => DEFAULT_DELAY_MS,
        };

        let symbol_override = request
            .symbols
            .as_ref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                let (valid, rejected) = Symbol::parse_all(raw);
                if !rejected.is_empty() {
                    tracing::debug!(?rejected, "dropped invalid override symbols");
                }
                valid
            });

        Self {
            symbol_override,
            batch_size,
            inter_call_delay_ms,
        }
    }

    pub fn echo(&self) -> ConfigEcho {
        ConfigEcho {
            batch_size: self.batch_size,
            delay_between_requests_ms: self.inter_call_delay_ms,
        }
    }
}

/// Run controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    ValidatingInput,
    ResolvingSymbols,
    Processing,
    Summarizing,
    Done,
    Failed,
}

impl RunPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ValidatingInput => "validating_input",
            Self::ResolvingSymbols => "resolving_symbols",
            Self::Processing => "processing",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-processing failure. Nothing is scheduled when one of these is
/// returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("symbol source failed: {0}")]
    SymbolSource(#[source] StoreError),
    #[error("no symbols to process for the {job} job")]
    NoSymbols { job: JobKind },
}

impl RunError {
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Configuration(_) | Self::SymbolSource(_) => 500,
            Self::NoSymbols { .. } => 404,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "run.configuration",
            Self::SymbolSource(_) => "run.symbol_source",
            Self::NoSymbols { .. } => "run.no_symbols",
        }
    }
}

struct PhaseTracker {
    phase: RunPhase,
}

impl PhaseTracker {
    fn advance(&mut self, next: RunPhase) {
        tracing::info!(from = %self.phase, to = %next, "run phase");
        self.phase = next;
    }

    fn fail(&mut self, error: RunError) -> RunError {
        tracing::warn!(from = %self.phase, to = %RunPhase::Failed, code = error.code(), %error, "run failed");
        self.phase = RunPhase::Failed;
        error
    }
}

async fn bounded<T>(timeout: Duration, call: StoreFuture<'_, T>) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Drives one run from configuration to summary.
#[derive(Clone)]
pub struct RunController {
    registry: Arc<ProviderRegistry>,
    source: Arc<dyn SymbolSource>,
    sink: Arc<dyn RecordSink>,
    settings: PipelineSettings,
}

impl RunController {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        source: Arc<dyn SymbolSource>,
        sink: Arc<dyn RecordSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            source,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs `job` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] only for failures before the first symbol is
    /// scheduled: an empty provider chain, an unreachable symbol source, or
    /// no valid symbols.
    pub async fn run(&self, job: JobKind, config: RunConfig) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_run", %run_id, job = %job);
        self.execute(run_id, job, config).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        job: JobKind,
        config: RunConfig,
    ) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let mut tracker = PhaseTracker {
            phase: RunPhase::Idle,
        };

        tracker.advance(RunPhase::ValidatingInput);
        let resolver = self.registry.resolver_for(job);
        if resolver.is_empty() {
            return Err(tracker.fail(RunError::Configuration(format!(
                "no provider configured for the {} dataset",
                job.dataset()
            ))));
        }

        tracker.advance(RunPhase::ResolvingSymbols);
        let symbols = match config.symbol_override.clone() {
            Some(symbols) => symbols,
            None => {
                let raw = bounded(self.settings.store_timeout, self.source.symbols(job))
                    .await
                    .map_err(|error| tracker.fail(RunError::SymbolSource(error)))?;
                let (valid, rejected) = Symbol::parse_all(&raw);
                if !rejected.is_empty() {
                    tracing::debug!(count = rejected.len(), ?rejected, "dropped malformed stored symbols");
                }
                valid
            }
        };
        if symbols.is_empty() {
            return Err(tracker.fail(RunError::NoSymbols { job }));
        }

        tracker.advance(RunPhase::Processing);
        tracing::info!(
            symbols = symbols.len(),
            batch_size = config.batch_size,
            delay_ms = config.inter_call_delay_ms,
            chain = ?resolver.source_chain(),
            "processing symbols"
        );
        let schedule = ScheduleConfig {
            batch_size: config.batch_size,
            inter_call_delay: Duration::from_millis(config.inter_call_delay_ms),
            deadline: self.settings.run_deadline.map(|budget| started + budget),
        };
        let report =
            run_batches(&symbols, &schedule, move |symbol| self.process_symbol(job, symbol)).await;

        tracker.advance(RunPhase::Summarizing);
        let mut aggregator = ResultAggregator::new(self.settings.outcome_cap);
        for outcome in report.outcomes {
            aggregator.push(outcome);
        }
        let summary = aggregator.finish(SummaryHeader {
            run_id,
            job,
            symbols_requested: symbols.len(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp: UtcDateTime::now(),
            batches: report.batches,
            deadline_exceeded: report.deadline_exceeded,
            config: config.echo(),
        });

        if let Err(error) = bounded(self.settings.store_timeout, self.sink.record_run(&summary)).await {
            tracing::warn!(%error, "failed to record run log entry");
        }

        tracker.advance(RunPhase::Done);
        tracing::info!(
            symbols_processed = summary.symbols_processed,
            total_saved = summary.total_saved,
            total_errors = summary.total_errors,
            elapsed_ms = summary.elapsed_ms,
            deadline_exceeded = summary.deadline_exceeded,
            "run finished"
        );
        Ok(summary)
    }

    async fn process_symbol(&self, job: JobKind, symbol: Symbol) -> SymbolOutcome {
        let outcome = self.enrich(job, symbol).await;
        if outcome.status.is_failure() {
            tracing::warn!(
                symbol = %outcome.symbol,
                status = outcome.status.as_str(),
                fetched = outcome.records_fetched,
                saved = outcome.records_saved,
                errors = outcome.errors,
                "symbol outcome"
            );
        } else {
            tracing::info!(
                symbol = %outcome.symbol,
                status = outcome.status.as_str(),
                provider = outcome.provider.map(|p| p.as_str()),
                fetched = outcome.records_fetched,
                saved = outcome.records_saved,
                errors = outcome.errors,
                "symbol outcome"
            );
        }
        outcome
    }

    async fn enrich(&self, job: JobKind, symbol: Symbol) -> SymbolOutcome {
        let items: Vec<WatchlistItem> = match job {
            JobKind::Peers => Vec::new(),
            JobKind::Watchlist => {
                match bounded(self.settings.store_timeout, self.source.watchlist_items(&symbol)).await {
                    Ok(items) if items.is_empty() => {
                        tracing::debug!(symbol = %symbol, "no watchlist items reference symbol");
                        return SymbolOutcome::empty(symbol, job);
                    }
                    Ok(items) => items,
                    Err(error) => {
                        tracing::warn!(symbol = %symbol, %error, "watchlist item lookup failed");
                        return SymbolOutcome::processing_failed(symbol);
                    }
                }
            }
        };

        let resolution = match self.registry.resolver_for(job).resolve(&symbol).await {
            Ok(resolution) => resolution,
            Err(Unresolved::NoData) => return SymbolOutcome::empty(symbol, job),
            Err(Unresolved::RateLimited) => {
                tracing::warn!(symbol = %symbol, "every provider refused on its request budget");
                return SymbolOutcome::rate_limited(symbol);
            }
        };
        let fanout = match job {
            JobKind::Peers => 1,
            JobKind::Watchlist => items.len(),
        };

        let now = UtcDateTime::now();
        let mut errors = 0;
        let mut valid: Vec<CanonicalRecord> = Vec::with_capacity(resolution.records.len());
        for record in &resolution.records {
            let item_ids: Vec<Option<&str>> = match job {
                JobKind::Peers => vec![None],
                JobKind::Watchlist => items.iter().map(|item| Some(item.item_id.as_str())).collect(),
            };
            for item_id in item_ids {
                let context = TransformContext {
                    requested: &symbol,
                    provider: resolution.provider,
                    item_id,
                    now,
                };
                match transform(record, &context) {
                    Ok(canonical) => valid.push(canonical),
                    Err(error) => {
                        errors += 1;
                        tracing::warn!(
                            symbol = %symbol,
                            provider = %resolution.provider,
                            record = record.symbol(),
                            %error,
                            "record rejected by transform"
                        );
                    }
                }
            }
        }

        let mut saved = 0;
        for record in &valid {
            let deadline = Instant::now() + self.settings.store_timeout;
            let call = self.sink.upsert(record, deadline);
            match bounded(self.settings.store_timeout + SINK_GRACE, call).await {
                Ok(()) => saved += 1,
                Err(error) => {
                    errors += 1;
                    tracing::warn!(
                        symbol = %symbol,
                        key = %record.natural_key(),
                        %error,
                        "upsert failed"
                    );
                }
            }
        }

        SymbolOutcome::resolved(
            symbol,
            resolution.provider,
            resolution.records.len() * fanout,
            valid.len(),
            saved,
            errors,
        )
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
