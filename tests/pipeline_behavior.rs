//! Behavior-driven tests for enrichment runs
//!
//! These tests drive the run controller end to end against scripted
//! providers and in-process stores, checking what a caller observes: which
//! symbols were processed, what got stored and what the summary reports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use marketsync_core::{
    CanonicalRecord, Dataset, FetchFuture, JobKind, MemoryStore, OutcomeStatus, PeerPayload,
    PipelineSettings, ProviderClient, ProviderId, ProviderRegistry, ProviderResolver,
    QuotePayload, RecordSink, RunConfig, RunController, RunError, RunRequest, RunSummary,
    SourceError, SourceRecord, StoreFuture, Symbol, SymbolSource, WarehouseStore, WatchlistItem,
};
use marketsync_warehouse::{Warehouse, WarehouseConfig};
use tempfile::tempdir;

// =============================================================================
// Test doubles
// =============================================================================

struct ScriptedProvider {
    id: ProviderId,
    dataset: Dataset,
    responses: HashMap<String, Result<Vec<SourceRecord>, SourceError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(id: ProviderId, dataset: Dataset) -> Self {
        Self {
            id,
            dataset,
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn respond(mut self, symbol: &str, result: Result<Vec<SourceRecord>, SourceError>) -> Self {
        self.responses.insert(symbol.to_owned(), result);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ProviderClient for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> FetchFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls lock")
                .push(symbol.to_string());
            self.responses
                .get(symbol.as_str())
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        })
    }
}

/// Sink that never answers within the store timeout.
struct StalledSink;

impl RecordSink for StalledSink {
    fn upsert<'a>(&'a self, _record: &'a CanonicalRecord, _deadline: Instant) -> StoreFuture<'a, ()> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
    }

    fn record_run<'a>(&'a self, _summary: &'a RunSummary) -> StoreFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

fn peers_of(parent: &str, peers: &[(&str, Option<&str>)]) -> Vec<SourceRecord> {
    peers
        .iter()
        .map(|(symbol, name)| {
            SourceRecord::Peer(PeerPayload {
                symbol: (*symbol).to_owned(),
                peer_of: parent.to_owned(),
                name: name.map(str::to_owned),
                logo: None,
            })
        })
        .collect()
}

fn quote(symbol: &str, price: f64) -> Vec<SourceRecord> {
    vec![SourceRecord::Quote(QuotePayload {
        symbol: symbol.to_owned(),
        price,
        percent_change: Some(0.5),
        company_name: None,
    })]
}

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        provider_timeout: Duration::from_secs(1),
        store_timeout: Duration::from_secs(1),
        ..PipelineSettings::default()
    }
}

fn controller(
    peers: Vec<Arc<dyn ProviderClient>>,
    quotes: Vec<Arc<dyn ProviderClient>>,
    source: Arc<dyn SymbolSource>,
    sink: Arc<dyn RecordSink>,
    settings: PipelineSettings,
) -> RunController {
    let registry = ProviderRegistry::new(
        ProviderResolver::new(Dataset::Peers, peers, settings.provider_timeout),
        ProviderResolver::new(Dataset::Quote, quotes, settings.provider_timeout),
    );
    RunController::new(Arc::new(registry), source, sink, settings)
}

fn no_delay(batch_size: i64) -> RunConfig {
    RunConfig::from_request(&RunRequest {
        symbols: None,
        batch_size: Some(batch_size),
        delay_ms: Some(0),
    })
}

fn sym(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

// =============================================================================
// Symbol resolution
// =============================================================================

#[tokio::test]
async fn malformed_stored_symbols_are_dropped_before_any_provider_call() {
    // Given: The journal references AAPL and a malformed ticker
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL", "bad symbol!"]));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None)]))),
    );
    let controller = controller(
        vec![provider.clone()],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The peers job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: Only AAPL reached the provider and the summary
    assert_eq!(provider.calls(), vec!["AAPL"]);
    assert_eq!(summary.symbols_requested, 1);
    assert_eq!(summary.symbols_processed, 1);
    assert_eq!(summary.outcomes[0].symbol.as_str(), "AAPL");
}

#[tokio::test]
async fn empty_symbol_list_fails_before_processing() {
    // Given: Nothing in the journal
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["???"]));
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers));
    let controller = controller(
        vec![provider.clone()],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The job runs
    let error = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect_err("no symbols");

    // Then: It reports not-found and no provider was called
    assert_eq!(error, RunError::NoSymbols { job: JobKind::Peers });
    assert_eq!(error.http_status(), 404);
    assert!(provider.calls().is_empty());
    assert!(store.runs().is_empty());
}

#[tokio::test]
async fn unreachable_symbol_source_is_a_configuration_level_failure() {
    // Given: A symbol source that cannot be reached
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    store.set_source_unavailable(true);
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers));
    let controller = controller(
        vec![provider],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The job runs
    let error = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect_err("source down");

    // Then: The run fails with a server error
    assert!(matches!(error, RunError::SymbolSource(_)));
    assert_eq!(error.http_status(), 500);
}

#[tokio::test]
async fn job_without_configured_providers_fails_with_configuration_error() {
    // Given: No quote provider configured
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Watchlist, ["AAPL"]));
    let controller = controller(Vec::new(), Vec::new(), store.clone(), store.clone(), fast_settings());

    // When: The watchlist job runs
    let error = controller
        .run(JobKind::Watchlist, no_delay(10))
        .await
        .expect_err("no providers");

    // Then: It is a configuration error
    assert!(matches!(error, RunError::Configuration(_)));
    assert_eq!(error.http_status(), 500);
}

#[tokio::test]
async fn override_symbols_are_processed_verbatim_in_order() {
    // Given: A caller overriding the symbol list, with a duplicate
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["ZZZ"]));
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers));
    let controller = controller(
        vec![provider.clone()],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );
    let config = RunConfig::from_request(&RunRequest {
        symbols: Some(vec![
            String::from("msft"),
            String::from("aapl"),
            String::from("msft"),
        ]),
        batch_size: None,
        delay_ms: Some(0),
    });

    // When: The job runs
    let summary = controller.run(JobKind::Peers, config).await.expect("run completes");

    // Then: The store query was bypassed and order kept
    assert_eq!(provider.calls(), vec!["MSFT", "AAPL", "MSFT"]);
    assert_eq!(summary.symbols_requested, 3);
}

// =============================================================================
// Per-symbol outcomes
// =============================================================================

#[tokio::test]
async fn provider_with_no_peers_yields_no_peers_found_without_errors() {
    // Given: The provider knows no peers for TSLA
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["TSLA"]));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers).respond("TSLA", Ok(Vec::new())),
    );
    let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), fast_settings());

    // When: The peers job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run still completes");

    // Then: The symbol is reported as having no peers, not as an error
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.symbol.as_str(), "TSLA");
    assert_eq!(outcome.records_fetched, 0);
    assert_eq!(outcome.records_saved, 0);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.status, OutcomeStatus::NoPeersFound);
    assert_eq!(summary.total_errors, 0);
}

#[tokio::test]
async fn scheduler_visits_each_symbol_once_in_order_with_reported_batches() {
    // Given: Three symbols, batch size 2, no delay
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["A", "B", "C"]));
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers));
    let controller = controller(
        vec![provider.clone()],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(2))
        .await
        .expect("run completes");

    // Then: Each symbol was processed exactly once, in order, in batches [2, 1]
    assert_eq!(provider.calls(), vec!["A", "B", "C"]);
    assert_eq!(summary.batches, vec![2, 1]);
    assert_eq!(summary.config.batch_size, 2);
    assert_eq!(summary.config.delay_between_requests_ms, 0);
}

#[tokio::test]
async fn failing_preferred_provider_falls_back_without_attributing_errors() {
    // Given: Finnhub is down while FMP answers
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    let finnhub = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Err(SourceError::transport("connection refused"))),
    );
    let fmp = Arc::new(
        ScriptedProvider::new(ProviderId::Fmp, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", Some("Microsoft Corp"))]))),
    );
    let controller = controller(
        vec![finnhub, fmp],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The peers job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: The stored record is FMP's, and the symbol carries no error
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.provider, Some(ProviderId::Fmp));

    let record = store.record("peer:MSFT:AAPL:fmp").expect("stored under FMP key");
    let CanonicalRecord::Peer(peer) = record else {
        panic!("expected a peer record");
    };
    assert_eq!(peer.name, "Microsoft Corp");
}

#[tokio::test]
async fn invalid_peer_identifiers_are_counted_without_stopping_siblings() {
    // Given: One good and one malformed peer
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL", "IBM"]));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None), ("BRK B", None)])))
            .respond("IBM", Ok(peers_of("IBM", &[("NOT VALID", None)]))),
    );
    let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), fast_settings());

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: AAPL still succeeds with one error, IBM is a transform failure
    let aapl = &summary.outcomes[0];
    assert_eq!(aapl.status, OutcomeStatus::Success);
    assert_eq!((aapl.records_fetched, aapl.records_saved, aapl.errors), (2, 1, 1));

    let ibm = &summary.outcomes[1];
    assert_eq!(ibm.status, OutcomeStatus::TransformFailed);
    assert_eq!(ibm.errors, 1);
    assert_eq!(summary.total_errors, 2);
}

#[tokio::test]
async fn rejected_writes_are_reported_as_save_failed() {
    // Given: The store rejects every write for MSFT
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    store.reject_writes_for("MSFT");
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None)]))),
    );
    let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), fast_settings());

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: The symbol is save_failed and the run still succeeds
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::SaveFailed);
    assert_eq!(summary.outcomes[0].errors, 1);
    assert_eq!(summary.total_saved, 0);
}

#[tokio::test]
async fn stalled_store_calls_time_out_per_record() {
    // Given: A sink that never answers and a short store timeout
    let source = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None), ("GOOGL", None)]))),
    );
    let settings = PipelineSettings {
        store_timeout: Duration::from_millis(20),
        ..fast_settings()
    };
    let controller = controller(vec![provider], Vec::new(), source, Arc::new(StalledSink), settings);

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: Each timed-out write is one error
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::SaveFailed);
    assert_eq!(summary.outcomes[0].errors, 2);
}

#[tokio::test]
async fn writes_finishing_after_the_store_timeout_are_not_applied() {
    // Given: A store whose writes take longer than the store timeout
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    store.set_write_delay(Duration::from_millis(80));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None)]))),
    );
    let settings = PipelineSettings {
        store_timeout: Duration::from_millis(20),
        ..fast_settings()
    };
    let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), settings);

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: The write is save_failed and the store does not hold it
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::SaveFailed);
    assert_eq!(summary.outcomes[0].errors, 1);
    assert_eq!(store.record("peer:MSFT:AAPL:finnhub"), None);
    assert!(store.records().is_empty());
}

// =============================================================================
// Watchlist job
// =============================================================================

#[tokio::test]
async fn watchlist_quote_is_written_once_per_item() {
    // Given: Two users watching AAPL
    let store = Arc::new(
        MemoryStore::new()
            .with_symbols(JobKind::Watchlist, ["AAPL"])
            .with_watchlist_item(WatchlistItem {
                item_id: String::from("item-1"),
                user_id: String::from("user-a"),
                symbol: sym("AAPL"),
            })
            .with_watchlist_item(WatchlistItem {
                item_id: String::from("item-2"),
                user_id: String::from("user-b"),
                symbol: sym("AAPL"),
            }),
    );
    let finnhub = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Quote));
    let alphavantage = Arc::new(
        ScriptedProvider::new(ProviderId::Alphavantage, Dataset::Quote)
            .respond("AAPL", Ok(quote("AAPL", 190.5))),
    );
    let controller = controller(
        Vec::new(),
        vec![finnhub, alphavantage],
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The watchlist job runs
    let summary = controller
        .run(JobKind::Watchlist, no_delay(10))
        .await
        .expect("run completes");

    // Then: Both items are enriched from the fallback provider
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(summary.outcomes[0].records_saved, 2);

    // And: The one quote counts once per item, like saved and errors
    assert_eq!(summary.outcomes[0].records_fetched, 2);
    for key in ["watchlist:item-1", "watchlist:item-2"] {
        let Some(CanonicalRecord::WatchlistEnrichment(item)) = store.record(key) else {
            panic!("missing enrichment {key}");
        };
        assert_eq!(item.price, 190.5);
        assert_eq!(item.company_name, "AAPL");
        assert_eq!(item.provider, ProviderId::Alphavantage);
    }
}

#[tokio::test]
async fn watchlist_symbol_without_quote_is_no_data_found() {
    // Given: A watched symbol no provider can price
    let store = Arc::new(
        MemoryStore::new()
            .with_symbols(JobKind::Watchlist, ["ZZZZ"])
            .with_watchlist_item(WatchlistItem {
                item_id: String::from("item-9"),
                user_id: String::from("user-a"),
                symbol: sym("ZZZZ"),
            }),
    );
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Quote));
    let controller = controller(Vec::new(), vec![provider], store.clone(), store.clone(), fast_settings());

    // When: The job runs
    let summary = controller
        .run(JobKind::Watchlist, no_delay(10))
        .await
        .expect("run completes");

    // Then: The symbol is reported as having no data
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::NoDataFound);
    assert_eq!(summary.outcomes[0].errors, 0);
}

#[tokio::test]
async fn watchlist_item_lookup_failure_is_processing_failed() {
    // Given: Override symbols, but the item lookup fails
    let store = Arc::new(MemoryStore::new());
    store.set_source_unavailable(true);
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Quote)
            .respond("AAPL", Ok(quote("AAPL", 1.0))),
    );
    let controller = controller(
        Vec::new(),
        vec![provider.clone()],
        store.clone(),
        store.clone(),
        fast_settings(),
    );
    let config = RunConfig::from_request(&RunRequest {
        symbols: Some(vec![String::from("AAPL")]),
        batch_size: None,
        delay_ms: Some(0),
    });

    // When: The job runs
    let summary = controller.run(JobKind::Watchlist, config).await.expect("run completes");

    // Then: The symbol failed without calling a provider
    assert_eq!(summary.outcomes[0].status, OutcomeStatus::ProcessingFailed);
    assert_eq!(summary.outcomes[0].errors, 1);
    assert!(provider.calls().is_empty());
}

// =============================================================================
// Run-level properties
// =============================================================================

#[tokio::test]
async fn totals_are_conserved_when_details_are_truncated() {
    // Given: 130 symbols, every third one's peer write rejected
    let symbols: Vec<String> = (0..130).map(|i| format!("S{i}")).collect();
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, symbols.clone()));
    let mut provider = ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers);
    for (index, symbol) in symbols.iter().enumerate() {
        let peer = format!("P{index}");
        if index % 3 == 0 {
            store.reject_writes_for(&peer);
        }
        provider = provider.respond(symbol, Ok(peers_of(symbol, &[(peer.as_str(), None)])));
    }
    let controller = controller(
        vec![Arc::new(provider)],
        Vec::new(),
        store.clone(),
        store.clone(),
        fast_settings(),
    );

    // When: The job runs
    let summary = controller
        .run(JobKind::Peers, no_delay(25))
        .await
        .expect("run completes");

    // Then: Details are capped but totals cover every symbol
    assert_eq!(summary.outcomes.len(), 100);
    assert!(summary.results_truncated);
    assert_eq!(summary.symbols_processed, 130);
    assert_eq!(summary.total_errors, 44);
    assert_eq!(summary.total_saved, 86);
    assert_eq!(summary.total_saved + summary.total_errors, 130);
    assert_eq!(summary.status_counts.get(&OutcomeStatus::SaveFailed), Some(&44));
    assert_eq!(summary.batches, vec![25, 25, 25, 25, 25, 5]);
}

#[tokio::test]
async fn run_deadline_stops_scheduling_and_returns_partial_summary() {
    // Given: A 30 ms run budget and a 200 ms pause between symbols
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["A", "B", "C"]));
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers));
    let settings = PipelineSettings {
        run_deadline: Some(Duration::from_millis(30)),
        ..fast_settings()
    };
    let controller = controller(vec![provider.clone()], Vec::new(), store.clone(), store.clone(), settings);
    let config = RunConfig::from_request(&RunRequest {
        symbols: None,
        batch_size: Some(10),
        delay_ms: Some(200),
    });

    // When: The job runs
    let summary = controller.run(JobKind::Peers, config).await.expect("run completes");

    // Then: Only the first symbol was processed and the summary says why
    assert!(summary.deadline_exceeded);
    assert_eq!(provider.calls(), vec!["A"]);
    assert_eq!(summary.symbols_requested, 3);
    assert_eq!(summary.symbols_processed, 1);
}

#[tokio::test]
async fn finished_runs_are_recorded_in_the_run_log() {
    // Given: A normal run
    let store = Arc::new(MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]));
    let provider = Arc::new(
        ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
            .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", None)]))),
    );
    let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), fast_settings());

    // When: It finishes
    let summary = controller
        .run(JobKind::Peers, no_delay(10))
        .await
        .expect("run completes");

    // Then: The run log holds exactly this run
    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, summary.run_id);
    assert_eq!(runs[0].total_saved, 1);
}

#[tokio::test]
async fn repeated_runs_converge_to_one_row_per_key_with_latest_values() {
    // Given: A DuckDB-backed store and a provider whose peer name changes
    let dir = tempdir().expect("tempdir");
    let warehouse =
        Warehouse::open(WarehouseConfig::with_db_path(dir.path().join("sync.duckdb"))).expect("warehouse");
    warehouse
        .add_journal_trade("trade-1", "user-a", "AAPL")
        .expect("seed trade");
    let store = Arc::new(WarehouseStore::new(warehouse.clone()));

    for name in ["Microsoft", "Microsoft Corporation"] {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderId::Finnhub, Dataset::Peers)
                .respond("AAPL", Ok(peers_of("AAPL", &[("MSFT", Some(name))]))),
        );
        let controller = controller(vec![provider], Vec::new(), store.clone(), store.clone(), fast_settings());

        // When: The peers job runs
        let summary = controller
            .run(JobKind::Peers, no_delay(10))
            .await
            .expect("run completes");
        assert_eq!(summary.total_saved, 1);
    }

    // Then: One row for (MSFT, AAPL, finnhub) holding the second run's name
    let rows = warehouse.peers_of("AAPL").expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "MSFT");
    assert_eq!(rows[0].name, "Microsoft Corporation");

    // And: Both runs were logged
    assert_eq!(warehouse.recent_sync_runs(10).expect("runs").len(), 2);
}
