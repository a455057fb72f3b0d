//! Store collaborators: where symbols come from and where records go.
//!
//! [`WarehouseStore`] is the DuckDB-backed implementation used by the
//! binary; [`MemoryStore`] keeps everything in process and can be told to
//! fail, which the behaviour tests rely on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use marketsync_warehouse::{
    PeerRow, SymbolSet, SyncRunRow, Warehouse, WarehouseError, WatchlistItemRow,
    WatchlistQuoteRow,
};
use thiserror::Error;

use crate::{CanonicalRecord, JobKind, RunSummary, Symbol, WatchlistItem};

/// Store failure. Non-fatal per record; fatal only while resolving symbols.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected the write: {0}")]
    Rejected(String),
    #[error("store backend error: {0}")]
    Backend(String),
    /// The call did not answer in time. For writes the outcome is unknown.
    #[error("store call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The write reached its deadline first and was not applied.
    #[error("store write refused after its deadline")]
    DeadlineExceeded,
}

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        match error {
            WarehouseError::Io(e) => Self::Unavailable(e.to_string()),
            WarehouseError::InvalidRow(message) => Self::Rejected(message),
            WarehouseError::DuckDb(e) => Self::Backend(e.to_string()),
            WarehouseError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Read side: the tickers a job should enrich.
pub trait SymbolSource: Send + Sync {
    /// Raw tickers for `job`. Values are unvalidated; the run controller
    /// normalizes them and drops malformed entries.
    fn symbols<'a>(&'a self, job: JobKind) -> StoreFuture<'a, Vec<String>>;

    /// Watchlist items that reference `symbol`.
    fn watchlist_items<'a>(&'a self, symbol: &'a Symbol) -> StoreFuture<'a, Vec<WatchlistItem>>;
}

/// Write side: idempotent upserts keyed by each record's natural key.
pub trait RecordSink: Send + Sync {
    /// Writes `record` unless `deadline` passes first. A write that is not
    /// applied in time must fail with [`StoreError::DeadlineExceeded`] and
    /// leave the store unchanged, so a reported failure never hides a row.
    fn upsert<'a>(&'a self, record: &'a CanonicalRecord, deadline: Instant) -> StoreFuture<'a, ()>;

    /// Appends the run to the run log.
    fn record_run<'a>(&'a self, summary: &'a RunSummary) -> StoreFuture<'a, ()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    symbols: HashMap<JobKind, Vec<String>>,
    items: Vec<WatchlistItem>,
    records: BTreeMap<String, CanonicalRecord>,
    runs: Vec<RunSummary>,
    rejected_symbols: HashSet<String>,
    source_unavailable: bool,
    write_delay: Duration,
}

/// In-process store keyed by [`CanonicalRecord::natural_key`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock should not be poisoned")
    }

    /// Sets the raw symbol list returned for `job`, in the given order.
    pub fn with_symbols<I, S>(self, job: JobKind, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .symbols
            .insert(job, symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_watchlist_item(self, item: WatchlistItem) -> Self {
        self.lock().items.push(item);
        self
    }

    /// Makes every upsert of a record whose symbol is `symbol` fail.
    pub fn reject_writes_for(&self, symbol: &str) {
        self.lock().rejected_symbols.insert(symbol.to_owned());
    }

    /// Delays every upsert by `delay`, as a slow backend would.
    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    /// Makes every read fail, as if the backing store were unreachable.
    pub fn set_source_unavailable(&self, unavailable: bool) {
        self.lock().source_unavailable = unavailable;
    }

    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.lock().records.values().cloned().collect()
    }

    pub fn record(&self, natural_key: &str) -> Option<CanonicalRecord> {
        self.lock().records.get(natural_key).cloned()
    }

    pub fn runs(&self) -> Vec<RunSummary> {
        self.lock().runs.clone()
    }
}

fn record_symbol(record: &CanonicalRecord) -> &Symbol {
    match record {
        CanonicalRecord::Peer(peer) => &peer.symbol,
        CanonicalRecord::WatchlistEnrichment(item) => &item.symbol,
    }
}

impl SymbolSource for MemoryStore {
    fn symbols<'a>(&'a self, job: JobKind) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let state = self.lock();
            if state.source_unavailable {
                return Err(StoreError::Unavailable(String::from("memory store offline")));
            }
            Ok(state.symbols.get(&job).cloned().unwrap_or_default())
        })
    }

    fn watchlist_items<'a>(&'a self, symbol: &'a Symbol) -> StoreFuture<'a, Vec<WatchlistItem>> {
        Box::pin(async move {
            let state = self.lock();
            if state.source_unavailable {
                return Err(StoreError::Unavailable(String::from("memory store offline")));
            }
            Ok(state
                .items
                .iter()
                .filter(|item| &item.symbol == symbol)
                .cloned()
                .collect())
        })
    }
}

impl RecordSink for MemoryStore {
    fn upsert<'a>(&'a self, record: &'a CanonicalRecord, deadline: Instant) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let delay = self.lock().write_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if Instant::now() >= deadline {
                return Err(StoreError::DeadlineExceeded);
            }
            let mut state = self.lock();
            let symbol = record_symbol(record);
            if state.rejected_symbols.contains(symbol.as_str()) {
                return Err(StoreError::Rejected(format!("writes for {symbol} are rejected")));
            }
            state.records.insert(record.natural_key(), record.clone());
            Ok(())
        })
    }

    fn record_run<'a>(&'a self, summary: &'a RunSummary) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.lock().runs.push(summary.clone());
            Ok(())
        })
    }
}

/// [`Warehouse`] adapter. DuckDB calls are blocking, so each one runs on
/// the blocking pool.
#[derive(Clone)]
pub struct WarehouseStore {
    warehouse: Warehouse,
}

impl WarehouseStore {
    pub fn new(warehouse: Warehouse) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Warehouse) -> Result<T, WarehouseError> + Send + 'static,
    {
        let warehouse = self.warehouse.clone();
        tokio::task::spawn_blocking(move || call(&warehouse))
            .await
            .map_err(|e| StoreError::Unavailable(format!("warehouse task failed: {e}")))?
            .map_err(StoreError::from)
    }
}

impl std::fmt::Debug for WarehouseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseStore")
            .field("db_path", &self.warehouse.db_path())
            .finish()
    }
}

const fn symbol_set(job: JobKind) -> SymbolSet {
    match job {
        JobKind::Peers => SymbolSet::JournalTrades,
        JobKind::Watchlist => SymbolSet::WatchlistItems,
    }
}

fn to_watchlist_item(row: WatchlistItemRow) -> Option<WatchlistItem> {
    match Symbol::parse(&row.symbol) {
        Ok(symbol) => Some(WatchlistItem {
            item_id: row.item_id,
            user_id: row.user_id,
            symbol,
        }),
        Err(error) => {
            tracing::debug!(item_id = %row.item_id, %error, "skipping watchlist item with invalid symbol");
            None
        }
    }
}

impl SymbolSource for WarehouseStore {
    fn symbols<'a>(&'a self, job: JobKind) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.blocking(move |warehouse| warehouse.tracked_symbols(symbol_set(job)))
                .await
        })
    }

    fn watchlist_items<'a>(&'a self, symbol: &'a Symbol) -> StoreFuture<'a, Vec<WatchlistItem>> {
        Box::pin(async move {
            let symbol = symbol.as_str().to_owned();
            let rows = self
                .blocking(move |warehouse| warehouse.watchlist_items_for(&symbol))
                .await?;
            Ok(rows.into_iter().filter_map(to_watchlist_item).collect())
        })
    }
}

impl RecordSink for WarehouseStore {
    fn upsert<'a>(&'a self, record: &'a CanonicalRecord, deadline: Instant) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match record {
                CanonicalRecord::Peer(peer) => {
                    let row = PeerRow {
                        symbol: peer.symbol.to_string(),
                        peer_of: peer.peer_of.to_string(),
                        provider: peer.provider.as_str().to_owned(),
                        name: peer.name.clone(),
                        logo: peer.logo.clone(),
                        fetched_at: peer.fetched_at.format_rfc3339(),
                        as_of_date: peer.as_of_date.clone(),
                    };
                    self.blocking(move |warehouse| warehouse.upsert_peer_by(&row, deadline))
                        .await
                }
                CanonicalRecord::WatchlistEnrichment(item) => {
                    let row = WatchlistQuoteRow {
                        item_id: item.item_id.clone(),
                        symbol: item.symbol.to_string(),
                        price: item.price,
                        percent_change: item.percent_change,
                        company_name: item.company_name.clone(),
                        provider: item.provider.as_str().to_owned(),
                        updated_at: item.updated_at.format_rfc3339(),
                    };
                    self.blocking(move |warehouse| warehouse.upsert_watchlist_quote_by(&row, deadline))
                        .await
                }
            }
        })
    }

    fn record_run<'a>(&'a self, summary: &'a RunSummary) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let row = SyncRunRow {
                run_id: summary.run_id.to_string(),
                job: summary.job.as_str().to_owned(),
                symbols_requested: summary.symbols_requested as u64,
                symbols_processed: summary.symbols_processed as u64,
                total_saved: summary.total_saved as u64,
                total_errors: summary.total_errors as u64,
                elapsed_ms: summary.elapsed_ms,
                deadline_exceeded: summary.deadline_exceeded,
                finished_at: summary.timestamp.format_rfc3339(),
            };
            self.blocking(move |warehouse| warehouse.record_sync_run(&row))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PeerRecord, ProviderId, UtcDateTime};

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn peer(name: &str) -> CanonicalRecord {
        let now = UtcDateTime::now();
        CanonicalRecord::Peer(PeerRecord {
            symbol: Symbol::parse("MSFT").expect("valid"),
            name: name.to_owned(),
            logo: String::new(),
            peer_of: Symbol::parse("AAPL").expect("valid"),
            provider: ProviderId::Finnhub,
            fetched_at: now,
            as_of_date: now.date_string(),
        })
    }

    #[tokio::test]
    async fn memory_store_upserts_by_natural_key() {
        let store = MemoryStore::new();
        store.upsert(&peer("Microsoft"), soon()).await.expect("first");
        store.upsert(&peer("Microsoft Corp"), soon()).await.expect("second");

        let records = store.records();
        assert_eq!(records.len(), 1);
        let CanonicalRecord::Peer(saved) = &records[0] else {
            panic!("expected a peer");
        };
        assert_eq!(saved.name, "Microsoft Corp");
    }

    #[tokio::test]
    async fn memory_store_failure_switches() {
        let store = MemoryStore::new().with_symbols(JobKind::Peers, ["AAPL"]);
        store.reject_writes_for("MSFT");
        assert!(matches!(
            store.upsert(&peer("Microsoft"), soon()).await,
            Err(StoreError::Rejected(_))
        ));

        store.set_source_unavailable(true);
        assert!(store.symbols(JobKind::Peers).await.is_err());
    }

    #[tokio::test]
    async fn warehouse_store_round_trips_peer_rows() {
        let store = WarehouseStore::new(Warehouse::open_in_memory().expect("warehouse"));
        store.upsert(&peer("Microsoft"), soon()).await.expect("first");
        store.upsert(&peer("Microsoft Corp"), soon()).await.expect("second");

        let rows = store.warehouse().peers_of("AAPL").expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Microsoft Corp");
        assert_eq!(rows[0].provider, "finnhub");
    }

    #[tokio::test]
    async fn warehouse_store_refuses_writes_past_their_deadline() {
        let store = WarehouseStore::new(Warehouse::open_in_memory().expect("warehouse"));
        store.upsert(&peer("Microsoft"), soon()).await.expect("seed");

        let error = store
            .upsert(&peer("Microsoft Corp"), Instant::now())
            .await
            .expect_err("late write");
        assert_eq!(error, StoreError::DeadlineExceeded);

        let rows = store.warehouse().peers_of("AAPL").expect("rows");
        assert_eq!(rows[0].name, "Microsoft");
    }

    #[tokio::test]
    async fn slow_memory_write_past_deadline_is_not_applied() {
        let store = MemoryStore::new();
        store.set_write_delay(Duration::from_millis(50));

        let deadline = Instant::now() + Duration::from_millis(10);
        let error = store
            .upsert(&peer("Microsoft"), deadline)
            .await
            .expect_err("too slow");
        assert_eq!(error, StoreError::DeadlineExceeded);
        assert!(store.records().is_empty());
    }
}
