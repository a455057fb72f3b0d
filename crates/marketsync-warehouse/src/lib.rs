//! # Marketsync Warehouse
//!
//! DuckDB-backed record store for the marketsync enrichment jobs.
//!
//! ## Overview
//!
//! The warehouse plays two collaborator roles for the pipeline:
//!
//! - **Symbol source**: distinct tickers referenced by journal trades and
//!   watchlist items, sorted.
//! - **Record store**: idempotent upserts keyed by each record's natural key,
//!   plus an append-only log of finished sync runs.
//!
//! All user-provided values travel as query parameters, never interpolated.
//!
//! ## Tables
//!
//! | Table | Natural key | Description |
//! |-------|-------------|-------------|
//! | `journal_trades` | `trade_id` | Trades recorded in the journal (peers symbol source) |
//! | `watchlist_items` | `item_id` | Watchlist entries (watchlist symbol source) |
//! | `stock_peers` | `(symbol, peer_of, provider)` | Similar-symbol records |
//! | `watchlist_quotes` | `item_id` | Price enrichment per watchlist item |
//! | `sync_runs` | `run_id` | Summary of each finished run |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marketsync_warehouse::{PeerRow, Warehouse};
//!
//! let warehouse = Warehouse::open_default()?;
//! warehouse.upsert_peer(&PeerRow {
//!     symbol: "MSFT".to_string(),
//!     peer_of: "AAPL".to_string(),
//!     provider: "finnhub".to_string(),
//!     name: "Microsoft Corp".to_string(),
//!     logo: String::new(),
//!     fetched_at: "2026-01-05T14:00:00Z".to_string(),
//!     as_of_date: "2026-01-05".to_string(),
//! })?;
//! # Ok::<(), marketsync_warehouse::WarehouseError>(())
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ::duckdb::{Connection, ToSql};
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error (constraint violation, I/O inside the engine).
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row was rejected before reaching the database.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A write reached its deadline before commit and was rolled back.
    #[error("write deadline passed before commit; nothing was written")]
    DeadlineExceeded,
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for marketsync data.
    pub marketsync_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let marketsync_home = resolve_marketsync_home();
        let db_path = marketsync_home.join("marketsync.duckdb");
        Self {
            marketsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Configuration rooted at an explicit database file.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let marketsync_home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            marketsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Which table feeds a symbol query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSet {
    JournalTrades,
    WatchlistItems,
}

impl SymbolSet {
    const fn table(self) -> &'static str {
        match self {
            Self::JournalTrades => "journal_trades",
            Self::WatchlistItems => "watchlist_items",
        }
    }
}

/// A similar-symbol record, keyed by `(symbol, peer_of, provider)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRow {
    /// The peer's own ticker.
    pub symbol: String,
    /// The ticker this row is a peer of.
    pub peer_of: String,
    pub provider: String,
    pub name: String,
    pub logo: String,
    /// RFC3339 timestamp of the fetch.
    pub fetched_at: String,
    /// Calendar date (`YYYY-MM-DD`) the peer list applies to.
    pub as_of_date: String,
}

/// Price enrichment for one watchlist item, keyed by `item_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistQuoteRow {
    pub item_id: String,
    pub symbol: String,
    pub price: f64,
    pub percent_change: Option<f64>,
    pub company_name: String,
    pub provider: String,
    /// RFC3339 timestamp of the enrichment.
    pub updated_at: String,
}

/// A watchlist entry as stored by the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistItemRow {
    pub item_id: String,
    pub user_id: String,
    pub symbol: String,
}

/// One finished sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunRow {
    pub run_id: String,
    pub job: String,
    pub symbols_requested: u64,
    pub symbols_processed: u64,
    pub total_saved: u64,
    pub total_errors: u64,
    pub elapsed_ms: u64,
    pub deadline_exceeded: bool,
    pub finished_at: String,
}

/// The main warehouse interface.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a private in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open_in_memory(2)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path to the database file, `None` when in-memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Distinct, non-blank tickers of a symbol set, trimmed, uppercased and
    /// sorted. Format validation is left to the caller.
    pub fn tracked_symbols(&self, set: SymbolSet) -> Result<Vec<String>, WarehouseError> {
        // Table name comes from a closed enum, never from input.
        let sql = format!(
            "SELECT DISTINCT upper(trim(symbol)) AS symbol FROM {table} \
             WHERE trim(symbol) <> '' ORDER BY symbol",
            table = set.table()
        );

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let symbols = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    /// Watchlist items holding `symbol` (case-insensitive), ordered by id.
    pub fn watchlist_items_for(&self, symbol: &str) -> Result<Vec<WatchlistItemRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT item_id, user_id, symbol FROM watchlist_items \
             WHERE upper(trim(symbol)) = upper(trim(?)) ORDER BY item_id",
        )?;
        let rows = statement.query_map([symbol], |row| {
            Ok(WatchlistItemRow {
                item_id: row.get(0)?,
                user_id: row.get(1)?,
                symbol: row.get(2)?,
            })
        })?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Record a journal trade's ticker.
    pub fn add_journal_trade(
        &self,
        trade_id: &str,
        user_id: &str,
        symbol: &str,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&trade_id, &user_id, &symbol];
        connection.execute(
            "INSERT INTO journal_trades (trade_id, user_id, symbol) VALUES (?, ?, ?) \
             ON CONFLICT (trade_id) DO UPDATE SET symbol = excluded.symbol",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Add or re-point a watchlist item.
    pub fn add_watchlist_item(&self, item: &WatchlistItemRow) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&item.item_id, &item.user_id, &item.symbol];
        connection.execute(
            "INSERT INTO watchlist_items (item_id, user_id, symbol) VALUES (?, ?, ?) \
             ON CONFLICT (item_id) DO UPDATE SET symbol = excluded.symbol",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Insert a peer row, or update the existing row with the same
    /// `(symbol, peer_of, provider)` in place.
    pub fn upsert_peer(&self, row: &PeerRow) -> Result<(), WarehouseError> {
        self.write_peer(row, None)
    }

    /// [`Self::upsert_peer`], committed only if `deadline` has not passed.
    /// A late write is rolled back and reported as
    /// [`WarehouseError::DeadlineExceeded`].
    pub fn upsert_peer_by(&self, row: &PeerRow, deadline: Instant) -> Result<(), WarehouseError> {
        self.write_peer(row, Some(deadline))
    }

    fn write_peer(&self, row: &PeerRow, deadline: Option<Instant>) -> Result<(), WarehouseError> {
        if row.symbol.is_empty() || row.peer_of.is_empty() || row.provider.is_empty() {
            return Err(WarehouseError::InvalidRow(String::from(
                "peer key columns must be non-empty",
            )));
        }

        let params: [&dyn ToSql; 7] = [
            &row.symbol,
            &row.peer_of,
            &row.provider,
            &row.name,
            &row.logo,
            &row.fetched_at,
            &row.as_of_date,
        ];
        self.write_before(
            deadline,
            "INSERT INTO stock_peers \
             (symbol, peer_of, provider, name, logo, fetched_at, as_of_date) \
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DATE)) \
             ON CONFLICT (symbol, peer_of, provider) DO UPDATE SET \
             name = excluded.name, logo = excluded.logo, \
             fetched_at = excluded.fetched_at, as_of_date = excluded.as_of_date",
            params.as_slice(),
        )
    }

    /// Insert a watchlist quote, or update the row for the same `item_id`.
    pub fn upsert_watchlist_quote(&self, row: &WatchlistQuoteRow) -> Result<(), WarehouseError> {
        self.write_watchlist_quote(row, None)
    }

    /// [`Self::upsert_watchlist_quote`] with the same deadline rule as
    /// [`Self::upsert_peer_by`].
    pub fn upsert_watchlist_quote_by(
        &self,
        row: &WatchlistQuoteRow,
        deadline: Instant,
    ) -> Result<(), WarehouseError> {
        self.write_watchlist_quote(row, Some(deadline))
    }

    fn write_watchlist_quote(
        &self,
        row: &WatchlistQuoteRow,
        deadline: Option<Instant>,
    ) -> Result<(), WarehouseError> {
        if row.item_id.is_empty() {
            return Err(WarehouseError::InvalidRow(String::from(
                "watchlist item_id must be non-empty",
            )));
        }

        let params: [&dyn ToSql; 7] = [
            &row.item_id,
            &row.symbol,
            &row.price,
            &row.percent_change,
            &row.company_name,
            &row.provider,
            &row.updated_at,
        ];
        self.write_before(
            deadline,
            "INSERT INTO watchlist_quotes \
             (item_id, symbol, price, percent_change, company_name, provider, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (item_id) DO UPDATE SET \
             symbol = excluded.symbol, price = excluded.price, \
             percent_change = excluded.percent_change, company_name = excluded.company_name, \
             provider = excluded.provider, updated_at = excluded.updated_at",
            params.as_slice(),
        )
    }

    /// Runs one write statement in its own transaction. The deadline is
    /// checked before the statement and again before `COMMIT`.
    fn write_before(
        &self,
        deadline: Option<Instant>,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        ensure_before(deadline)?;

        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = connection
            .execute(sql, params)
            .map_err(WarehouseError::from)
            .and_then(|_| ensure_before(deadline));
        finalize_transaction(&connection, result)
    }

    /// Peer rows stored for `peer_of`, ordered by provider then symbol.
    pub fn peers_of(&self, peer_of: &str) -> Result<Vec<PeerRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, peer_of, provider, name, logo, fetched_at, \
             CAST(as_of_date AS VARCHAR) FROM stock_peers \
             WHERE peer_of = ? ORDER BY provider, symbol",
        )?;
        let rows = statement.query_map([peer_of], |row| {
            Ok(PeerRow {
                symbol: row.get(0)?,
                peer_of: row.get(1)?,
                provider: row.get(2)?,
                name: row.get(3)?,
                logo: row.get(4)?,
                fetched_at: row.get(5)?,
                as_of_date: row.get(6)?,
            })
        })?;
        let peers = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(peers)
    }

    /// The enrichment stored for a watchlist item, if any.
    pub fn watchlist_quote(&self, item_id: &str) -> Result<Option<WatchlistQuoteRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT item_id, symbol, price, percent_change, company_name, provider, updated_at \
             FROM watchlist_quotes WHERE item_id = ?",
        )?;
        let mut rows = statement.query_map([item_id], |row| {
            Ok(WatchlistQuoteRow {
                item_id: row.get(0)?,
                symbol: row.get(1)?,
                price: row.get(2)?,
                percent_change: row.get(3)?,
                company_name: row.get(4)?,
                provider: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Append a finished run to the run log.
    pub fn record_sync_run(&self, row: &SyncRunRow) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 9] = [
            &row.run_id,
            &row.job,
            &row.symbols_requested,
            &row.symbols_processed,
            &row.total_saved,
            &row.total_errors,
            &row.elapsed_ms,
            &row.deadline_exceeded,
            &row.finished_at,
        ];
        connection.execute(
            "INSERT INTO sync_runs \
             (run_id, job, symbols_requested, symbols_processed, total_saved, total_errors, \
              elapsed_ms, deadline_exceeded, finished_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_sync_runs(&self, limit: usize) -> Result<Vec<SyncRunRow>, WarehouseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT run_id, job, symbols_requested, symbols_processed, total_saved, \
             total_errors, elapsed_ms, deadline_exceeded, finished_at \
             FROM sync_runs ORDER BY finished_at DESC, run_id LIMIT ?",
        )?;
        let rows = statement.query_map([limit], |row| {
            Ok(SyncRunRow {
                run_id: row.get(0)?,
                job: row.get(1)?,
                symbols_requested: row.get(2)?,
                symbols_processed: row.get(3)?,
                total_saved: row.get(4)?,
                total_errors: row.get(5)?,
                elapsed_ms: row.get(6)?,
                deadline_exceeded: row.get(7)?,
                finished_at: row.get(8)?,
            })
        })?;
        let runs = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Row count of an enrichment table, used by run diagnostics.
    pub fn count_rows(&self, table: EnrichmentTable) -> Result<u64, WarehouseError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let connection = self.manager.acquire()?;
        let count: i64 = connection.query_row(sql.as_str(), [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Tables written by the enrichment jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentTable {
    StockPeers,
    WatchlistQuotes,
}

impl EnrichmentTable {
    const fn name(self) -> &'static str {
        match self {
            Self::StockPeers => "stock_peers",
            Self::WatchlistQuotes => "watchlist_quotes",
        }
    }
}

fn ensure_before(deadline: Option<Instant>) -> Result<(), WarehouseError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(WarehouseError::DeadlineExceeded),
        _ => Ok(()),
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the marketsync home directory from environment or default.
fn resolve_marketsync_home() -> PathBuf {
    if let Some(path) = env::var_os("MARKETSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".marketsync");
    }

    PathBuf::from(".marketsync")
}
