//! Versioned schema migrations, applied once per database.

use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_journal_sources",
        sql: r#"
CREATE TABLE IF NOT EXISTS journal_trades (
    trade_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS watchlist_items (
    item_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_enrichment_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS stock_peers (
    symbol TEXT NOT NULL,
    peer_of TEXT NOT NULL,
    provider TEXT NOT NULL,
    name TEXT NOT NULL,
    logo TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    as_of_date DATE NOT NULL,
    PRIMARY KEY(symbol, peer_of, provider)
);

CREATE TABLE IF NOT EXISTS watchlist_quotes (
    item_id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    price DOUBLE NOT NULL,
    percent_change DOUBLE,
    company_name TEXT NOT NULL,
    provider TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    },
    Migration {
        version: "0003_sync_runs",
        sql: r#"
CREATE TABLE IF NOT EXISTS sync_runs (
    run_id TEXT PRIMARY KEY,
    job TEXT NOT NULL,
    symbols_requested BIGINT NOT NULL,
    symbols_processed BIGINT NOT NULL,
    total_saved BIGINT NOT NULL,
    total_errors BIGINT NOT NULL,
    elapsed_ms BIGINT NOT NULL,
    deadline_exceeded BOOLEAN NOT NULL DEFAULT FALSE,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_trades_symbol ON journal_trades(symbol);
CREATE INDEX IF NOT EXISTS idx_watchlist_items_symbol ON watchlist_items(symbol);
"#,
    },
];

/// Applies every migration that is not yet recorded in `schema_migrations`.
///
/// # Errors
/// Returns an error if any migration statement fails.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}

/// Versions known to this build, in application order.
pub fn known_versions() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().map(|migration| migration.version)
}
