//! CLI argument definitions for marketsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Start the HTTP trigger |
//! | `sync` | Run one job once and print its summary |
//! | `runs` | List recently finished runs |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db-path` | `$MARKETSYNC_HOME/marketsync.duckdb` | DuckDB file |
//! | `--provider-timeout-ms` | `12000` | Bound on one provider call |
//! | `--store-timeout-ms` | `5000` | Bound on one store call |
//! | `--run-deadline-secs` | none | Stop scheduling symbols after this long |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Enrich two tickers without waiting between them
//! marketsync sync peers --symbols AAPL,MSFT --delay-ms 0 --pretty
//!
//! # Serve the trigger endpoints
//! marketsync serve --bind 0.0.0.0:8787
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use marketsync_core::JobKind;

#[derive(Debug, Parser)]
#[command(
    name = "marketsync",
    author,
    version,
    about = "Market-data enrichment for the trading journal"
)]
pub struct Cli {
    /// DuckDB database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Upper bound on one provider call, in milliseconds. The default
    /// covers a budget wait plus two sequential 5 s requests.
    #[arg(long, global = true, default_value_t = 12_000)]
    pub provider_timeout_ms: u64,

    /// Upper bound on one store call, in milliseconds.
    #[arg(long, global = true, default_value_t = 5_000)]
    pub store_timeout_ms: u64,

    /// Wall-clock budget for one run; remaining symbols are skipped.
    #[arg(long, global = true)]
    pub run_deadline_secs: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP trigger.
    Serve(ServeArgs),
    /// Run one job once.
    Sync(SyncArgs),
    /// List recently finished runs.
    Runs(RunsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobArg {
    Peers,
    Watchlist,
}

impl From<JobArg> for JobKind {
    fn from(value: JobArg) -> Self {
        match value {
            JobArg::Peers => Self::Peers,
            JobArg::Watchlist => Self::Watchlist,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[arg(value_enum)]
    pub job: JobArg,

    /// Comma separated symbols replacing the symbol-source query.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Symbols per reported batch (default 10, max 100).
    #[arg(long, allow_negative_numbers = true)]
    pub batch_size: Option<i64>,

    /// Pause between symbols in milliseconds (default 1000, max 60000).
    #[arg(long, allow_negative_numbers = true)]
    pub delay_ms: Option<i64>,
}

#[derive(Debug, Args)]
pub struct RunsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}
