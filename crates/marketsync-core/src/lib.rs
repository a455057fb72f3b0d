//! # Marketsync Core
//!
//! Market-data enrichment pipeline for the trading journal.
//!
//! ## Overview
//!
//! A run pulls a list of tickers from a symbol source, enriches each one by
//! calling third-party market-data providers, validates and normalizes the
//! results, upserts them idempotently and reports an aggregated summary.
//!
//! - **Symbol validation** for every identifier entering or leaving a provider
//! - **Provider adapters** (Finnhub, Financial Modeling Prep, Alpha Vantage)
//!   with per-provider rate budgets
//! - **Provider resolver** with concurrent fan-out and ordered fallback
//! - **Record transformer** from provider payloads to storable records
//! - **Batch scheduler** pacing symbols sequentially
//! - **Result aggregator** with a capped detail list and exact totals
//! - **Run controller** tying the stages together behind one entry point
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider clients, one per provider and dataset |
//! | [`aggregate`] | Per-symbol outcomes and the run summary |
//! | [`config`] | Provider registry and process-wide pipeline settings |
//! | [`domain`] | Symbols, timestamps and storable records |
//! | [`error`] | Validation and configuration errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`job`] | Peers and watchlist job kinds |
//! | [`payload`] | Defensive parsing of provider JSON |
//! | [`pipeline`] | Run controller, run configuration and run errors |
//! | [`provider`] | Provider client trait and provider errors |
//! | [`provider_policy`] | Free-tier request budgets |
//! | [`resolver`] | Ordered multi-provider resolution |
//! | [`scheduler`] | Sequential batch scheduling with inter-call delay |
//! | [`source`] | Provider and dataset identifiers |
//! | [`store`] | Symbol source and record sink collaborators |
//! | [`throttling`] | Rate budget backed by `governor` |
//! | [`transform`] | Provider payload to canonical record |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use marketsync_core::{
//!     JobKind, PipelineSettings, ProviderRegistryBuilder, RunConfig, RunController,
//!     WarehouseStore,
//! };
//! use marketsync_warehouse::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ProviderRegistryBuilder::from_env()?.build()?);
//!     let store = Arc::new(WarehouseStore::new(Warehouse::open_default()?));
//!     let controller = RunController::new(
//!         registry,
//!         store.clone(),
//!         store,
//!         PipelineSettings::default(),
//!     );
//!
//!     let summary = controller.run(JobKind::Peers, RunConfig::default()).await?;
//!     println!("saved {} records", summary.total_saved);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐
//! │ Run Controller │────▶│  Symbol Source   │
//! └───────┬────────┘     └──────────────────┘
//!         │
//!         ▼
//! ┌────────────────┐
//! │ Batch Scheduler│  one symbol at a time, delay between symbols
//! └───────┬────────┘
//!         │ per symbol
//!         ▼
//! ┌────────────────┐     ┌──────────────────┐
//! │   Resolver     │────▶│ Provider Clients │──▶ HTTP
//! └───────┬────────┘     └──────────────────┘
//!         ▼
//! ┌────────────────┐     ┌──────────────────┐
//! │  Transformer   │────▶│   Record Sink    │
//! └───────┬────────┘     └──────────────────┘
//!         ▼
//! ┌────────────────┐
//! │   Aggregator   │──▶ RunSummary
//! └────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only pre-processing failures surface as [`RunError`]. Provider, transform
//! and persistence failures are absorbed per call and show up as counters and
//! statuses on each [`SymbolOutcome`]:
//!
//! ```rust
//! use marketsync_core::{OutcomeStatus, SymbolOutcome};
//!
//! fn needs_attention(outcome: &SymbolOutcome) -> bool {
//!     match outcome.status {
//!         OutcomeStatus::SaveFailed
//!         | OutcomeStatus::ProcessingFailed
//!         | OutcomeStatus::RateLimited => true,
//!         OutcomeStatus::TransformFailed => outcome.records_fetched > 0,
//!         _ => false,
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read once at start-up and never logged
//! - Request URLs are logged with key parameters masked
//! - Store writes use bound parameters only

pub mod adapters;
pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod job;
pub mod payload;
pub mod pipeline;
pub mod provider;
pub mod provider_policy;
pub mod resolver;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod throttling;
pub mod transform;

// Provider clients
pub use adapters::{AlphaVantageQuoteClient, FinnhubPeersClient, FinnhubQuoteClient, FmpPeersClient};

// Aggregation
pub use aggregate::{
    accumulate, ConfigEcho, OutcomeStatus, ResultAggregator, RunSummary, SummaryHeader,
    SymbolOutcome, DEFAULT_OUTCOME_CAP,
};

// Configuration
pub use config::{PipelineSettings, ProviderRegistry, ProviderRegistryBuilder};

// Domain models
pub use domain::{CanonicalRecord, PeerRecord, Symbol, UtcDateTime, WatchlistEnrichment, WatchlistItem};

// Error types
pub use error::{ConfigError, ValidationError};

// HTTP client types
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use job::JobKind;

// Provider payloads and contract
pub use payload::{PeerPayload, QuotePayload, SourceRecord};
pub use provider::{FetchFuture, ProviderClient, SourceError, SourceErrorKind};
pub use provider_policy::ProviderPolicy;

// Pipeline
pub use pipeline::{RunConfig, RunController, RunError, RunPhase, RunRequest};
pub use resolver::{ProviderResolver, Resolution, Unresolved};
pub use scheduler::{run_batches, ScheduleConfig, ScheduleReport};

// Source identifiers
pub use source::{parse_provider_order, Dataset, ProviderId};

// Stores
pub use store::{MemoryStore, RecordSink, StoreError, StoreFuture, SymbolSource, WarehouseStore};

pub use throttling::RateBudget;
pub use transform::{transform, TransformContext, TransformError};
