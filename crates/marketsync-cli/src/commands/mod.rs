mod runs;
mod serve;
mod sync;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use marketsync_core::{PipelineSettings, ProviderRegistryBuilder, RunController, WarehouseStore};
use marketsync_warehouse::{Warehouse, WarehouseConfig};
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    match &cli.command {
        Command::Serve(args) => serve::run(args, build_controller(cli)?).await,
        Command::Sync(args) => sync::run(args, &build_controller(cli)?, cli.pretty).await,
        Command::Runs(args) => runs::run(args, &open_warehouse(cli)?, cli.pretty),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db_path {
        Some(path) => WarehouseConfig::with_db_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

fn settings(cli: &Cli) -> PipelineSettings {
    PipelineSettings {
        provider_timeout: Duration::from_millis(cli.provider_timeout_ms.max(1)),
        store_timeout: Duration::from_millis(cli.store_timeout_ms.max(1)),
        run_deadline: cli.run_deadline_secs.map(Duration::from_secs),
        ..PipelineSettings::default()
    }
}

fn build_controller(cli: &Cli) -> Result<RunController, CliError> {
    let settings = settings(cli);
    let registry = ProviderRegistryBuilder::from_env()?
        .with_provider_timeout(settings.provider_timeout)
        .build()?;
    let store = Arc::new(WarehouseStore::new(open_warehouse(cli)?));
    Ok(RunController::new(
        Arc::new(registry),
        store.clone(),
        store,
        settings,
    ))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
