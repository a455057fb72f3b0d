use std::process::ExitCode;

use marketsync_warehouse::Warehouse;
use serde_json::{json, Value};

use crate::cli::RunsArgs;
use crate::error::CliError;

pub fn run(args: &RunsArgs, warehouse: &Warehouse, pretty: bool) -> Result<ExitCode, CliError> {
    let runs: Vec<Value> = warehouse
        .recent_sync_runs(args.limit)?
        .into_iter()
        .map(|row| {
            json!({
                "run_id": row.run_id,
                "job": row.job,
                "symbols_requested": row.symbols_requested,
                "symbols_processed": row.symbols_processed,
                "total_saved": row.total_saved,
                "total_errors": row.total_errors,
                "elapsed_ms": row.elapsed_ms,
                "deadline_exceeded": row.deadline_exceeded,
                "finished_at": row.finished_at,
            })
        })
        .collect();

    super::print_json(&runs, pretty)?;
    Ok(ExitCode::SUCCESS)
}
