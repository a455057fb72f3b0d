use std::process::ExitCode;

use marketsync_core::{RunConfig, RunController, RunRequest};
use marketsync_web::SyncResponse;

use crate::cli::SyncArgs;
use crate::error::CliError;

/// Runs one job and prints the same body the HTTP trigger returns. Exits
/// with 3 when the run finished but some symbols reported errors.
pub async fn run(args: &SyncArgs, controller: &RunController, pretty: bool) -> Result<ExitCode, CliError> {
    let request = RunRequest {
        symbols: (!args.symbols.is_empty()).then(|| args.symbols.clone()),
        batch_size: args.batch_size,
        delay_ms: args.delay_ms,
    };
    let summary = controller
        .run(args.job.into(), RunConfig::from_request(&request))
        .await?;

    let has_errors = summary.total_errors > 0;
    super::print_json(&SyncResponse::from(summary), pretty)?;

    Ok(if has_errors {
        ExitCode::from(3)
    } else {
        ExitCode::SUCCESS
    })
}
