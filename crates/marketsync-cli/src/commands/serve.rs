use std::process::ExitCode;

use marketsync_core::RunController;
use marketsync_web::AppState;

use crate::cli::ServeArgs;
use crate::error::CliError;

pub async fn run(args: &ServeArgs, controller: RunController) -> Result<ExitCode, CliError> {
    tracing::info!(bind = %args.bind, settings = ?controller.settings(), "starting trigger server");
    marketsync_web::serve(args.bind, AppState::new(controller)).await?;
    Ok(ExitCode::SUCCESS)
}
