use thiserror::Error;

use marketsync_core::{ConfigError, RunError};
use marketsync_warehouse::WarehouseError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Run(RunError::NoSymbols { .. }) => 6,
            Self::Run(_) => 4,
            Self::Serialization(_) => 5,
            Self::Warehouse(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use marketsync_core::JobKind;

    use super::*;

    #[test]
    fn run_errors_have_distinct_exit_codes() {
        assert_eq!(CliError::from(RunError::NoSymbols { job: JobKind::Peers }).exit_code(), 6);
        assert_eq!(
            CliError::from(RunError::Configuration(String::from("no providers"))).exit_code(),
            4
        );
    }
}
