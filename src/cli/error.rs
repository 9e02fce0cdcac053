//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    /// A navigation query did not end at a channel
    #[error("{0}")]
    Unresolved(String),

    /// Deep validation found problems in the enumerated output
    #[error("{0}")]
    Check(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Unresolved(_) => crate::exitcode::UNRESOLVED,
            CliError::Check(_) => crate::exitcode::DATAERR,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Application(app) => match app {
                    ApplicationError::Schema(_) => crate::exitcode::DATAERR,
                    ApplicationError::DatabaseNotFound(_) => crate::exitcode::NOINPUT,
                    ApplicationError::NoDatabase | ApplicationError::AlreadyExplicit(_) => {
                        crate::exitcode::USAGE
                    }
                    ApplicationError::Navigation(_) => crate::exitcode::UNRESOLVED,
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
                },
            },
        }
    }
}
