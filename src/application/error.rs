//! Application-level errors (wraps domain errors)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{NavigationInvalid, SchemaError};

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("channel database not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("no channel database given; pass --db or set `database` in chnav.toml")]
    NoDatabase,

    #[error("document already has an explicit hierarchy: {0}")]
    AlreadyExplicit(PathBuf),

    #[error("{0}")]
    Navigation(NavigationInvalid),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
