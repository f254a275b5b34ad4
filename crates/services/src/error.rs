//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Errors emitted while reading tracker configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid number: {raw}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} is out of range: {value}")]
    OutOfRange { var: &'static str, value: u64 },
}

/// Errors emitted while assembling tracking services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackingServicesError {
    #[error("remote session store is not configured (set READLTR_API_URL)")]
    RemoteNotConfigured,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
