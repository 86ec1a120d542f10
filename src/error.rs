use thiserror::Error;

/// Result type for all pipeline operations.
pub type Result<T> = std::result::Result<T, QcError>;

#[derive(Error, Debug)]
pub enum QcError {
    /// Connection-string or pool construction problem; fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter precondition violated before any query runs.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
