//! Dashboard configuration.
//!
//! The only required value is the database connection string, supplied
//! through the environment. Absence is a fatal startup condition.

use crate::error::{QcError, Result};

/// Environment variable checked first for the connection string.
pub const DATABASE_URL_VAR: &str = "SPIN_QC_DATABASE_URL";
/// Conventional fallback variable.
pub const DATABASE_URL_FALLBACK_VAR: &str = "DATABASE_URL";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// PostgreSQL connection string; a read-only role is sufficient.
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DashboardConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }

    /// Resolve the connection string from the environment:
    /// `SPIN_QC_DATABASE_URL` first, then `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(DATABASE_URL_VAR)
            .or_else(|_| std::env::var(DATABASE_URL_FALLBACK_VAR))
            .map_err(|_| {
                QcError::Config(format!(
                    "no database connection string: set {DATABASE_URL_VAR} or {DATABASE_URL_FALLBACK_VAR}"
                ))
            })?;
        if url.trim().is_empty() {
            return Err(QcError::Config(
                "database connection string is empty".to_string(),
            ));
        }
        Ok(Self::new(url))
    }
}
