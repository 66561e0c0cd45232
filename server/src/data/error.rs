//! Unified error type for the data layer
//!
//! Wraps sqlx errors while preserving which backend produced them.

use thiserror::Error;

/// Unified error type for store operations
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// PostgreSQL database error
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// MySQL database error
    #[error("MySQL error: {0}")]
    Mysql(sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table or column name that cannot be safely interpolated
    #[error("Invalid identifier '{0}': use letters, digits and underscores (max 64, no leading digit)")]
    InvalidIdentifier(String),
}

impl DataError {
    pub fn from_sqlite(e: sqlx::Error) -> Self {
        Self::Sqlite(e)
    }

    pub fn from_postgres(e: sqlx::Error) -> Self {
        Self::Postgres(e)
    }

    pub fn from_mysql(e: sqlx::Error) -> Self {
        Self::Mysql(e)
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) | Self::Postgres(e) | Self::Mysql(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            Self::Config(_) | Self::InvalidIdentifier(_) => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::Mysql(_) => "mysql",
            Self::Config(_) | Self::InvalidIdentifier(_) => "unknown",
        }
    }
}

/// True when the underlying database rejected a statement for violating a unique constraint
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
