//! Data storage layer
//!
//! - `sqlite`, `postgres`, `mysql` - store backends (sqlx pools)
//! - `traits` - `SampleRepository`, the interface the ingest pipeline writes through
//! - `types` - rows shared by all backends
//! - `error` - unified error type for all backends

pub mod error;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use mysql::MysqlService;
pub use postgres::PostgresService;
pub use sqlite::SqliteService;
pub use traits::SampleRepository;
pub use types::{ExtractedRow, InsertOutcome};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{StoreConfig, StoreDriver};
use crate::core::constants::STORE_HEALTH_CHECK_INTERVAL_SECS;
use crate::utils::sql::is_plain_identifier;

/// Reject table names that cannot be interpolated into SQL as-is
pub fn validate_table_name(table: &str) -> Result<(), DataError> {
    if is_plain_identifier(table) {
        Ok(())
    } else {
        Err(DataError::InvalidIdentifier(table.to_string()))
    }
}

/// Store service enum
///
/// Wraps the backend selected by `store.driver`. Created once at startup and
/// shared (as `Arc<StoreService>`) with every request.
pub enum StoreService {
    Mysql(Arc<MysqlService>),
    Postgres(Arc<PostgresService>),
    Sqlite(Arc<SqliteService>),
}

impl StoreService {
    /// Connect to the configured backend
    pub async fn init(config: &StoreConfig) -> Result<Self, DataError> {
        validate_table_name(&config.table)?;

        match config.driver {
            StoreDriver::Mysql => Ok(Self::Mysql(Arc::new(MysqlService::init(config).await?))),
            StoreDriver::Postgres => Ok(Self::Postgres(Arc::new(
                PostgresService::init(config).await?,
            ))),
            StoreDriver::Sqlite => Ok(Self::Sqlite(Arc::new(SqliteService::init(config).await?))),
        }
    }

    pub fn driver(&self) -> StoreDriver {
        match self {
            Self::Mysql(_) => StoreDriver::Mysql,
            Self::Postgres(_) => StoreDriver::Postgres,
            Self::Sqlite(_) => StoreDriver::Sqlite,
        }
    }

    /// Repository trait object for sample writes
    pub fn repository(&self) -> Arc<dyn SampleRepository> {
        match self {
            Self::Mysql(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(s) => Arc::new(Arc::clone(s)),
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
        }
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        match self {
            Self::Mysql(s) => s.ping().await,
            Self::Postgres(s) => s.ping().await,
            Self::Sqlite(s) => s.ping().await,
        }
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        match self {
            Self::Mysql(s) => s.close().await,
            Self::Postgres(s) => s.close().await,
            Self::Sqlite(s) => s.close().await,
        }
    }

    /// Start a background health check (`SELECT 1` on an interval)
    pub fn start_health_check_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(STORE_HEALTH_CHECK_INTERVAL_SECS));
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Store health check task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = store.ping().await {
                            tracing::warn!(backend = e.backend(), error = %e, "Store health check failed");
                        }
                    }
                }
            }
        })
    }
}
