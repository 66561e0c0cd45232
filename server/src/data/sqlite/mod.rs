//! SQLite store
//!
//! Embedded backend for single-node deployments and tests. The database file
//! is created on first start; WAL mode keeps concurrent request writers from
//! blocking each other's reads.

pub mod samples;
pub mod schema;

pub use sqlx::SqlitePool;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::log::LevelFilter;

use crate::core::config::{StoreConfig, StoreConnection};
use crate::core::constants::SQLITE_BUSY_TIMEOUT_SECS;
use crate::data::error::DataError;
use crate::data::traits::SampleRepository;
use crate::data::types::{ExtractedRow, InsertOutcome};

pub struct SqliteService {
    pool: SqlitePool,
    table: String,
}

impl SqliteService {
    pub async fn init(config: &StoreConfig) -> Result<Self, DataError> {
        let options = match &config.connection {
            StoreConnection::Url(url) if !url.starts_with("sqlite:") => {
                return Err(DataError::Config(format!(
                    "SQLite URL must start with 'sqlite:' (driver is sqlite, got '{}')",
                    url.split(':').next().unwrap_or_default()
                )));
            }
            StoreConnection::Url(url) => SqliteConnectOptions::from_str(url)
                .map_err(|e| DataError::Config(format!("Invalid SQLite URL: {}", e)))?,
            StoreConnection::Fields { name, .. } => SqliteConnectOptions::new().filename(name),
        };

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS))
            .log_statements(LevelFilter::Trace);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(DataError::from_sqlite)?;

        tracing::debug!(
            filename = %pool.connect_options().get_filename().display(),
            table = %config.table,
            "SqliteService initialized"
        );
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    /// Wrap an existing pool (in-memory databases in tests)
    pub fn from_pool(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DataError::from_sqlite)?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
    }
}

#[async_trait]
impl SampleRepository for Arc<SqliteService> {
    async fn ensure_schema(&self) -> Result<(), DataError> {
        let indexed = samples::ensure_schema(self.pool(), &self.table)
            .await
            .map_err(DataError::from_sqlite)?;
        if !indexed {
            tracing::warn!(
                table = %self.table,
                "Existing rows contain duplicates; unique index not created"
            );
        }
        Ok(())
    }

    async fn insert_if_absent(&self, row: &ExtractedRow) -> Result<InsertOutcome, DataError> {
        samples::insert_if_absent(self.pool(), &self.table, row)
            .await
            .map_err(DataError::from_sqlite)
    }

    async fn count_rows(&self) -> Result<u64, DataError> {
        samples::count_rows(self.pool(), &self.table)
            .await
            .map_err(DataError::from_sqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FailurePolicyConfig;
    use crate::core::config::StoreDriver;

    fn file_config(path: &std::path::Path) -> StoreConfig {
        StoreConfig {
            driver: StoreDriver::Sqlite,
            connection: StoreConnection::Fields {
                address: String::new(),
                port: 0,
                name: path.display().to_string(),
                user: String::new(),
                password: String::new(),
            },
            table: "monitoring".to_string(),
            max_connections: 2,
            acquire_timeout_secs: 5,
            failure_policy: FailurePolicyConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");

        let service = Arc::new(SqliteService::init(&file_config(&path)).await.unwrap());
        service.ensure_schema().await.unwrap();
        service.ping().await.unwrap();

        assert!(path.exists());
        assert_eq!(service.count_rows().await.unwrap(), 0);
        service.close().await;
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");
        let row = ExtractedRow {
            date_time: "2024-01-01".to_string(),
            metric_name: "cpu".to_string(),
            value: "42.000000".to_string(),
        };

        let first = Arc::new(SqliteService::init(&file_config(&path)).await.unwrap());
        first.ensure_schema().await.unwrap();
        assert_eq!(
            first.insert_if_absent(&row).await.unwrap(),
            InsertOutcome::Inserted
        );
        first.close().await;

        let second = Arc::new(SqliteService::init(&file_config(&path)).await.unwrap());
        second.ensure_schema().await.unwrap();
        assert_eq!(
            second.insert_if_absent(&row).await.unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(second.count_rows().await.unwrap(), 1);
        second.close().await;
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let mut config = file_config(std::path::Path::new("unused"));
        config.connection = StoreConnection::Url("postgres://not-sqlite".to_string());
        assert!(matches!(
            SqliteService::init(&config).await,
            Err(DataError::Config(_))
        ));
    }
}
