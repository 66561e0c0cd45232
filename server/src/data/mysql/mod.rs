//! MySQL store
//!
//! Default backend. Values land in `DECIMAL(65,6)`, matching the six
//! fractional digits produced by the selector.

pub mod schema;

pub use sqlx::MySqlPool;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::log::LevelFilter;

use crate::core::config::{StoreConfig, StoreConnection};
use crate::data::error::{DataError, is_unique_violation};
use crate::data::traits::SampleRepository;
use crate::data::types::{ExtractedRow, InsertOutcome};

pub struct MysqlService {
    pool: MySqlPool,
    table: String,
}

impl MysqlService {
    pub async fn init(config: &StoreConfig) -> Result<Self, DataError> {
        let options: MySqlConnectOptions = match &config.connection {
            StoreConnection::Url(url) => url
                .parse()
                .map_err(|e| DataError::Config(format!("Invalid MySQL URL: {}", e)))?,
            StoreConnection::Fields {
                address,
                port,
                name,
                user,
                password,
            } => MySqlConnectOptions::new()
                .host(address)
                .port(*port)
                .database(name)
                .username(user)
                .password(password),
        };
        let options = options.log_statements(LevelFilter::Trace);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(DataError::from_mysql)?;

        tracing::debug!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout_secs,
            table = %config.table,
            "MysqlService initialized"
        );
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DataError::from_mysql)?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("MySQL pool closed");
    }

    async fn has_unique_index(&self) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(schema::UNIQUE_INDEX_EXISTS)
            .bind(&self.table)
            .bind(schema::UNIQUE_INDEX_NAME)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl SampleRepository for Arc<MysqlService> {
    async fn ensure_schema(&self) -> Result<(), DataError> {
        sqlx::query(&schema::create_table(&self.table))
            .execute(self.pool())
            .await
            .map_err(DataError::from_mysql)?;

        // MySQL has no CREATE UNIQUE INDEX IF NOT EXISTS
        if self
            .has_unique_index()
            .await
            .map_err(DataError::from_mysql)?
        {
            return Ok(());
        }

        match sqlx::query(&schema::add_unique_index(&self.table))
            .execute(self.pool())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(
                    table = %self.table,
                    error = %e,
                    "Existing rows contain duplicates; unique index not created"
                );
                Ok(())
            }
            Err(e) => Err(DataError::from_mysql(e)),
        }
    }

    async fn insert_if_absent(&self, row: &ExtractedRow) -> Result<InsertOutcome, DataError> {
        let result = sqlx::query(&schema::insert_if_absent(&self.table))
            .bind(&row.date_time)
            .bind(&row.metric_name)
            .bind(&row.value)
            .bind(&row.date_time)
            .bind(&row.metric_name)
            .bind(&row.value)
            .execute(self.pool())
            .await
            .map_err(DataError::from_mysql)?;

        Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn count_rows(&self) -> Result<u64, DataError> {
        let count: i64 = sqlx::query_scalar(&schema::count_rows(&self.table))
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_mysql)?;
        Ok(count.max(0) as u64)
    }
}
