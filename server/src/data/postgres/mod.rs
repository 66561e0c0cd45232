//! PostgreSQL store
//!
//! Pooled backend for shared deployments. Sample values are stored as
//! `NUMERIC`; the fixed-point text produced by the selector is cast on insert.

pub mod schema;

pub use sqlx::PgPool;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::log::LevelFilter;

use crate::core::config::{StoreConfig, StoreConnection};
use crate::data::error::{DataError, is_unique_violation};
use crate::data::traits::SampleRepository;
use crate::data::types::{ExtractedRow, InsertOutcome};

pub struct PostgresService {
    pool: PgPool,
    table: String,
}

impl PostgresService {
    pub async fn init(config: &StoreConfig) -> Result<Self, DataError> {
        let options: PgConnectOptions = match &config.connection {
            StoreConnection::Url(url) => url
                .parse()
                .map_err(|e| DataError::Config(format!("Invalid PostgreSQL URL: {}", e)))?,
            StoreConnection::Fields {
                address,
                port,
                name,
                user,
                password,
            } => PgConnectOptions::new()
                .host(address)
                .port(*port)
                .database(name)
                .username(user)
                .password(password),
        };
        let options = options.log_statements(LevelFilter::Trace);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(DataError::from_postgres)?;

        tracing::debug!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout_secs,
            table = %config.table,
            "PostgresService initialized"
        );
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DataError::from_postgres)?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("PostgreSQL pool closed");
    }
}

#[async_trait]
impl SampleRepository for Arc<PostgresService> {
    async fn ensure_schema(&self) -> Result<(), DataError> {
        sqlx::query(&schema::create_table(&self.table))
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        match sqlx::query(&schema::create_unique_index(&self.table))
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
            Err(e) => Err(DataError::from_postgres(e)),
        }
    }

    async fn insert_if_absent(&self, row: &ExtractedRow) -> Result<InsertOutcome, DataError> {
        let result = sqlx::query(&schema::insert_if_absent(&self.table))
            .bind(&row.date_time)
            .bind(&row.metric_name)
            .bind(&row.value)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn count_rows(&self) -> Result<u64, DataError> {
        let count: i64 = sqlx::query_scalar(&schema::count_rows(&self.table))
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    // PostgreSQL round-trips need a running server; statement shape is covered in schema.rs
}
