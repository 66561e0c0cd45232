//! Duplicate-safe row writes under the store failure policy

use std::sync::Arc;

use thiserror::Error;

use crate::core::config::{FailurePolicyConfig, FailurePolicyKind};
use crate::data::{DataError, ExtractedRow, InsertOutcome, SampleRepository};
use crate::utils::retry::retry_with_backoff_async;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("store write failed after {attempts} attempt(s): {source}")]
    Store { attempts: u32, source: DataError },

    #[error("ingestion halted after an earlier store failure")]
    Halted,
}

/// Writes extracted rows through a repository
#[derive(Clone)]
pub struct RowWriter {
    repository: Arc<dyn SampleRepository>,
    policy: FailurePolicyConfig,
}

impl RowWriter {
    pub fn new(repository: Arc<dyn SampleRepository>, policy: FailurePolicyConfig) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> FailurePolicyConfig {
        self.policy
    }

    /// Insert one row; only `retry` makes more than one attempt
    pub async fn write(&self, row: &ExtractedRow) -> Result<InsertOutcome, IngestError> {
        let max_attempts = match self.policy.kind {
            FailurePolicyKind::Retry => self.policy.max_attempts.max(1),
            FailurePolicyKind::Halt | FailurePolicyKind::Reject => 1,
        };

        let result = retry_with_backoff_async(max_attempts, self.policy.base_delay_ms, || {
            self.repository.insert_if_absent(row)
        })
        .await;

        match result {
            Ok((outcome, attempts)) => {
                if attempts > 1 {
                    tracing::debug!(
                        date_time = %row.date_time,
                        metric_name = %row.metric_name,
                        attempts,
                        "Wrote row after retry"
                    );
                }
                Ok(outcome)
            }
            Err((source, attempts)) => {
                tracing::error!(
                    error = %source,
                    backend = source.backend(),
                    transient = source.is_transient(),
                    attempts,
                    policy = %self.policy.kind,
                    date_time = %row.date_time,
                    metric_name = %row.metric_name,
                    "Failed to write row"
                );
                Err(IngestError::Store { attempts, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` inserts, then succeeds
    struct FlakyRepository {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SampleRepository for FlakyRepository {
        async fn ensure_schema(&self) -> Result<(), DataError> {
            Ok(())
        }

        async fn insert_if_absent(&self, _row: &ExtractedRow) -> Result<InsertOutcome, DataError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DataError::from_mysql(sqlx::Error::PoolTimedOut))
            } else {
                Ok(InsertOutcome::Inserted)
            }
        }

        async fn count_rows(&self) -> Result<u64, DataError> {
            Ok(0)
        }
    }

    fn writer(kind: FailurePolicyKind, failures: u32) -> (RowWriter, Arc<FlakyRepository>) {
        let repo = Arc::new(FlakyRepository {
            failures,
            calls: AtomicU32::new(0),
        });
        let policy = FailurePolicyConfig {
            kind,
            max_attempts: 3,
            base_delay_ms: 1,
        };
        (RowWriter::new(repo.clone(), policy), repo)
    }

    fn row() -> ExtractedRow {
        ExtractedRow {
            date_time: "2024-01-01".to_string(),
            metric_name: "cpu".to_string(),
            value: "1.000000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_halt_makes_single_attempt() {
        let (writer, repo) = writer(FailurePolicyKind::Halt, 1);
        let err = writer.write(&row()).await.unwrap_err();
        assert!(matches!(err, IngestError::Store { attempts: 1, .. }));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reject_makes_single_attempt() {
        let (writer, repo) = writer(FailurePolicyKind::Reject, 1);
        assert!(writer.write(&row()).await.is_err());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let (writer, repo) = writer(FailurePolicyKind::Retry, 2);
        assert_eq!(writer.write(&row()).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_after_configured_attempts() {
        let (writer, repo) = writer(FailurePolicyKind::Retry, u32::MAX);
        let err = writer.write(&row()).await.unwrap_err();
        assert!(matches!(err, IngestError::Store { attempts: 3, .. }));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::Store {
            attempts: 2,
            source: DataError::from_postgres(sqlx::Error::PoolClosed),
        };
        assert!(err.to_string().starts_with("store write failed after 2 attempt(s)"));
        assert_eq!(
            IngestError::Halted.to_string(),
            "ingestion halted after an earlier store failure"
        );
    }
}
