//! Ingest pipeline
//!
//! Flatten → select → write, sequentially, for one decoded request.

use crate::core::ShutdownService;
use crate::core::constants::{
    METRIC_ROWS_DUPLICATE, METRIC_ROWS_INSERTED, METRIC_SAMPLES_DROPPED,
    METRIC_SAMPLES_RECEIVED, METRIC_STORE_ERRORS,
};
use crate::data::InsertOutcome;
use crate::utils::prompb::WriteRequest;

use super::extract::{DropReason, Selector};
use super::flatten::flatten;
use super::persist::{IngestError, RowWriter};

/// Per-request counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub series: usize,
    pub samples: usize,
    /// Samples belonging to the tracked family, whether or not they became rows
    pub matched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Samples dropped by the selector (family members and non-members)
    pub dropped: usize,
}

#[derive(Clone)]
pub struct IngestPipeline {
    selector: Selector,
    writer: RowWriter,
    shutdown: ShutdownService,
}

impl IngestPipeline {
    pub fn new(selector: Selector, writer: RowWriter, shutdown: ShutdownService) -> Self {
        Self {
            selector,
            writer,
            shutdown,
        }
    }

    /// Run one request through selection and persistence.
    ///
    /// The first failed write ends the request. Under a halting policy it also
    /// triggers a fatal shutdown, and every later request fails with `Halted`
    /// without touching the store.
    pub async fn ingest(&self, request: &WriteRequest) -> Result<IngestReport, IngestError> {
        if self.shutdown.fatal_reason().is_some() {
            return Err(IngestError::Halted);
        }

        let mut report = IngestReport {
            series: request.timeseries.len(),
            ..Default::default()
        };

        for sample in flatten(request) {
            report.samples += 1;
            metrics::counter!(METRIC_SAMPLES_RECEIVED).increment(1);

            let selected = self.selector.select(&sample);
            if !matches!(selected, Err(DropReason::NotInFamily)) {
                report.matched += 1;
            }

            let row = match selected {
                Ok(row) => row,
                Err(reason) => {
                    report.dropped += 1;
                    metrics::counter!(METRIC_SAMPLES_DROPPED, "reason" => reason.as_str())
                        .increment(1);
                    tracing::trace!(
                        labels = %sample.labels,
                        value = sample.value,
                        reason = %reason,
                        "Sample dropped"
                    );
                    continue;
                }
            };

            match self.writer.write(&row).await {
                Ok(InsertOutcome::Inserted) => {
                    report.inserted += 1;
                    metrics::counter!(METRIC_ROWS_INSERTED).increment(1);
                }
                Ok(InsertOutcome::Duplicate) => {
                    report.duplicates += 1;
                    metrics::counter!(METRIC_ROWS_DUPLICATE).increment(1);
                    tracing::debug!(
                        date_time = %row.date_time,
                        metric_name = %row.metric_name,
                        value = %row.value,
                        "Row already stored"
                    );
                }
                Err(e) => {
                    metrics::counter!(METRIC_STORE_ERRORS).increment(1);
                    if self.writer.policy().kind.halts() {
                        self.shutdown.trigger_fatal(e.to_string());
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            series = report.series,
            samples = report.samples,
            matched = report.matched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            dropped = report.dropped,
            "Write request ingested"
        );
        Ok(report)
    }
}
