//! Remote-write request → per-point samples

use std::sync::Arc;

use crate::utils::labels::LabelSet;
use crate::utils::prompb::WriteRequest;

/// One data point with the resolved labels of its series
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Shared by every sample of the same series
    pub labels: Arc<LabelSet>,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Lazily flatten a request, series by series, points in input order.
///
/// Each series' label set is resolved once and shared by its samples.
pub fn flatten(request: &WriteRequest) -> impl Iterator<Item = Sample> + '_ {
    request.timeseries.iter().flat_map(|series| {
        let labels = Arc::new(LabelSet::from_labels(&series.labels));
        series.samples.iter().map(move |point| Sample {
            labels: Arc::clone(&labels),
            value: point.value,
            timestamp_ms: point.timestamp,
        })
    })
}
