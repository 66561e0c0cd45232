//! Family selection and row extraction
//!
//! A sample belongs to the tracked family when the textual form of its label
//! set contains the family string. Members are turned into rows from two
//! labels; anything missing a field, with a field or value the columns cannot
//! hold, or with a value that is not strictly positive, is dropped.

use std::cmp::Ordering;
use std::fmt;

use crate::core::config::SelectorConfig;
use crate::data::ExtractedRow;
use crate::utils::labels::LabelSet;

use super::flatten::Sample;

/// Why a sample was not turned into a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotInFamily,
    MissingDateTime,
    MissingName,
    /// Zero, negative or NaN
    NonPositiveValue,
    /// +Inf
    NonFiniteValue,
    /// Date/time or name longer than the column allows
    FieldTooLong,
    /// Too large for the store's fixed-point column
    ValueOutOfRange,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::NotInFamily => "not_in_family",
            DropReason::MissingDateTime => "missing_date_time",
            DropReason::MissingName => "missing_name",
            DropReason::NonPositiveValue => "non_positive_value",
            DropReason::NonFiniteValue => "non_finite_value",
            DropReason::FieldTooLong => "field_too_long",
            DropReason::ValueOutOfRange => "value_out_of_range",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest date/time or name accepted, in characters (`VARCHAR(255)` on server databases)
pub const MAX_FIELD_CHARS: usize = 255;

/// Exclusive upper bound on stored values (`DECIMAL(65,6)` keeps 59 integer digits)
pub const MAX_VALUE_EXCLUSIVE: f64 = 1e59;

/// Render a value with six fractional digits (`42.0` → `"42.000000"`)
pub fn format_value(value: f64) -> String {
    format!("{:.6}", value)
}

#[derive(Debug, Clone)]
pub struct Selector {
    config: SelectorConfig,
}

impl Selector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn is_member(&self, labels: &LabelSet) -> bool {
        labels.to_string().contains(&self.config.metric_family)
    }

    /// Read the date/time and name fields from the label set's JSON object
    ///
    /// Absent keys come back as empty strings.
    pub fn extract_fields(&self, labels: &LabelSet) -> (String, String) {
        let object = labels.to_json();
        let field = |key: &str| {
            object
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        (
            field(&self.config.date_time_label),
            field(&self.config.name_label),
        )
    }

    /// Membership test, extraction and acceptance gate for one sample
    pub fn select(&self, sample: &Sample) -> Result<ExtractedRow, DropReason> {
        if !self.is_member(&sample.labels) {
            return Err(DropReason::NotInFamily);
        }

        let (date_time, metric_name) = self.extract_fields(&sample.labels);
        if date_time.is_empty() {
            return Err(DropReason::MissingDateTime);
        }
        if metric_name.is_empty() {
            return Err(DropReason::MissingName);
        }
        if date_time.chars().count() > MAX_FIELD_CHARS
            || metric_name.chars().count() > MAX_FIELD_CHARS
        {
            return Err(DropReason::FieldTooLong);
        }
        // NaN is unordered and lands here too
        if sample.value.partial_cmp(&0.0) != Some(Ordering::Greater) {
            return Err(DropReason::NonPositiveValue);
        }
        if !sample.value.is_finite() {
            return Err(DropReason::NonFiniteValue);
        }
        if sample.value >= MAX_VALUE_EXCLUSIVE {
            return Err(DropReason::ValueOutOfRange);
        }

        Ok(ExtractedRow {
            date_time,
            metric_name,
            value: format_value(sample.value),
        })
    }
}
