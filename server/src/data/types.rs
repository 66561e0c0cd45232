//! Row types shared by all store backends

/// A sample that passed selection, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    pub date_time: String,
    pub metric_name: String,
    /// Fixed-point decimal rendering of the sample value (six fractional digits)
    pub value: String,
}

/// Outcome of a duplicate-safe insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl InsertOutcome {
    pub fn from_rows_affected(rows: u64) -> Self {
        if rows > 0 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        }
    }
}
