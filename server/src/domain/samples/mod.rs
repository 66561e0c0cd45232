//! Sample ingestion
//!
//! Decoded remote-write requests are flattened into samples, filtered down to
//! the tracked metric family, and written to the store without duplicates.

mod extract;
mod flatten;
mod persist;
mod pipeline;

pub use extract::{DropReason, Selector, format_value};
pub use flatten::{Sample, flatten};
pub use persist::{IngestError, RowWriter};
pub use pipeline::{IngestPipeline, IngestReport};
