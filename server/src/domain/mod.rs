//! Domain logic
//!
//! - `samples` - remote-write sample selection and persistence

pub mod samples;

pub use samples::{IngestError, IngestPipeline, IngestReport};
