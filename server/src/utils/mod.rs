//! Utility functions for the application

pub mod labels;
pub mod prompb;
pub mod retry;
pub mod sql;
