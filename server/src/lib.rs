//! Prometheus remote-write receiver that persists one metric family into a SQL table

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
