//! API route handlers

pub mod health;
pub mod remote_write;
pub mod telemetry;
