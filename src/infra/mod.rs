//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod refresh_scope;
pub mod sources;
pub mod telemetry;
