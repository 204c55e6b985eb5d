//! Sage ERP middleware core: inventory cache refresh, nightly scheduling and
//! staleness-gated product reads behind an HTTP API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
