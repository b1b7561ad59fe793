//! # geoloc-backend
//!
//! Service surface around the multilateration engine: a small axum HTTP API
//! and the `geoloc-cli` runner, both reading the SQLite `Geo` observation
//! table and handing row streams to `geoloc-engine`.

pub mod handlers;
pub mod store;
