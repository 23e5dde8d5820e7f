//! HTTP API handlers for dcol-ingest
//!
//! Thin transport over [`crate::collector::Collector`]: requests are parsed
//! and validated here, all invariants live in the pipeline.

pub mod acquisition;
pub mod health;
pub mod statistics;
pub mod storage;

pub use acquisition::acquisition_routes;
pub use health::health_routes;
pub use statistics::statistics_routes;
pub use storage::storage_routes;
