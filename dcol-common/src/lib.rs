//! # dcol Common Library
//!
//! Shared code for the dcol collection binaries:
//! - Configuration loading and root folder resolution
//! - Common error type
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
