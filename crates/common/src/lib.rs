//! SceneCast Common Utilities
//!
//! Shared infrastructure for all SceneCast crates:
//! - Error types, result aliases, and process exit codes
//! - Settings file discovery and loading
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
