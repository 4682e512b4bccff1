//! # qa-sync Common Library
//!
//! Shared code for the qa-sync crates:
//! - Error type
//! - TOML configuration loading and credential resolution
//! - Logging setup and log file management

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::LogLevel;
