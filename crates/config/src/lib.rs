//! Configuration module for the MKV to MP4 conversion daemon
//!
//! Handles loading configuration from TOML files and environment variable
//! overrides, plus the typed setting values shared with the CLI.

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
