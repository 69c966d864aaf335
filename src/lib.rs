//! authzctl library
//!
//! Exposes the configuration and CLI modules for integration testing.

pub mod cli;
pub mod config;
pub mod errors;

pub use config::{AppConfig, LoadedConfig};
pub use errors::ConfigError;
