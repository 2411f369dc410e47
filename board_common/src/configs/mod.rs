//! # Configuration Modules
//!
//! Resolution of [`ClientConfig`]: defaults, an optional JSON file, the
//! `BOARD_*` environment, then command-line overrides supplied by a binary.

/// Client configuration with layered overrides.
pub mod client_config;

pub use client_config::{ClientConfig, ConfigOverrides, ReconnectPolicy};
