//! Capture configuration
//!
//! This module defines configuration types and default values:
//! - `capture_config`: Configuration structure
//! - `defaults`: Default configuration values

pub mod capture_config;
pub mod defaults;

pub use capture_config::{CaptureConfig, OutputConfig};
