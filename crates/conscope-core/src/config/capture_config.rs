use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::events::CONSOLE_TYPES;

/// Capture configuration
///
/// Provides centralized configuration management with:
/// - Serde support for loading from files/env
/// - Builder pattern for customization
/// - Sensible defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Deadline for each protocol call (milliseconds)
    pub call_timeout_ms: u64,

    /// Console types to record; empty means every type
    pub console_types: Vec<String>,

    /// How records are rendered and where they go
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Formatted text lines; `false` writes one JSON object per record
    pub format_output: bool,

    /// ANSI colours on the terminal prefix
    pub color: bool,

    /// Write records to the terminal as well as the file
    pub echo_terminal: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format_output: true,
            color: true,
            echo_terminal: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: super::defaults::DEFAULT_CALL_TIMEOUT_MS,
            console_types: Vec::new(),
            output: OutputConfig::default(),
        }
    }
}

impl CaptureConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method for the console type filter
    pub fn with_console_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.console_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method for the call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method for output settings
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// The console type allow-set
    pub fn console_filter(&self) -> HashSet<String> {
        if self.console_types.is_empty() {
            CONSOLE_TYPES
                .iter()
                .map(|(name, _)| (*name).to_string())
                .collect()
        } else {
            self.console_types.iter().cloned().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::new();
        assert_eq!(config.call_timeout(), Duration::from_secs(5));
        assert!(config.output.format_output);
        assert!(config.output.echo_terminal);
        assert_eq!(config.console_filter().len(), CONSOLE_TYPES.len());
    }

    #[test]
    fn test_explicit_console_types() {
        let config = CaptureConfig::new().with_console_types(["error", "warning"]);
        let filter = config.console_filter();
        assert_eq!(filter.len(), 2);
        assert!(filter.contains("error"));
        assert!(!filter.contains("log"));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"call_timeout_ms": 250, "output": {"color": false}}"#)
                .unwrap();
        assert_eq!(config.call_timeout(), Duration::from_millis(250));
        assert!(!config.output.color);
        assert!(config.output.format_output);
    }
}
