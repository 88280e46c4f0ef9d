//! Console and exception events, and the sink trait they are emitted to
//!
//! This module provides the EventSink trait for decoupling event output
//! from the session. Implementations can write log lines (see
//! [`crate::sink::LogSink`]), collect events in tests, or drop them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::RemoteValue;

const UNKNOWN_EXCEPTION: &str = "Unknown exception";

/// Console API types and their display labels
pub const CONSOLE_TYPES: &[(&str, &str)] = &[
    ("log", "LOG"),
    ("debug", "DEBUG"),
    ("info", "INFO"),
    ("error", "ERROR"),
    ("warning", "WARN"),
    ("dir", "DIR"),
    ("dirxml", "DIRXML"),
    ("table", "TABLE"),
    ("trace", "TRACE"),
    ("clear", "CLEAR"),
    ("startGroup", "GROUP"),
    ("startGroupCollapsed", "GROUP_COLLAPSED"),
    ("endGroup", "GROUP_END"),
    ("assert", "ASSERT"),
    ("profile", "PROFILE"),
    ("profileEnd", "PROFILE_END"),
    ("count", "COUNT"),
    ("timeEnd", "TIME_END"),
];

/// Display label for a console type; unknown types are upper-cased
pub fn console_label(kind: &str) -> String {
    CONSOLE_TYPES
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| kind.to_uppercase())
}

/// Console types whose records carry a stack trace
pub fn shows_stack_trace(kind: &str) -> bool {
    matches!(kind, "error" | "warning" | "trace")
}

/// One call frame of a page stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub function: String,
    pub url: String,
    pub line: i64,
    pub col: i64,
}

impl StackFrame {
    /// Name shown for the frame's function
    pub fn display_name(&self) -> &str {
        if self.function.is_empty() {
            "<anonymous>"
        } else {
            &self.function
        }
    }
}

/// A page call to a console API method
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleEvent {
    /// Console API type (`log`, `error`, `warning`, ...)
    pub kind: String,
    /// Milliseconds since UNIX_EPOCH
    pub timestamp_ms: i64,
    pub args: Vec<RemoteValue>,
    pub stack_trace: Option<Vec<StackFrame>>,
}

/// An uncaught exception in the page
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEvent {
    /// Milliseconds since UNIX_EPOCH
    pub timestamp_ms: i64,
    pub description: String,
    pub stack_trace: Option<Vec<StackFrame>>,
}

fn default_console_type() -> String {
    "log".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleApiParams {
    #[serde(rename = "type", default = "default_console_type")]
    kind: String,
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    stack_trace: Option<WireStackTrace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExceptionThrownParams {
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    exception_details: WireExceptionDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireExceptionDetails {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    exception: Option<WireException>,
    #[serde(default)]
    stack_trace: Option<WireStackTrace>,
}

#[derive(Debug, Default, Deserialize)]
struct WireException {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStackTrace {
    #[serde(default)]
    call_frames: Vec<WireCallFrame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCallFrame {
    #[serde(default)]
    function_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    line_number: i64,
    #[serde(default)]
    column_number: i64,
}

impl WireStackTrace {
    fn into_frames(self) -> Vec<StackFrame> {
        self.call_frames
            .into_iter()
            .map(|frame| StackFrame {
                function: frame.function_name,
                url: frame.url,
                line: frame.line_number,
                col: frame.column_number,
            })
            .collect()
    }
}

/// Protocol timestamps are fractional milliseconds
fn millis(timestamp: f64) -> i64 {
    if timestamp.is_finite() {
        timestamp as i64
    } else {
        0
    }
}

impl ConsoleEvent {
    /// Build from `Runtime.consoleAPICalled` params
    pub fn from_params(params: &Value) -> Result<Self, serde_json::Error> {
        let wire: ConsoleApiParams = serde_json::from_value(params.clone())?;
        Ok(Self {
            kind: wire.kind,
            timestamp_ms: millis(wire.timestamp),
            args: wire.args.iter().map(RemoteValue::from_wire).collect(),
            stack_trace: wire.stack_trace.map(WireStackTrace::into_frames),
        })
    }
}

impl ExceptionEvent {
    /// Build from `Runtime.exceptionThrown` params
    pub fn from_params(params: &Value) -> Result<Self, serde_json::Error> {
        let wire: ExceptionThrownParams = serde_json::from_value(params.clone())?;
        let details = wire.exception_details;

        let description = details
            .exception
            .and_then(|e| e.description)
            .filter(|d| !d.is_empty())
            .or(details.text.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| UNKNOWN_EXCEPTION.to_string());

        Ok(Self {
            timestamp_ms: millis(wire.timestamp),
            description,
            stack_trace: details.stack_trace.map(WireStackTrace::into_frames),
        })
    }
}

/// Event sink for emitting capture events to listeners
///
/// This trait abstracts event output so the session can work with
/// different destinations (log files, terminals, tests, etc.)
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit a console API event that passed the type filter
    async fn emit_console(&self, event: &ConsoleEvent) -> Result<(), String>;

    /// Emit an uncaught exception
    async fn emit_exception(&self, event: &ExceptionEvent) -> Result<(), String>;

    /// Emit a capture started event
    async fn emit_session_started(&self, target: &str) -> Result<(), String>;

    /// Emit a capture ended event
    async fn emit_session_ended(&self) -> Result<(), String>;
}

/// No-op event sink for testing or embedding without output
#[derive(Default, Clone)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit_console(&self, _event: &ConsoleEvent) -> Result<(), String> {
        Ok(())
    }

    async fn emit_exception(&self, _event: &ExceptionEvent) -> Result<(), String> {
        Ok(())
    }

    async fn emit_session_started(&self, _target: &str) -> Result<(), String> {
        Ok(())
    }

    async fn emit_session_ended(&self) -> Result<(), String> {
        Ok(())
    }
}
