//! Line-oriented event sink
//!
//! [`LogSink`] renders each event as one record and writes it to the
//! terminal and, when one was supplied, a file. Every write is flushed before
//! the emit call returns. Destinations are handed in already open; this
//! module never opens or rotates files.

use async_trait::async_trait;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use tokio::sync::Mutex;

use crate::config::defaults::{BANNER_RULE_WIDTH, MAX_STACK_FRAMES};
use crate::config::OutputConfig;
use crate::events::{
    console_label, shows_stack_trace, ConsoleEvent, EventSink, ExceptionEvent, StackFrame,
};
use crate::format::{format_value, RemoteValue};

const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

const EXCEPTION_LABEL: &str = "EXCEPTION";

/// A writable destination handed to the sink
pub type Destination = Box<dyn Write + Send>;

struct Destinations {
    terminal: Option<Destination>,
    file: Option<Destination>,
}

/// Event sink that writes log records to the terminal and an optional file
pub struct LogSink {
    output: OutputConfig,
    destinations: Mutex<Destinations>,
}

impl LogSink {
    /// Sink writing to stdout and, if given, `file`.
    ///
    /// Without a file the terminal is always written, whatever
    /// `output.echo_terminal` says.
    pub fn new(output: OutputConfig, file: Option<Destination>) -> Self {
        let terminal: Option<Destination> = if output.echo_terminal || file.is_none() {
            Some(Box::new(io::stdout()))
        } else {
            None
        };
        Self::with_writers(output, terminal, file)
    }

    /// Sink over explicit destinations
    pub fn with_writers(
        output: OutputConfig,
        terminal: Option<Destination>,
        file: Option<Destination>,
    ) -> Self {
        Self {
            output,
            destinations: Mutex::new(Destinations { terminal, file }),
        }
    }

    /// Render a console event. `color` only affects formatted text.
    pub fn render_console(&self, event: &ConsoleEvent, color: bool) -> String {
        if !self.output.format_output {
            return raw_console_record(event);
        }

        let args: Vec<String> = event.args.iter().map(format_value).collect();
        let mut line = prefix(
            event.timestamp_ms,
            &console_label(&event.kind),
            color.then(|| console_color(&event.kind)).flatten(),
        );
        if !args.is_empty() {
            line.push(' ');
            line.push_str(&args.join(" "));
        }
        if shows_stack_trace(&event.kind) {
            push_stack_trace(&mut line, event.stack_trace.as_deref());
        }
        line
    }

    /// Render an exception event. `color` only affects formatted text.
    pub fn render_exception(&self, event: &ExceptionEvent, color: bool) -> String {
        if !self.output.format_output {
            return raw_exception_record(event);
        }

        let mut line = prefix(event.timestamp_ms, EXCEPTION_LABEL, color.then_some(RED));
        line.push(' ');
        line.push_str(&event.description);
        push_stack_trace(&mut line, event.stack_trace.as_deref());
        line
    }

    /// Write a rendered record to every destination, flushing each.
    /// The terminal gets the coloured form when colours are on.
    async fn write_record(&self, render: impl Fn(bool) -> String) -> Result<(), String> {
        let mut dests = self.destinations.lock().await;
        let mut failures = Vec::new();

        if let Some(terminal) = dests.terminal.as_mut() {
            if let Err(e) = write_line(terminal, &render(self.output.color)) {
                failures.push(format!("terminal: {e}"));
            }
        }
        if let Some(file) = dests.file.as_mut() {
            if let Err(e) = write_line(file, &render(false)) {
                failures.push(format!("file: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    /// Write banner lines to the file destination only
    async fn write_banner(&self, lines: &[String]) -> Result<(), String> {
        let mut dests = self.destinations.lock().await;
        let Some(file) = dests.file.as_mut() else {
            return Ok(());
        };
        for line in lines {
            write_line(file, line).map_err(|e| format!("file: {e}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for LogSink {
    async fn emit_console(&self, event: &ConsoleEvent) -> Result<(), String> {
        self.write_record(|color| self.render_console(event, color))
            .await
    }

    async fn emit_exception(&self, event: &ExceptionEvent) -> Result<(), String> {
        self.write_record(|color| self.render_exception(event, color))
            .await
    }

    async fn emit_session_started(&self, target: &str) -> Result<(), String> {
        self.write_banner(&[
            format!("# Console output for: {target}"),
            format!("# Started at: {}", Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)),
            "-".repeat(BANNER_RULE_WIDTH),
        ])
        .await
    }

    async fn emit_session_ended(&self) -> Result<(), String> {
        self.write_banner(&[
            "-".repeat(BANNER_RULE_WIDTH),
            format!("# Ended at: {}", Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)),
        ])
        .await
    }
}

fn write_line(dest: &mut Destination, text: &str) -> io::Result<()> {
    writeln!(dest, "{text}")?;
    dest.flush()
}

fn console_color(kind: &str) -> Option<&'static str> {
    match kind {
        "error" => Some(RED),
        "warning" => Some(YELLOW),
        "info" => Some(BLUE),
        "debug" => Some(GRAY),
        _ => None,
    }
}

/// `[HH:MM:SS.mmm] [LABEL]`, optionally wrapped in a colour
fn prefix(timestamp_ms: i64, label: &str, color: Option<&str>) -> String {
    let head = format!("[{}] [{label}]", format_clock(timestamp_ms));
    match color {
        Some(color) => format!("{color}{head}{RESET}"),
        None => head,
    }
}

fn push_stack_trace(line: &mut String, frames: Option<&[StackFrame]>) {
    let Some(frames) = frames.filter(|f| !f.is_empty()) else {
        return;
    };
    line.push_str("\n  Stack trace:");
    for frame in frames.iter().take(MAX_STACK_FRAMES) {
        line.push_str(&format!(
            "\n    at {} ({}:{}:{})",
            frame.display_name(),
            frame.url,
            frame.line,
            frame.col
        ));
    }
}

fn local_time(timestamp_ms: i64) -> Option<DateTime<Local>> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map(|t| t.with_timezone(&Local))
}

/// Local wall-clock time with millisecond precision
fn format_clock(timestamp_ms: i64) -> String {
    match local_time(timestamp_ms) {
        Some(t) => t.format("%H:%M:%S%.3f").to_string(),
        None => format_timestamp(timestamp_ms),
    }
}

/// UTC clock time computed directly, for timestamps chrono cannot represent
fn format_timestamp(millis: i64) -> String {
    let millis = millis.rem_euclid(86_400_000);
    let secs = millis / 1000;
    let mins = secs / 60;
    let hours = mins / 60;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        hours % 24,
        mins % 60,
        secs % 60,
        millis % 1000
    )
}

fn rfc3339(timestamp_ms: i64) -> String {
    local_time(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, false))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawConsoleRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    timestamp: String,
    args: Vec<Value>,
    stack_trace: Option<&'a [StackFrame]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawExceptionRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    timestamp: String,
    description: &'a str,
    stack_trace: Option<&'a [StackFrame]>,
}

fn raw_console_record(event: &ConsoleEvent) -> String {
    let record = RawConsoleRecord {
        kind: &event.kind,
        timestamp: rfc3339(event.timestamp_ms),
        args: event.args.iter().map(RemoteValue::to_json).collect(),
        stack_trace: event.stack_trace.as_deref(),
    };
    serde_json::to_string(&record).unwrap_or_default()
}

fn raw_exception_record(event: &ExceptionEvent) -> String {
    let record = RawExceptionRecord {
        kind: "exception",
        timestamp: rfc3339(event.timestamp_ms),
        description: &event.description,
        stack_trace: event.stack_trace.as_deref(),
    };
    serde_json::to_string(&record).unwrap_or_default()
}
