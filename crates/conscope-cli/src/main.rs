//! Conscope CLI
//!
//! Command-line interface for capturing a page's developer console.
//! Connects to a DevTools page endpoint and streams console calls and
//! uncaught exceptions to the terminal and, optionally, a log file.

use clap::Parser;
use conscope_core::{validate_endpoint, CaptureConfig, OutputConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod capture;

use capture::CaptureOptions;

/// Conscope - capture a browser page's console output
///
/// Point it at a page's DevTools WebSocket URL, as listed by
/// `http://localhost:9222/json`.
#[derive(Parser, Debug)]
#[command(name = "conscope")]
#[command(version, about, long_about = None)]
struct Args {
    /// DevTools WebSocket URL of the page
    #[arg(env = "CONSCOPE_WS_URL")]
    ws_url: String,

    /// Also write records to this file (created or truncated)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not write records to the terminal
    #[arg(long, requires = "output")]
    no_echo: bool,

    /// Console types to record (default: all)
    #[arg(short, long, value_delimiter = ',')]
    types: Vec<String>,

    /// Write one JSON object per record instead of formatted text
    #[arg(long)]
    raw: bool,

    /// Disable ANSI colours on the terminal
    #[arg(long)]
    no_color: bool,

    /// Deadline for each protocol call, in milliseconds
    #[arg(long, default_value_t = conscope_core::config::defaults::DEFAULT_CALL_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Expression to evaluate once capture is enabled (repeatable)
    #[arg(short, long = "eval", value_name = "EXPR")]
    eval: Vec<String>,

    /// Page URL shown in the output file banner
    #[arg(long)]
    url: Option<String>,
}

impl Args {
    fn into_options(self) -> CaptureOptions {
        let output = OutputConfig {
            format_output: !self.raw,
            color: !self.no_color,
            echo_terminal: !self.no_echo,
        };
        let config = CaptureConfig::new()
            .with_console_types(self.types)
            .with_call_timeout(Duration::from_millis(self.timeout_ms))
            .with_output(output);

        CaptureOptions {
            ws_url: self.ws_url,
            page_url: self.url,
            output_path: self.output,
            evals: self.eval,
            config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout carries the captured records
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = validate_endpoint(&args.ws_url) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match capture::run_capture(args.into_options()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "ws://127.0.0.1:9222/devtools/page/ABC";

    #[test]
    fn test_defaults() {
        let options = Args::try_parse_from(["conscope", PAGE]).unwrap().into_options();

        assert_eq!(options.ws_url, PAGE);
        assert!(options.output_path.is_none());
        assert!(options.evals.is_empty());
        assert_eq!(options.config.call_timeout(), Duration::from_millis(5000));
        assert!(options.config.output.format_output);
        assert!(options.config.output.color);
        assert!(options.config.output.echo_terminal);
        assert!(options.config.console_types.is_empty());
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "conscope",
            PAGE,
            "-o",
            "console.log",
            "--no-echo",
            "-t",
            "error,warning",
            "--raw",
            "--no-color",
            "--timeout-ms",
            "250",
            "-e",
            "document.title",
            "--eval",
            "1 + 1",
            "--url",
            "https://example.com",
        ])
        .unwrap();
        let options = args.into_options();

        assert_eq!(options.output_path, Some(PathBuf::from("console.log")));
        assert_eq!(options.config.console_types, vec!["error", "warning"]);
        assert_eq!(options.config.call_timeout(), Duration::from_millis(250));
        assert!(!options.config.output.format_output);
        assert!(!options.config.output.color);
        assert!(!options.config.output.echo_terminal);
        assert_eq!(options.evals, vec!["document.title", "1 + 1"]);
        assert_eq!(options.page_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_no_echo_requires_output() {
        assert!(Args::try_parse_from(["conscope", PAGE, "--no-echo"]).is_err());
    }
}
