//! Capture run: connect, enable console events, stream until stopped

use conscope_core::sink::Destination;
use conscope_core::{websocket, CaptureConfig, EventRouter, EventSink, LogSink, Session};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything one capture run needs
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub ws_url: String,
    /// Page URL written to the file banner; defaults to the endpoint
    pub page_url: Option<String>,
    pub output_path: Option<PathBuf>,
    pub evals: Vec<String>,
    pub config: CaptureConfig,
}

impl CaptureOptions {
    fn banner_target(&self) -> &str {
        self.page_url.as_deref().unwrap_or(&self.ws_url)
    }
}

/// Create (or truncate) the output file
pub fn open_output(path: &Path) -> Result<Destination, String> {
    let file = File::create(path)
        .map_err(|e| format!("Cannot open output file {}: {e}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Run one capture until Ctrl-C or until the browser goes away.
///
/// Returns an error when the channel could not be opened, capture could not
/// be enabled, or the channel ended with a failure.
pub async fn run_capture(options: CaptureOptions) -> Result<(), String> {
    let file = options.output_path.as_deref().map(open_output).transpose()?;
    let sink: Arc<dyn EventSink> = Arc::new(LogSink::new(options.config.output.clone(), file));

    let (transport, inbound) = websocket::connect(&options.ws_url)
        .await
        .map_err(|e| e.to_string())?;

    let router = EventRouter::from_config(&options.config, sink.clone());
    let session = Session::start(transport, inbound, router);

    if let Err(e) = sink.emit_session_started(options.banner_target()).await {
        tracing::warn!("Failed to write banner: {}", e);
    }

    let outcome = capture(&session, &options).await;

    session.close().await;
    if let Err(e) = sink.emit_session_ended().await {
        tracing::warn!("Failed to write footer: {}", e);
    }
    outcome
}

async fn capture(session: &Session, options: &CaptureOptions) -> Result<(), String> {
    let timeout = options.config.call_timeout();
    session
        .enable_console(timeout)
        .await
        .map_err(|e| format!("Failed to enable console capture: {e}"))?;

    for expression in &options.evals {
        match session.evaluate(expression, timeout).await {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => tracing::error!(expression = %expression, "Evaluation failed: {}", e),
        }
    }

    tracing::info!("Capturing console output, press Ctrl-C to stop");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Stopping capture");
            Ok(())
        }
        ended = session.wait_closed() => ended.map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_output_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut dest = open_output(&path).unwrap();
        writeln!(dest, "fresh").unwrap();
        dest.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_open_output_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("console.log");

        let err = open_output(&path).err().unwrap();
        assert!(err.contains("Cannot open output file"));
    }

    #[test]
    fn test_banner_target_prefers_page_url() {
        let mut options = CaptureOptions {
            ws_url: "ws://127.0.0.1:9222/devtools/page/ABC".to_string(),
            page_url: None,
            output_path: None,
            evals: Vec::new(),
            config: CaptureConfig::new(),
        };
        assert_eq!(options.banner_target(), "ws://127.0.0.1:9222/devtools/page/ABC");

        options.page_url = Some("https://example.com".to_string());
        assert_eq!(options.banner_target(), "https://example.com");
    }
}
