//! Routing of protocol events to the event sink
//!
//! Console API calls and uncaught exceptions are turned into typed events;
//! every other method is ignored. Nothing here returns an error: malformed
//! payloads and sink failures are logged and dropped so the receive loop
//! keeps running.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CaptureConfig;
use crate::events::{ConsoleEvent, EventSink, ExceptionEvent};
use crate::protocol::{CONSOLE_API_CALLED, EXCEPTION_THROWN};

/// What happened to a routed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Console,
    Exception,
    /// Console type outside the allow-set
    Filtered,
    /// Method this router does not handle
    Ignored,
    /// Payload could not be decoded
    Malformed,
}

pub struct EventRouter {
    allowed: HashSet<String>,
    sink: Arc<dyn EventSink>,
}

impl EventRouter {
    pub fn new(sink: Arc<dyn EventSink>, allowed: HashSet<String>) -> Self {
        Self { allowed, sink }
    }

    pub fn from_config(config: &CaptureConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::new(sink, config.console_filter())
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Route one event
    pub async fn route(&self, method: &str, params: &Value) -> Routed {
        match method {
            CONSOLE_API_CALLED => self.route_console(params).await,
            EXCEPTION_THROWN => self.route_exception(params).await,
            _ => {
                debug!(method, "ignoring event");
                Routed::Ignored
            }
        }
    }

    async fn route_console(&self, params: &Value) -> Routed {
        let event = match ConsoleEvent::from_params(params) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "malformed console event");
                return Routed::Malformed;
            }
        };

        if !self.allowed.contains(&event.kind) {
            return Routed::Filtered;
        }

        if let Err(e) = self.sink.emit_console(&event).await {
            warn!(kind = %event.kind, error = %e, "failed to emit console event");
        }
        Routed::Console
    }

    async fn route_exception(&self, params: &Value) -> Routed {
        let event = match ExceptionEvent::from_params(params) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "malformed exception event");
                return Routed::Malformed;
            }
        };

        if let Err(e) = self.sink.emit_exception(&event).await {
            warn!(error = %e, "failed to emit exception event");
        }
        Routed::Exception
    }
}
