//! Conscope Core Library
//!
//! Core types for capturing browser console output over the Chrome
//! DevTools Protocol. The crate knows nothing about argument parsing or
//! process setup; the `conscope` binary wires it to a terminal.
//!
//! # Modules
//!
//! - [`transport`] - Channel traits, endpoint validation and an in-process channel
//! - [`websocket`] - WebSocket channel (feature `websocket`)
//! - [`protocol`] - Wire message types and classification
//! - [`session`] - Call/response correlation and the receive loop
//! - [`router`] - Event routing and console type filtering
//! - [`format`] - Rendering of remote values and previews
//! - [`events`] - Console and exception events, and the sink trait
//! - [`sink`] - Terminal and file log sink
//! - [`config`] - Capture configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod protocol;
pub mod router;
pub mod session;
pub mod sink;
pub mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{CaptureConfig, OutputConfig};
pub use error::{Result, SessionError};
pub use events::{ConsoleEvent, EventSink, ExceptionEvent, NoOpEventSink};
pub use format::{format_value, RemoteValue};
pub use router::{EventRouter, Routed};
pub use session::Session;
pub use sink::LogSink;
pub use transport::{validate_endpoint, Inbound, Transport, TransportError};
