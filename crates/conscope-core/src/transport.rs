//! Transport types for the DevTools channel
//!
//! A transport is one duplex text-message channel. The write half
//! ([`Transport`]) is shared by every caller of the session; the read half
//! ([`Inbound`]) is owned by the single receive loop.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Reject endpoints that cannot be a DevTools WebSocket, such as the
/// `http://host:9222/json` listing URL
pub fn validate_endpoint(url: &str) -> Result<(), TransportError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(TransportError::InvalidConfig(format!(
            "expected a ws:// or wss:// endpoint, got '{url}'"
        )))
    }
}

/// Errors that can occur with transports
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel is closed")]
    Closed,

    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Write half of a channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one message
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the channel. Safe to call more than once.
    async fn close(&self);
}

/// Read half of a channel: a finite sequence of inbound text messages
#[async_trait]
pub trait Inbound: Send {
    /// Next message, or `None` once the channel has closed
    async fn next_message(&mut self) -> Option<Result<String, TransportError>>;
}

/// Write half of an in-process channel
pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
}

/// Read half of an in-process channel
pub struct MemoryInbound {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

/// The far end of an in-process channel, playing the browser's role
pub struct MemoryPeer {
    inbound_tx: mpsc::UnboundedSender<Result<String, TransportError>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Create a connected in-process channel
pub fn memory_channel() -> (MemoryTransport, MemoryInbound, MemoryPeer) {
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            outbound,
            closed: AtomicBool::new(false),
        },
        MemoryInbound { rx },
        MemoryPeer {
            inbound_tx,
            outbound_rx,
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MemoryTransport {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Inbound for MemoryInbound {
    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await
    }
}

impl MemoryPeer {
    /// Deliver a message to the session side
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound_tx.send(Ok(text.into())).is_ok()
    }

    /// Deliver a read failure to the session side
    pub fn fail(&self, err: TransportError) -> bool {
        self.inbound_tx.send(Err(err)).is_ok()
    }

    /// Next message the session wrote
    pub async fn recv_sent(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Drop the peer, ending the inbound sequence
    pub fn hang_up(self) {}
}
