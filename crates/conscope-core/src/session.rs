//! DevTools session over one message channel
//!
//! A [`Session`] owns the write half of a channel and a single receive loop
//! that reads the other half. Calls get increasing integer ids and wait on a
//! one-shot slot in the pending table until the loop delivers the matching
//! response, the deadline passes, or the session closes. Events are handed to
//! the [`EventRouter`] in arrival order.
//!
//! The pending table, the id counter and the closed flag sit behind one lock.
//! Whoever removes a pending entry decides that call's outcome, so a response
//! racing a timeout or a close resolves the call exactly once.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError};
use crate::events::ExceptionEvent;
use crate::format::{format_value, RemoteValue};
use crate::protocol::{InboundMessage, OutboundCall};
use crate::router::EventRouter;
use crate::transport::{Inbound, Transport};

type Resolver = oneshot::Sender<Result<Value>>;

/// How the receive loop ended: `Ok` for a local close or a clean remote
/// close, `Err` when the channel failed
type LoopExit = std::result::Result<(), SessionError>;

struct CallTable {
    next_id: u64,
    pending: HashMap<u64, Resolver>,
    closed: bool,
}

impl CallTable {
    fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
            closed: false,
        }
    }

    /// Fail every pending call with `Cancelled`, returning how many there were
    fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, resolver) in self.pending.drain() {
            let _ = resolver.send(Err(SessionError::Cancelled));
        }
        count
    }
}

/// State shared between the session handle and its receive loop
struct Shared {
    calls: Mutex<CallTable>,
    router: EventRouter,
}

impl Shared {
    async fn take_pending(&self, id: u64) -> Option<Resolver> {
        self.calls.lock().await.pending.remove(&id)
    }

    async fn handle_text(&self, text: &str) {
        match InboundMessage::parse(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => warn!(error = %e, "dropping malformed message"),
        }
    }

    async fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::Response { id, outcome } => {
                let Some(resolver) = self.take_pending(id).await else {
                    debug!(id, "dropping response with no pending call");
                    return;
                };
                let result = outcome.map_err(|e| SessionError::protocol(e.to_string()));
                if resolver.send(result).is_err() {
                    debug!(id, "caller went away before its response arrived");
                }
            }
            InboundMessage::Event { method, params } => {
                let routed = self.router.route(&method, &params).await;
                debug!(method = %method, ?routed, "event routed");
            }
        }
    }
}

/// A live DevTools session
pub struct Session {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    shutdown: watch::Sender<bool>,
    ended: watch::Receiver<Option<LoopExit>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Start a session over an open channel and spawn its receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T, I>(transport: T, inbound: I, router: EventRouter) -> Self
    where
        T: Transport + 'static,
        I: Inbound + 'static,
    {
        let shared = Arc::new(Shared {
            calls: Mutex::new(CallTable::new()),
            router,
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (ended_tx, ended) = watch::channel(None);

        let reader = tokio::spawn(receive_loop(
            shared.clone(),
            Box::new(inbound),
            shutdown_rx,
            ended_tx,
        ));

        Self {
            shared,
            transport: Arc::new(transport),
            shutdown,
            ended,
            reader: Mutex::new(Some(reader)),
        }
    }

    /// The router events are delivered to
    pub fn router(&self) -> &EventRouter {
        &self.shared.router
    }

    /// Send `method` with `params` and wait up to `timeout` for its response.
    ///
    /// Resolves exactly once: with the result object, or with a
    /// `Connection`, `Timeout`, `Protocol` or `Cancelled` error.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let (resolver, mut rx) = oneshot::channel();
        let id = {
            let mut calls = self.shared.calls.lock().await;
            if calls.closed {
                return Err(SessionError::Cancelled);
            }
            let id = calls.next_id;
            calls.next_id += 1;
            calls.pending.insert(id, resolver);
            id
        };

        let call = OutboundCall {
            id,
            method: method.to_string(),
            params,
        };
        let sent = match call.to_wire() {
            Ok(text) => self.transport.send(text).await.map_err(SessionError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            if self.shared.take_pending(id).await.is_some() {
                warn!(id, method, error = %e, "call could not be sent");
                return Err(e);
            }
            return rx.await.unwrap_or(Err(SessionError::Cancelled));
        }
        debug!(id, method, "call sent");

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(outcome) => outcome.unwrap_or(Err(SessionError::Cancelled)),
            Err(_) => {
                if self.shared.take_pending(id).await.is_some() {
                    debug!(id, method, ?timeout, "call timed out");
                    return Err(SessionError::Timeout {
                        method: method.to_string(),
                        duration: timeout,
                    });
                }
                // Resolved between the deadline and the removal
                rx.await.unwrap_or(Err(SessionError::Cancelled))
            }
        }
    }

    /// Enable the runtime and console domains so the browser starts sending
    /// console and exception events
    pub async fn enable_console(&self, timeout: Duration) -> Result<()> {
        self.call("Runtime.enable", json!({}), timeout).await?;
        match self.call("Console.enable", json!({}), timeout).await {
            Ok(_) => {}
            Err(e @ SessionError::Protocol { .. }) => {
                warn!(error = %e, "console domain unavailable, relying on runtime events");
            }
            Err(e) => return Err(e),
        }
        info!("console capture enabled");
        Ok(())
    }

    /// Evaluate `expression` in the page and render the result the way
    /// console arguments are rendered
    pub async fn evaluate(&self, expression: &str, timeout: Duration) -> Result<String> {
        let params = json!({
            "expression": expression,
            "generatePreview": true,
        });
        let response = self.call("Runtime.evaluate", params, timeout).await?;

        if let Some(details) = response.get("exceptionDetails") {
            let thrown = ExceptionEvent::from_params(&json!({ "exceptionDetails": details }))?;
            return Err(SessionError::protocol(format!(
                "evaluation threw: {}",
                thrown.description
            )));
        }

        let value = response.get("result").unwrap_or(&Value::Null);
        Ok(format_value(&RemoteValue::from_wire(value)))
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.calls.lock().await.closed
    }

    /// Close the session: cancel pending calls, stop the receive loop and
    /// close the channel. Safe to call more than once.
    pub async fn close(&self) {
        let cancelled = {
            let mut calls = self.shared.calls.lock().await;
            calls.closed = true;
            calls.cancel_all()
        };
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending calls on close");
        }

        let _ = self.shutdown.send(true);
        let reader = self.reader.lock().await.take();
        if let Some(handle) = reader {
            if let Err(e) = handle.await {
                error!(error = %e, "receive loop panicked");
            }
            self.transport.close().await;
            info!("session closed");
        }
    }

    /// Wait until the receive loop has stopped.
    ///
    /// Returns the channel failure that stopped it, if there was one.
    pub async fn wait_closed(&self) -> LoopExit {
        let mut ended = self.ended.clone();
        let exit = match ended.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone().unwrap_or(Ok(())),
            Err(_) => Err(SessionError::Connection {
                detail: "receive loop stopped unexpectedly".to_string(),
            }),
        };
        exit
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    mut inbound: Box<dyn Inbound>,
    mut shutdown: watch::Receiver<bool>,
    ended: watch::Sender<Option<LoopExit>>,
) {
    let exit = loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break Ok(()),
            next = inbound.next_message() => match next {
                Some(Ok(text)) => shared.handle_text(&text).await,
                Some(Err(e)) => {
                    // The owner reports the failure through wait_closed
                    debug!(error = %e, "channel failed");
                    break Err(SessionError::from(e));
                }
                None => {
                    info!("channel closed by the browser");
                    break Ok(());
                }
            },
        }
    };

    let cancelled = {
        let mut calls = shared.calls.lock().await;
        calls.closed = true;
        calls.cancel_all()
    };
    if cancelled > 0 {
        debug!(cancelled, "cancelled pending calls after the channel ended");
    }
    let _ = ended.send(Some(exit));
}
