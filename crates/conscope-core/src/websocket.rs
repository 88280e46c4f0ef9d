//! WebSocket transport to a browser's DevTools endpoint

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::transport::{validate_endpoint, Inbound, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a DevTools WebSocket
pub struct WebSocketTransport {
    url: String,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
}

/// Read half of a DevTools WebSocket
pub struct WebSocketInbound {
    reader: SplitStream<WsStream>,
}

/// Open a WebSocket to `url` and split it into its two halves
pub async fn connect(
    url: &str,
) -> Result<(WebSocketTransport, WebSocketInbound), TransportError> {
    validate_endpoint(url)?;
    info!(url, "connecting to DevTools endpoint");

    let (ws_stream, _response) =
        connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

    let (writer, reader) = ws_stream.split();
    info!(url, "DevTools connection established");

    Ok((
        WebSocketTransport {
            url: url.to_string(),
            writer: Mutex::new(Some(writer)),
        },
        WebSocketInbound { reader },
    ))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&self) {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };
        if let Err(e) = writer.send(Message::Close(None)).await {
            debug!(url = %self.url, error = %e, "close frame not delivered");
        }
        let _ = writer.close().await;
        debug!(url = %self.url, "WebSocket writer closed");
    }
}

#[async_trait]
impl Inbound for WebSocketInbound {
    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let frame = match self.reader.next().await? {
                Ok(frame) => frame,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(TransportError::WebSocket(e.to_string()))),
            };

            match frame {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("skipping non-UTF-8 binary frame"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }
                _ => continue,
            }
        }
    }
}
