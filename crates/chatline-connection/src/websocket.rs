// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport on `tokio-tungstenite`.
//!
//! Each open spawns a reader task that forwards text frames into the link's
//! event channel and reports the close reason once the socket ends.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use chatline_core::{
    AdapterType, ChatlineError, Credentials, FrameWriter, HealthStatus, PluginAdapter, Transport,
    TransportEvent, TransportLink,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 256;

fn ws_err(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> ChatlineError {
    ChatlineError::Transport {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Opens WebSocket links, sending the bearer token as an `Authorization` header.
#[derive(Debug, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatlineError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<TransportLink, ChatlineError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| ws_err("invalid endpoint", e))?;
        if let Some(value) = credentials.authorization_header() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ws_err("invalid authorization header", e))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| ws_err("websocket handshake failed", e))?;
        debug!(endpoint, status = %response.status(), "websocket established");

        let (sink, stream) = socket.split();
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(read_loop(stream, tx));

        Ok(TransportLink {
            writer: Box::new(WebSocketWriter { sink }),
            events,
        })
    }
}

async fn read_loop(mut stream: SplitStream<Socket>, tx: mpsc::Sender<TransportEvent>) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if tx
                    .send(TransportEvent::Frame(text.as_str().to_owned()))
                    .await
                    .is_err()
                {
                    // Link dropped by the coordinator.
                    return;
                }
            }
            Some(Ok(WsMessage::Binary(bytes))) => {
                trace!(len = bytes.len(), "ignoring binary frame");
            }
            Some(Ok(WsMessage::Close(frame))) => {
                break frame
                    .map(|f| format!("closed by server: {} {}", f.code, f.reason))
                    .unwrap_or_else(|| "closed by server".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("read error: {e}"),
            None => break "stream ended".to_string(),
        }
    };
    let _ = tx.send(TransportEvent::Closed { reason }).await;
}

struct WebSocketWriter {
    sink: SplitSink<Socket, WsMessage>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn write(&mut self, frame: String) -> Result<(), ChatlineError> {
        self.sink
            .send(WsMessage::text(frame))
            .await
            .map_err(|e| ws_err("websocket write failed", e))
    }

    async fn close(&mut self) -> Result<(), ChatlineError> {
        self.sink
            .close()
            .await
            .map_err(|e| ws_err("websocket close failed", e))
    }
}
