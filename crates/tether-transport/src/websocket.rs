//! WebSocket transport implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connector, Link, LinkId, TransportError};

/// Counter for generating unique link IDs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Connector`] that opens client WebSocket links.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Creates a connector that gives up on a handshake after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connector for WebSocketConnector {
    type Link = WebSocketLink;

    async fn connect(&self, url: &str) -> Result<Self::Link, TransportError> {
        let handshake = tokio_tungstenite::connect_async(url);
        let (ws, _response) =
            match tokio::time::timeout(self.connect_timeout, handshake).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(tungstenite::Error::Url(e))) => {
                    return Err(TransportError::InvalidEndpoint(e.to_string()));
                }
                Ok(Err(tungstenite::Error::HttpFormat(e))) => {
                    return Err(TransportError::InvalidEndpoint(e.to_string()));
                }
                Ok(Err(tungstenite::Error::Io(e))) => {
                    return Err(TransportError::ConnectFailed(e));
                }
                Ok(Err(e)) => {
                    return Err(TransportError::connect(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ));
                }
                Err(_) => {
                    return Err(TransportError::ConnectTimeout(
                        self.connect_timeout,
                    ));
                }
            };

        let id = LinkId::new(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, url, "opened WebSocket link");

        // Sink and stream live behind separate locks: a receive that is
        // parked waiting for the server must not block outgoing events.
        let (sink, stream) = ws.split();
        Ok(WebSocketLink {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single client WebSocket link.
pub struct WebSocketLink {
    id: LinkId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Link for WebSocketLink {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        // Event frames are JSON, so they go out as text frames.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> LinkId {
        self.id
    }
}
