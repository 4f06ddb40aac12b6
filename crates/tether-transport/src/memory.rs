//! In-process loopback transport.
//!
//! [`MemoryConnector::pair`] returns a connector and the [`MemoryServer`]
//! that receives every link it opens. Both ends of a link are
//! [`MemoryPeer`]s backed by unbounded channels, so nothing touches the
//! network. Closing one end with [`Link::close`] is observed by the other
//! end as a clean close (`recv() == Ok(None)`); dropping an end without
//! closing it is observed as a transport failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::{Connector, Link, LinkId, TransportError};

/// Counter for generating unique link IDs. Offset so memory and WebSocket
/// link IDs never collide in logs.
static NEXT_MEMORY_LINK_ID: AtomicU64 = AtomicU64::new(1 << 32);

enum Frame {
    Data(Vec<u8>),
    Close,
}

struct Shared {
    accepting: AtomicBool,
    attempts: AtomicU64,
    incoming: mpsc::UnboundedSender<MemoryPeer>,
}

/// Opens [`MemoryPeer`] links to the paired [`MemoryServer`].
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

/// The server side of an in-memory transport.
pub struct MemoryServer {
    shared: Arc<Shared>,
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryConnector {
    /// Creates a connected connector/server pair.
    pub fn pair() -> (MemoryConnector, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            accepting: AtomicBool::new(true),
            attempts: AtomicU64::new(0),
            incoming: tx,
        });
        (
            MemoryConnector {
                shared: Arc::clone(&shared),
            },
            MemoryServer {
                shared,
                incoming: rx,
            },
        )
    }
}

impl Connector for MemoryConnector {
    type Link = MemoryPeer;

    async fn connect(&self, url: &str) -> Result<Self::Link, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::Relaxed);

        if !self.shared.accepting.load(Ordering::Relaxed) {
            return Err(TransportError::connect(
                std::io::ErrorKind::ConnectionRefused,
                format!("{url} is not accepting links"),
            ));
        }

        let (client, server) = MemoryPeer::pair();
        self.shared.incoming.send(server).map_err(|_| {
            TransportError::connect(
                std::io::ErrorKind::NotConnected,
                "memory server dropped",
            )
        })?;
        tracing::debug!(id = %client.id, url, "opened memory link");
        Ok(client)
    }
}

impl MemoryServer {
    /// Waits for the next link opened by the paired connector.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }

    /// Returns the next already-opened link without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.try_recv().ok()
    }

    /// Makes subsequent connects succeed (`true`) or be refused (`false`).
    pub fn set_accepting(&self, accepting: bool) {
        self.shared.accepting.store(accepting, Ordering::Relaxed);
    }

    /// Total connect attempts seen so far, refused ones included.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::Relaxed)
    }
}

/// One end of an in-memory link.
pub struct MemoryPeer {
    id: LinkId,
    closed: AtomicBool,
    tx: mpsc::UnboundedSender<Frame>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryPeer {
    fn pair() -> (MemoryPeer, MemoryPeer) {
        let id = LinkId::new(NEXT_MEMORY_LINK_ID.fetch_add(1, Ordering::Relaxed));
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            MemoryPeer {
                id,
                closed: AtomicBool::new(false),
                tx: a_tx,
                rx: Mutex::new(b_rx),
            },
            MemoryPeer {
                id,
                closed: AtomicBool::new(false),
                tx: b_tx,
                rx: Mutex::new(a_rx),
            },
        )
    }
}

impl Link for MemoryPeer {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::LinkClosed("closed locally".into()));
        }
        self.tx.send(Frame::Data(data.to_vec())).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer dropped",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.lock().await.recv().await {
            Some(Frame::Data(data)) => Ok(Some(data)),
            Some(Frame::Close) => Ok(None),
            None => Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer dropped without closing",
            ))),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        // The peer may already be gone; closing is still complete locally.
        let _ = self.tx.send(Frame::Close);
        Ok(())
    }

    fn id(&self) -> LinkId {
        self.id
    }
}
