//! In-process transport
//!
//! [`MemoryConnector::pair`] returns a connector and the [`MemoryListener`] that accepts
//! one [`MemoryPeer`] per `connect()`. Dropping the peer closes the connection from the
//! remote side.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{
    BoxedFrameSink, BoxedFrameStream, Connector, FrameSink, FrameStream, TransportCapabilities,
    TransportType,
};

/// Connector for an in-process peer
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    endpoint: String,
    acceptor: mpsc::UnboundedSender<MemoryPeer>,
}

/// Accepting side of a memory endpoint
#[derive(Debug)]
pub struct MemoryListener {
    endpoint: String,
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Remote end of one memory connection
#[derive(Debug)]
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

impl MemoryConnector {
    /// Create a connected connector/listener pair for `endpoint` (e.g. `memory://fixture`)
    pub fn pair(endpoint: impl Into<String>) -> (MemoryConnector, MemoryListener) {
        let endpoint = endpoint.into();
        let (acceptor, incoming) = mpsc::unbounded_channel();
        (
            MemoryConnector {
                endpoint: endpoint.clone(),
                acceptor,
            },
            MemoryListener { endpoint, incoming },
        )
    }
}

impl MemoryListener {
    /// Wait for the next connection. `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        let peer = self.incoming.recv().await;
        if peer.is_some() {
            debug!(endpoint = %self.endpoint, "Accepted memory connection");
        }
        peer
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MemoryPeer {
    /// Next frame written by the client. `None` once the client closed its side.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Deliver a frame to the client
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.to_client.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Split into independently owned halves
    pub fn into_split(self) -> (MemoryPeerReader, MemoryPeerWriter) {
        (
            MemoryPeerReader {
                from_client: self.from_client,
            },
            MemoryPeerWriter {
                to_client: self.to_client,
            },
        )
    }
}

/// Read half of a [`MemoryPeer`]
#[derive(Debug)]
pub struct MemoryPeerReader {
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeerReader {
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }
}

/// Write half of a [`MemoryPeer`]; cloneable so several tasks can answer
#[derive(Debug, Clone)]
pub struct MemoryPeerWriter {
    to_client: mpsc::UnboundedSender<String>,
}

impl MemoryPeerWriter {
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.to_client.send(frame).map_err(|_| TransportError::Closed)
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| TransportError::Send("memory peer is gone".to_string())),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            server_events: true,
            persistent: true,
            max_message_size: None,
        }
    }

    async fn connect(&self) -> Result<(BoxedFrameSink, BoxedFrameStream), TransportError> {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();

        self.acceptor
            .send(MemoryPeer {
                from_client,
                to_client,
            })
            .map_err(|_| {
                TransportError::ConnectionFailed(format!("no listener for {}", self.endpoint))
            })?;

        Ok((
            Box::new(MemorySink { tx: Some(to_peer) }),
            Box::new(MemoryStream { rx: from_peer }),
        ))
    }
}
