//! TCP transport: newline-delimited frames

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info};
use url::Url;

use crate::error::{PeerClientResult, TransportError};
use crate::transport::{
    BoxedFrameSink, BoxedFrameStream, Connector, FrameSink, FrameStream, TransportCapabilities,
    TransportType,
};

/// Upper bound on a single line, protects against a peer that never sends a newline
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Connector for `tcp://host:port` endpoints
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: Url,
    address: String,
}

impl TcpConnector {
    pub fn new(endpoint: &str) -> PeerClientResult<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::ConnectionFailed(format!("Invalid URL: {}", e)))?;

        if url.scheme() != "tcp" {
            return Err(TransportError::ConnectionFailed(format!(
                "Invalid scheme for TCP transport: {}",
                url.scheme()
            ))
            .into());
        }

        let host = url
            .host_str()
            .ok_or_else(|| TransportError::ConnectionFailed("TCP endpoint has no host".to_string()))?;
        let port = url
            .port()
            .ok_or_else(|| TransportError::ConnectionFailed("TCP endpoint has no port".to_string()))?;

        Ok(Self {
            address: format!("{}:{}", host, port),
            endpoint: url,
        })
    }
}

struct TcpSink {
    inner: SplitSink<Framed<TcpStream, LinesCodec>, String>,
}

#[async_trait]
impl FrameSink for TcpSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.inner
            .send(frame)
            .await
            .map_err(|e| TransportError::Tcp(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Tcp(e.to_string()))
    }
}

struct TcpFrames {
    inner: SplitStream<Framed<TcpStream, LinesCodec>>,
}

#[async_trait]
impl FrameStream for TcpFrames {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await? {
                // Blank keep-alive lines carry no frame
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(Ok(line)),
                Err(e) => return Some(Err(TransportError::Tcp(e.to_string()))),
            }
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            server_events: true,
            persistent: true,
            max_message_size: Some(MAX_FRAME_LENGTH),
        }
    }

    async fn connect(&self) -> Result<(BoxedFrameSink, BoxedFrameStream), TransportError> {
        debug!(address = %self.address, "Opening TCP connection");
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", self.address, e)))?;
        stream.set_nodelay(true)?;
        info!(address = %self.address, "TCP connected");

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
        let (sink, frames) = framed.split();
        Ok((
            Box::new(TcpSink { inner: sink }),
            Box::new(TcpFrames { inner: frames }),
        ))
    }
}
