//! WebSocket transport: one text message per frame

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{PeerClientResult, TransportError};
use crate::transport::{
    BoxedFrameSink, BoxedFrameStream, Connector, FrameSink, FrameStream, TransportCapabilities,
    TransportType,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for `ws://` and `wss://` endpoints
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: Url,
    user_agent: Option<String>,
}

impl WebSocketConnector {
    pub fn new(endpoint: &str, config: &ConnectionConfig) -> PeerClientResult<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::ConnectionFailed(format!("Invalid URL: {}", e)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::ConnectionFailed(format!(
                "Invalid scheme for WebSocket transport: {}",
                url.scheme()
            ))
            .into());
        }

        Ok(Self {
            endpoint: url,
            user_agent: config.user_agent.clone(),
        })
    }
}

struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::text(frame))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}

struct WebSocketFrames {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::WebSocket(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(bytes) => {
                    return Some(String::from_utf8(bytes.to_vec()).map_err(|e| {
                        TransportError::WebSocket(format!("binary frame is not UTF-8: {}", e))
                    }));
                }
                Message::Close(frame) => {
                    debug!(frame = ?frame, "WebSocket close received");
                    return None;
                }
                // Control frames are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            server_events: true,
            persistent: true,
            max_message_size: None,
        }
    }

    async fn connect(&self) -> Result<(BoxedFrameSink, BoxedFrameStream), TransportError> {
        debug!(endpoint = %self.endpoint, "Opening WebSocket");

        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        if let Some(agent) = &self.user_agent {
            let value = HeaderValue::from_str(agent)
                .map_err(|e| TransportError::ConnectionFailed(format!("Invalid user agent: {}", e)))?;
            request.headers_mut().insert("User-Agent", value);
        }

        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        info!(endpoint = %self.endpoint, status = %response.status(), "WebSocket connected");

        let (sink, stream) = socket.split();
        Ok((
            Box::new(WebSocketSink { inner: sink }),
            Box::new(WebSocketFrames { inner: stream }),
        ))
    }
}
