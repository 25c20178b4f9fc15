//! HTTP transport
//!
//! Every outbound frame is POSTed to the endpoint. A non-empty response body (one frame,
//! an array of frames, or several concatenated frames) is fed back into the inbound
//! stream, so responses and any peer traffic piggy-backed on them flow through the same
//! read loop as on the persistent transports. An HTTP failure ends the logical connection.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Deserializer, Value};
use tokio::sync::mpsc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, warn};
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{PeerClientResult, TransportError};
use crate::transport::{
    BoxedFrameSink, BoxedFrameStream, Connector, FrameSink, FrameStream, TransportCapabilities,
    TransportType,
};

type Inbound = mpsc::UnboundedSender<Result<String, TransportError>>;

/// Connector for `http://` and `https://` endpoints
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    endpoint: Url,
}

impl HttpConnector {
    pub fn new(endpoint: &str, config: &ConnectionConfig) -> PeerClientResult<Self> {
        let url = parse_endpoint(endpoint)?;

        let mut headers = HeaderMap::new();
        if let Some(extra) = &config.headers {
            for (name, value) in extra {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| TransportError::Http(format!("Invalid header name '{}': {}", name, e)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| TransportError::Http(format!("Invalid header value: {}", e)))?;
                headers.insert(name, value);
            }
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: url,
        })
    }

    /// Create HTTP connector with custom client
    pub fn with_client(endpoint: &str, client: Client) -> PeerClientResult<Self> {
        let url = parse_endpoint(endpoint)?;
        Ok(Self {
            client,
            endpoint: url,
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, TransportError> {
    let url = Url::parse(endpoint)
        .map_err(|e| TransportError::ConnectionFailed(format!("Invalid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::ConnectionFailed(format!(
            "Invalid scheme for HTTP transport: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Split a response body into frames. Whatever follows the last valid JSON value is
/// passed on as one more frame, so the read loop drops and counts it like any other
/// malformed frame.
fn split_frames(body: &[u8]) -> Vec<String> {
    let mut frames = Vec::new();
    let mut values = Deserializer::from_slice(body).into_iter::<Value>();
    loop {
        let offset = values.byte_offset();
        match values.next() {
            Some(Ok(Value::Array(batch))) => frames.extend(batch.into_iter().map(|v| v.to_string())),
            Some(Ok(single)) => frames.push(single.to_string()),
            Some(Err(e)) => {
                debug!(error = %e, offset, "Response body is not JSON past this point");
                let rest = String::from_utf8_lossy(&body[offset..]);
                let rest = rest.trim();
                if !rest.is_empty() {
                    frames.push(rest.to_string());
                }
                break;
            }
            None => break,
        }
    }
    frames
}

async fn post_frame(client: Client, endpoint: Url, frame: String, inbound: Inbound) {
    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .body(frame)
        .send()
        .await;

    let result = match response {
        Ok(response) if response.status().is_success() => response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(format!("Failed to read response body: {}", e))),
        Ok(response) => {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(TransportError::Http(format!("HTTP error {}: {}", status, text)))
        }
        Err(e) => Err(TransportError::Http(format!("Failed to send request: {}", e))),
    };

    match result {
        Ok(body) => {
            for frame in split_frames(&body) {
                if inbound.send(Ok(frame)).is_err() {
                    debug!("Inbound stream closed, dropping HTTP response frame");
                    return;
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "HTTP exchange failed");
            let _ = inbound.send(Err(e));
        }
    }
}

struct HttpSink {
    client: Client,
    endpoint: Url,
    inbound: Option<Inbound>,
}

#[async_trait]
impl FrameSink for HttpSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let Some(inbound) = &self.inbound else {
            return Err(TransportError::Closed);
        };
        // Each exchange runs on its own task so concurrent calls are not serialized
        // behind one round trip
        tokio::spawn(
            post_frame(self.client.clone(), self.endpoint.clone(), frame, inbound.clone())
                .with_current_subscriber(),
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inbound = None;
        Ok(())
    }
}

struct HttpFrames {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

#[async_trait]
impl FrameStream for HttpFrames {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            server_events: false,
            persistent: false,
            max_message_size: None,
        }
    }

    async fn connect(&self) -> Result<(BoxedFrameSink, BoxedFrameStream), TransportError> {
        // Connectionless: nothing is opened until the first frame is posted
        debug!(endpoint = %self.endpoint, "HTTP transport ready");
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            Box::new(HttpSink {
                client: self.client.clone(),
                endpoint: self.endpoint.clone(),
                inbound: Some(tx),
            }),
            Box::new(HttpFrames { rx }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_http_connector_creation() {
        let connector = HttpConnector::new("http://localhost:8080/rpc", &ConnectionConfig::default()).unwrap();
        assert_eq!(connector.transport_type(), TransportType::Http);
        assert!(!connector.capabilities().persistent);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = HttpConnector::new("ws://localhost:8080/rpc", &ConnectionConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_client_checks_scheme() {
        let connector = HttpConnector::with_client("https://example.com/rpc", Client::new()).unwrap();
        assert_eq!(connector.endpoint(), "https://example.com/rpc");

        let result = HttpConnector::with_client("tcp://localhost:9000", Client::new());
        assert!(matches!(
            result,
            Err(crate::error::PeerClientError::Transport(TransportError::ConnectionFailed(_)))
        ));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let config = ConnectionConfig {
            headers: Some(HashMap::from([("bad header".to_string(), "x".to_string())])),
            ..Default::default()
        };
        assert!(HttpConnector::new("http://localhost:8080/rpc", &config).is_err());
    }

    #[test]
    fn test_split_frames() {
        assert!(split_frames(b"").is_empty());
        assert!(split_frames(b"  \n").is_empty());

        let single = split_frames(br#"{"jsonrpc":"2.0","id":"a","result":{}}"#);
        assert_eq!(single.len(), 1);

        let batch = split_frames(br#"[{"jsonrpc":"2.0","method":"x"},{"jsonrpc":"2.0","id":1,"result":1}]"#);
        assert_eq!(batch.len(), 2);

        let concatenated = split_frames(b"{\"a\":1}\n{\"b\":2}");
        assert_eq!(concatenated, vec![r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()]);

        let garbage = split_frames(b"<html>oops</html>");
        assert_eq!(garbage, vec!["<html>oops</html>".to_string()]);
    }

    #[test]
    fn test_split_frames_keeps_frames_before_garbage() {
        let body = b"{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"result\":{}}\n[{\"jsonrpc\":\"2.0\",\"method\":\"x\"}]\n<html>oops</html>";
        let frames = split_frames(body);
        assert_eq!(frames.len(), 3);
        let response: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(response, serde_json::json!({"jsonrpc": "2.0", "id": "a", "result": {}}));
        let notification: Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(notification["method"], "x");
        assert_eq!(frames[2], "<html>oops</html>");
    }

    #[tokio::test]
    async fn test_closed_sink_rejects_frames() {
        let connector = HttpConnector::new("http://localhost:8080/rpc", &ConnectionConfig::default()).unwrap();
        let (mut sink, _frames) = connector.connect().await.unwrap();
        sink.close().await.unwrap();
        assert!(matches!(
            sink.send("{}".to_string()).await,
            Err(TransportError::Closed)
        ));
    }
}
