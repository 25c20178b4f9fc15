//! End-to-end sessions over real sockets

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::{Framed, LinesCodec};

use turul_peer_client::{ConnectionState, PeerClient, PeerClientError, TransportError, TransportType};
use turul_peer_fixture::{README_URI, TestFixtures, serve};
use turul_peer_json_rpc::{JsonRpcMessage, JsonRpcResponse};
use turul_peer_protocol::PROTOCOL_VERSION;

/// Answer one inbound frame, if it is a request
fn answer(frame: &str) -> Option<String> {
    let JsonRpcMessage::Request(request) = JsonRpcMessage::decode(frame).ok()? else {
        return None;
    };
    let response = match serve(&request, PROTOCOL_VERSION, &TestFixtures::full_capabilities()) {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(error) => JsonRpcResponse::error(request.id, error),
    };
    JsonRpcMessage::Response(response).encode().ok()
}

/// Newline-delimited JSON peer on an ephemeral port
async fn spawn_tcp_peer() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut lines = Framed::new(stream, LinesCodec::new());
                while let Some(Ok(line)) = lines.next().await {
                    if let Some(reply) = answer(&line)
                        && lines.send(reply).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });
    Ok(format!("tcp://{}", address))
}

/// WebSocket peer answering text messages on an ephemeral port
async fn spawn_websocket_peer() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = socket.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    if let Some(reply) = answer(text.as_str())
                        && socket.send(Message::text(reply)).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });
    Ok(format!("ws://{}/rpc", address))
}

async fn exercise(client: &PeerClient) -> Result<()> {
    let initialized = client.connect().await?;
    assert_eq!(initialized.server_info.name, "turul-peer-fixture");
    assert_eq!(client.state(), ConnectionState::Initialized);

    let resources = client.list_resources().await?;
    assert_eq!(resources.len(), 2);
    let contents = client.read_resource(README_URI).await?;
    assert_eq!(contents[0].as_text(), Some("# Fixture\n"));

    let result = client.call_tool("add", json!({"a": "40", "b": "2"})).await?;
    assert_eq!(result.content[0].as_text(), Some("42"));

    let err = client.read_resource("unknown://x").await.unwrap_err();
    assert_eq!(err.error_code(), Some(-32002));

    client.disconnect().await?;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_tcp_session() -> Result<()> {
    let url = spawn_tcp_peer().await?;
    let client = PeerClient::builder().with_url(&url).build()?;
    assert_eq!(client.connection_status().transport_type, TransportType::Tcp);
    exercise(&client).await
}

#[tokio::test]
async fn test_websocket_session() -> Result<()> {
    let url = spawn_websocket_peer().await?;
    let client = PeerClient::builder().with_url(&url).build()?;
    assert_eq!(client.connection_status().transport_type, TransportType::WebSocket);
    exercise(&client).await
}

#[tokio::test]
async fn test_concurrent_calls_over_tcp() -> Result<()> {
    let url = spawn_tcp_peer().await?;
    let client = PeerClient::builder().with_url(&url).build()?;
    client.connect().await?;

    let calls = (0..16).map(|i| client.call_tool("add", json!({"a": i, "b": i})));
    let results = futures::future::join_all(calls).await;
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result?.content[0].as_text(), Some((2 * i).to_string().as_str()));
    }
    Ok(())
}

#[tokio::test]
async fn test_tcp_connection_refused() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);

    let client = PeerClient::builder()
        .with_url(&format!("tcp://{}", address))
        .build()?;
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, PeerClientError::Transport(TransportError::ConnectionFailed(_))));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    Ok(())
}

#[test]
fn test_unsupported_urls_rejected_at_build() {
    for url in ["ftp://example.com/rpc", "memory://fixture"] {
        let err = PeerClient::builder().with_url(url).build().unwrap_err();
        assert!(
            matches!(err, PeerClientError::Transport(TransportError::Unsupported(_))),
            "{url}: {err}"
        );
    }

    let err = PeerClient::builder().with_url("not a url").build().unwrap_err();
    assert!(matches!(err, PeerClientError::Transport(TransportError::ConnectionFailed(_))));
}
