//! Resources, tools and prompts against the fixture catalogue

use serde_json::json;
use std::collections::HashMap;

use turul_peer_fixture::{CONFIG_URI, README_URI, TestFixtures, connected_client};
use turul_peer_json_rpc::error_codes;
use turul_peer_protocol::{ContentBlock, Role, methods};

#[tokio::test]
async fn test_list_resources_in_peer_order() {
    let (client, _peer) = connected_client().await;

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources, TestFixtures::resources());
    let uris: Vec<_> = resources.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(uris, vec![README_URI, CONFIG_URI]);
    assert_eq!(resources[0].mime_type.as_deref(), Some("text/markdown"));
}

#[tokio::test]
async fn test_read_resource() {
    let (client, _peer) = connected_client().await;

    let contents = client.read_resource(README_URI).await.unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].uri(), README_URI);
    assert_eq!(contents[0].as_text(), Some("# Fixture\n"));
}

#[tokio::test]
async fn test_read_unknown_resource_surfaces_remote_error() {
    let (client, _peer) = connected_client().await;

    let err = client.read_resource("unknown://x").await.unwrap_err();
    let remote = err.remote_error().expect("remote error");
    assert_eq!(remote.code, error_codes::RESOURCE_NOT_FOUND);
    assert_eq!(remote.message, "Resource 'unknown://x' not found");
    assert_eq!(remote.data, Some(json!({"uri": "unknown://x"})));

    // The session survives a remote error
    assert!(client.is_ready());
    assert_eq!(client.read_resource(CONFIG_URI).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_call_tool_returns_text_content() {
    let (client, peer) = connected_client().await;

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "add");

    let result = client.call_tool("add", json!({"a": "5", "b": "7"})).await.unwrap();
    assert!(!result.is_error());
    assert_eq!(result.content, vec![ContentBlock::text("12")]);
    assert_eq!(peer.received_count(methods::TOOLS_CALL), 1);
}

#[tokio::test]
async fn test_tool_failure_is_reported_in_result() {
    let (client, _peer) = connected_client().await;

    let result = client.call_tool("add", json!({"a": "five", "b": "7"})).await.unwrap();
    assert!(result.is_error());
    assert_eq!(result.content[0].as_text(), Some("a and b must be integers"));
}

#[tokio::test]
async fn test_call_unknown_tool() {
    let (client, _peer) = connected_client().await;

    let err = client.call_tool("subtract", json!({"a": 1, "b": 2})).await.unwrap_err();
    assert_eq!(err.error_code(), Some(error_codes::TOOL_NOT_FOUND));
}

#[tokio::test]
async fn test_call_tool_without_arguments() {
    let (client, _peer) = connected_client().await;

    // null arguments are omitted from the request; the fixture then reports a tool failure
    let result = client.call_tool("add", serde_json::Value::Null).await.unwrap();
    assert!(result.is_error());
}

#[tokio::test]
async fn test_prompts() {
    let (client, _peer) = connected_client().await;

    let prompts = client.list_prompts().await.unwrap();
    assert_eq!(prompts, TestFixtures::prompts());

    let arguments = HashMap::from([("name".to_string(), "Ada".to_string())]);
    let prompt = client.get_prompt("greeting", Some(arguments)).await.unwrap();
    assert_eq!(prompt.messages.len(), 1);
    assert_eq!(prompt.messages[0].role, Role::User);
    assert_eq!(prompt.messages[0].content.as_text(), Some("Hello, Ada!"));

    let prompt = client.get_prompt("greeting", None).await.unwrap();
    assert_eq!(prompt.messages[0].content.as_text(), Some("Hello, there!"));

    let err = client.get_prompt("farewell", None).await.unwrap_err();
    assert_eq!(err.error_code(), Some(error_codes::PROMPT_NOT_FOUND));
}

#[tokio::test]
async fn test_paginated_listings_expose_cursor() {
    let (client, _peer) = connected_client().await;

    let page = client.list_tools_paginated(None).await.unwrap();
    assert_eq!(page.tools.len(), 1);
    assert!(page.next_cursor.is_none());

    let page = client
        .list_resources_paginated(Some("page-2".to_string()))
        .await
        .unwrap();
    assert_eq!(page.resources.len(), 2);

    let page = client.list_prompts_paginated(None).await.unwrap();
    assert_eq!(page.prompts.len(), 1);
}

#[tokio::test]
async fn test_ping_and_statistics() {
    let (client, peer) = connected_client().await;
    let before = client.transport_stats();

    client.ping().await.unwrap();
    client.ping().await.unwrap();

    let after = client.transport_stats();
    assert_eq!(after.requests_sent, before.requests_sent + 2);
    assert_eq!(after.responses_received, before.responses_received + 2);
    assert_eq!(peer.received_count(methods::PING), 2);
    assert_eq!(client.connection_status().pending_calls, 0);
}
