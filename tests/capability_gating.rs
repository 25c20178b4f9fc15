//! Client-side capability gating: denied operations never reach the wire

use serde_json::json;

use turul_peer_client::{CapabilityError, ClientConfig, PeerClient, PeerClientError, StateError};
use turul_peer_fixture::{FixtureConfig, FixturePeer, TestFixtures, connected_client_with, fixture_builder};
use turul_peer_json_rpc::JsonRpcErrorObject;
use turul_peer_protocol::{
    CapabilitySet, Category, Operation, PromptsCapabilities, ResourcesCapabilities, ToolsCapabilities,
    methods,
};

async fn client_granted(capabilities: CapabilitySet) -> (PeerClient, FixturePeer) {
    connected_client_with(
        FixtureConfig::default().with_capabilities(capabilities),
        ClientConfig::default(),
    )
    .await
}

fn assert_denied(err: PeerClientError, expected: Operation) {
    match err {
        PeerClientError::Capability(CapabilityError::NotSupported { category, operation }) => {
            assert_eq!(operation, expected);
            assert_eq!(category, expected.category());
        }
        other => panic!("expected {expected} to be denied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tools_only_peer_denies_other_categories() {
    let (client, peer) = client_granted(TestFixtures::tools_only_capabilities()).await;
    let sent_before = client.transport_stats().requests_sent;

    assert_denied(client.list_resources().await.unwrap_err(), Operation::ListResources);
    assert_denied(client.read_resource("file:///fixture/readme.md").await.unwrap_err(), Operation::ReadResource);
    assert_denied(client.list_prompts().await.unwrap_err(), Operation::ListPrompts);
    assert_denied(client.get_prompt("greeting", None).await.unwrap_err(), Operation::GetPrompt);

    assert_eq!(client.transport_stats().requests_sent, sent_before);
    assert_eq!(peer.received_count(methods::RESOURCES_LIST), 0);
    assert_eq!(peer.received_count(methods::RESOURCES_READ), 0);
    assert_eq!(peer.received_count(methods::PROMPTS_LIST), 0);
    assert_eq!(peer.received_count(methods::PROMPTS_GET), 0);

    // The granted category still works
    assert_eq!(client.list_tools().await.unwrap().len(), 1);
    assert_eq!(peer.received_count(methods::TOOLS_LIST), 1);
}

#[tokio::test]
async fn test_absent_flag_is_treated_as_false() {
    let capabilities = CapabilitySet::new().with_tools(ToolsCapabilities {
        list: Some(true),
        call: None,
        list_changed: None,
    });
    let (client, peer) = client_granted(capabilities).await;

    assert_eq!(client.list_tools().await.unwrap().len(), 1);
    assert_denied(
        client.call_tool("add", json!({"a": "1", "b": "2"})).await.unwrap_err(),
        Operation::CallTool,
    );
    assert_eq!(peer.received_count(methods::TOOLS_CALL), 0);
}

#[tokio::test]
async fn test_explicit_false_denies_operation() {
    let capabilities = CapabilitySet::new()
        .with_resources(ResourcesCapabilities {
            list: Some(true),
            read: Some(false),
            ..Default::default()
        })
        .with_prompts(PromptsCapabilities {
            list: Some(false),
            get: Some(true),
            list_changed: None,
        });
    let (client, peer) = client_granted(capabilities).await;

    assert_eq!(client.list_resources().await.unwrap().len(), 2);
    assert_denied(client.read_resource("file:///fixture/readme.md").await.unwrap_err(), Operation::ReadResource);
    assert_denied(client.list_prompts().await.unwrap_err(), Operation::ListPrompts);
    assert!(client.get_prompt("greeting", None).await.is_ok());
    assert_eq!(peer.received_count(methods::RESOURCES_READ), 0);
    assert_eq!(peer.received_count(methods::PROMPTS_LIST), 0);
}

#[tokio::test]
async fn test_empty_capability_set_denies_everything_but_ping() {
    let (client, peer) = client_granted(CapabilitySet::new()).await;

    assert_denied(client.list_tools().await.unwrap_err(), Operation::ListTools);
    assert_denied(client.call_tool("add", json!({})).await.unwrap_err(), Operation::CallTool);
    assert_denied(client.list_resources().await.unwrap_err(), Operation::ListResources);

    // ping needs no capability
    client.ping().await.unwrap();
    assert_eq!(peer.received_count(methods::PING), 1);
    assert_eq!(
        peer.received_methods(),
        vec![
            methods::INITIALIZE.to_string(),
            methods::NOTIFICATION_INITIALIZED.to_string(),
            methods::PING.to_string()
        ]
    );
}

#[tokio::test]
async fn test_denial_has_no_wire_error_code() {
    let (client, _peer) = client_granted(CapabilitySet::new()).await;
    let err = client.list_prompts().await.unwrap_err();
    assert_eq!(err.error_code(), None);
    assert!(!err.is_remote());
    assert!(err.to_string().contains("prompts"));
}

#[tokio::test]
async fn test_state_checked_before_capabilities() {
    let rejection = JsonRpcErrorObject::unauthorized(None);
    let (builder, peer) = fixture_builder(FixtureConfig::default().failing_initialize(rejection));
    let client = builder.build().unwrap();
    assert!(client.connect().await.is_err());

    // Connected but not initialized: the state error wins even for granted operations
    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, PeerClientError::State(StateError::NotInitialized)));
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, PeerClientError::State(StateError::NotInitialized)));
    assert_eq!(peer.received_count(methods::TOOLS_LIST), 0);
    assert_eq!(peer.received_count(methods::PING), 0);
}

#[tokio::test]
async fn test_capabilities_cleared_on_disconnect() {
    let (client, _peer) = client_granted(TestFixtures::full_capabilities()).await;
    let granted = client.server_capabilities().unwrap();
    assert!(granted.allows(Operation::CallTool));
    assert_eq!(Operation::CallTool.category(), Category::Tools);

    client.disconnect().await.unwrap();
    assert!(client.server_capabilities().is_none());
    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, PeerClientError::State(StateError::NotConnected)));
}
