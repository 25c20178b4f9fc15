//! Helpers that wire a [`PeerClient`] to a [`FixturePeer`]

use std::time::Duration;

use turul_peer_client::{ClientConfig, ConnectionState, PeerClient, PeerClientBuilder};

use crate::peer::{FixtureConfig, FixturePeer};

/// Upper bound for anything a test waits on
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder already pointed at a fresh fixture peer
pub fn fixture_builder(fixture: FixtureConfig) -> (PeerClientBuilder, FixturePeer) {
    let (peer, connector) = FixturePeer::spawn(fixture);
    (PeerClient::builder().with_connector(Box::new(connector)), peer)
}

/// Client built from `config`, connected and initialized against a fixture peer
pub async fn connected_client_with(fixture: FixtureConfig, config: ClientConfig) -> (PeerClient, FixturePeer) {
    let (builder, peer) = fixture_builder(fixture);
    let client = builder.with_config(config).build().expect("client builds");
    client.connect().await.expect("handshake succeeds");
    (client, peer)
}

/// Default client connected to a default fixture peer
pub async fn connected_client() -> (PeerClient, FixturePeer) {
    connected_client_with(FixtureConfig::default(), ClientConfig::default()).await
}

/// Poll until the client reaches `state`; panics after [`TEST_TIMEOUT`]
pub async fn wait_for_state(client: &PeerClient, state: ConnectionState) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while client.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("client never reached {state}, stuck in {}", client.state()));
}
