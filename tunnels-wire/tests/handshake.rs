//! Handshake tests against a scripted mock peer.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use tunnels_wire::{
    Message, MessageCodec, NetAddress, SeedConnection, SubnetworkId, VersionMessage, WireConfig,
    WireError, PROTOCOL_VERSION,
};

fn test_config() -> WireConfig {
    WireConfig {
        connect_timeout: Duration::from_secs(2),
        step_timeout: Duration::from_millis(500),
        ..WireConfig::default()
    }
}

fn peer_version(user_agent: &str, subnetwork_id: Option<SubnetworkId>) -> VersionMessage {
    VersionMessage {
        protocol_version: PROTOCOL_VERSION,
        network: "tunnels-mainnet".to_string(),
        services: 1,
        timestamp: 1_700_000_000,
        id: [9u8; 16],
        user_agent: user_agent.to_string(),
        subnetwork_id,
    }
}

/// Drive the server side of the handshake the way a full node would.
async fn serve_peer(
    listener: TcpListener,
    addrs: Vec<NetAddress>,
    subnetwork_id: Option<SubnetworkId>,
) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = Framed::new(stream, MessageCodec::new());

    // The accepting side speaks first.
    framed
        .send(Message::Version(peer_version("/tunnelsd:1.0.0/", subnetwork_id)))
        .await
        .unwrap();

    match framed.next().await.unwrap().unwrap() {
        Message::Version(_) => {}
        other => panic!("expected version, got {}", other),
    }
    framed.send(Message::VerAck).await.unwrap();
    match framed.next().await.unwrap().unwrap() {
        Message::VerAck => {}
        other => panic!("expected verack, got {}", other),
    }

    framed
        .send(Message::RequestAddresses {
            include_all_subnetworks: false,
            subnetwork_id: None,
        })
        .await
        .unwrap();
    match framed.next().await.unwrap().unwrap() {
        Message::Addresses(list) => assert!(list.is_empty(), "seeder should send no addresses"),
        other => panic!("expected addresses, got {}", other),
    }

    match framed.next().await.unwrap().unwrap() {
        Message::RequestAddresses {
            include_all_subnetworks,
            ..
        } => assert!(include_all_subnetworks),
        other => panic!("expected requestaddresses, got {}", other),
    }
    framed.send(Message::Addresses(addrs)).await.unwrap();

    // Exercise the keepalive path before letting the connection go.
    framed.send(Message::Ping(77)).await.unwrap();
    loop {
        match framed.next().await {
            Some(Ok(Message::Pong(nonce))) => {
                assert_eq!(nonce, 77);
                break;
            }
            Some(Ok(_)) => continue,
            _ => panic!("expected pong"),
        }
    }
}

#[tokio::test]
async fn test_handshake_and_address_harvest() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let gossip = vec![
        NetAddress::new("8.8.8.8".parse().unwrap(), 9333),
        NetAddress::new("1.1.1.1".parse().unwrap(), 9333),
    ];
    let subnetwork = Some(SubnetworkId([5u8; 20]));
    let peer = tokio::spawn(serve_peer(listener, gossip.clone(), subnetwork));

    let (mut conn, version) = SeedConnection::connect(addr, &test_config()).await.unwrap();
    assert_eq!(version.user_agent, "/tunnelsd:1.0.0/");
    assert_eq!(version.subnetwork_id, subnetwork);

    let received = conn.request_addresses().await.unwrap();
    assert_eq!(received, gossip);

    peer.await.unwrap();
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept and then say nothing.
    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let result = SeedConnection::connect(addr, &test_config()).await;
    assert!(matches!(result, Err(WireError::StepTimeout { .. })));

    peer.abort();
}

#[tokio::test]
async fn test_unexpected_first_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec::new());
        framed.send(Message::VerAck).await.unwrap();
        // Hold the socket open while the client decides.
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let result = SeedConnection::connect(addr, &test_config()).await;
    match result {
        Err(WireError::UnexpectedMessage { expected, actual }) => {
            assert_eq!(expected, "version");
            assert_eq!(actual, "verack");
        }
        other => panic!("expected unexpected-message error, got {:?}", other.map(|_| ())),
    }

    peer.abort();
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to find a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = SeedConnection::connect(addr, &test_config()).await;
    assert!(matches!(result, Err(WireError::Io(_))));
}
