#![allow(clippy::unwrap_used)]
// End-to-end tests: a real server on loopback, driven by a real UDP client.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::net::UdpSocket;

use radvlan_core::{ClientRegistry, MemoryStore, Server, ServerConfig};
use radvlan_proto::{Attribute, AttributeType, Code, Packet, random_authenticator};

const SECRET: &str = "testing123";

// ── Helpers ─────────────────────────────────────────────────────────

fn loopback_config() -> ServerConfig {
    ServerConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        auth_port: 0,
        acct_port: Some(0),
        ..ServerConfig::default()
    }
}

async fn start_server(registry: ClientRegistry, store: &Arc<MemoryStore>) -> Server {
    let server = Server::bind(loopback_config(), registry, store.clone(), store.clone())
        .await
        .unwrap();
    server.start().await;
    server
}

fn localhost_registry() -> ClientRegistry {
    ClientRegistry::new().with_client(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        "loopback",
        SecretString::from(SECRET.to_owned()),
    )
}

/// Send one request and wait briefly for a reply.
async fn exchange(target: SocketAddr, request: &Packet) -> Option<Packet> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&request.encode(SECRET.as_bytes()).unwrap(), target)
        .await
        .unwrap();

    let mut buf = [0u8; 4096];
    match tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => {
            assert_eq!(from, target);
            Some(Packet::decode(&buf[..len]).unwrap())
        }
        _ => None,
    }
}

/// Audit rows land after the reply is sent, so poll for them.
async fn wait_for_audit(store: &MemoryStore, expected: usize) {
    for _ in 0..50 {
        if store.audit_records().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn mac_auth_request(mac: &str) -> Packet {
    Packet::new(Code::AccessRequest, 17, random_authenticator())
        .with(Attribute::string(AttributeType::UserName, mac))
        .with(Attribute::string(AttributeType::CallingStationId, mac))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_access_accept_over_udp() {
    let store = Arc::new(MemoryStore::new());
    store.insert_exact("aa:bb:cc:dd:ee:ff".parse().unwrap(), 42);
    let server = start_server(localhost_registry(), &store).await;

    let request = mac_auth_request("AA-BB-CC-DD-EE-FF");
    let reply = exchange(server.auth_addr().unwrap(), &request).await.unwrap();

    assert_eq!(reply.code, Code::AccessAccept);
    assert_eq!(reply.identifier, 17);
    assert_eq!(reply.text(AttributeType::TunnelPrivateGroupId), Some("42"));
    reply
        .verify_response(&request.authenticator, SECRET.as_bytes())
        .unwrap();

    wait_for_audit(&store, 1).await;
    assert_eq!(store.audit_records().len(), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_client_gets_no_reply() {
    let store = Arc::new(MemoryStore::new());
    store.set_default(99, true);
    let server = start_server(ClientRegistry::new(), &store).await;

    let reply = exchange(server.auth_addr().unwrap(), &mac_auth_request("AA-BB-CC-DD-EE-FF")).await;

    assert!(reply.is_none());
    assert!(store.audit_records().is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_accounting_is_acknowledged() {
    let store = Arc::new(MemoryStore::new());
    let server = start_server(localhost_registry(), &store).await;
    let acct_addr = server.acct_addr().unwrap().unwrap();

    let request = Packet::new(Code::AccountingRequest, 3, [0; 16])
        .with(Attribute::integer(AttributeType::AcctStatusType, 1));
    let reply = exchange(acct_addr, &request).await.unwrap();

    assert_eq!(reply.code, Code::AccountingResponse);
    assert_eq!(reply.identifier, 3);
    assert!(store.audit_records().is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_listeners() {
    let store = Arc::new(MemoryStore::new());
    store.set_default(99, true);
    let server = start_server(localhost_registry(), &store).await;
    let addr = server.auth_addr().unwrap();

    server.shutdown().await;

    assert!(server.cancel_token().is_cancelled());
    assert!(exchange(addr, &mac_auth_request("AA-BB-CC-DD-EE-FF")).await.is_none());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_requests() {
    let store = Arc::new(MemoryStore::new());
    store.insert_exact("00:11:22:33:44:55".parse().unwrap(), 77);
    store.set_latency(Duration::from_millis(200));
    let server = start_server(localhost_registry(), &store).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let request = mac_auth_request("00-11-22-33-44-55");
    client
        .send_to(
            &request.encode(SECRET.as_bytes()).unwrap(),
            server.auth_addr().unwrap(),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.shutdown().await;

    let records = store.audit_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].username, "00:11:22:33:44:55");

    let mut buf = [0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_millis(100), client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let reply = Packet::decode(&buf[..len]).unwrap();
    assert_eq!(reply.code, Code::AccessAccept);
    assert_eq!(reply.text(AttributeType::TunnelPrivateGroupId), Some("77"));
}
