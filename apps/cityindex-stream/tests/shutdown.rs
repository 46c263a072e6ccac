//! Shutdown Integration Tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use cityindex_stream::{
    AdapterSet, ConnectionState, InMemoryTransport, ReconnectConfig, Session, StreamTransport,
    StreamingClient, StreamingError, StreamingOptions,
};

fn start() -> (StreamingClient, Arc<InMemoryTransport>) {
    let transport = Arc::new(InMemoryTransport::new());
    let options = StreamingOptions {
        reconnect: ReconnectConfig::fixed(Duration::from_millis(100)),
        ..StreamingOptions::default()
    };
    let client = StreamingClient::start(
        options,
        Arc::clone(&transport) as Arc<dyn StreamTransport>,
        Session::new("DM123", "token"),
        None,
    )
    .unwrap();
    (client, transport)
}

#[tokio::test]
async fn stop_destroys_every_connection() {
    let (client, transport) = start();
    client.prices().listen(1_u64, |_| {}).unwrap();
    client.orders().listen_all(|_| {}).unwrap();
    client.quotes().listen_all(|_| {}).unwrap();

    client.stop(true).await;

    assert!(client.is_stopped());
    assert_eq!(transport.connections().len(), 3);
    assert!(transport.connections().iter().all(|c| c.is_destroyed()));

    let state = client.state();
    for set in [AdapterSet::Streaming, AdapterSet::Account, AdapterSet::Trading] {
        assert_eq!(state.get(set), Some(ConnectionState::Disconnected));
    }
}

#[tokio::test]
async fn listen_after_stop_is_refused() {
    let (client, transport) = start();
    client.stop(true).await;

    assert!(matches!(
        client.prices().listen(1_u64, |_| {}),
        Err(StreamingError::PoolClosed)
    ));
    assert!(matches!(
        client.news().listen("UK".to_string(), |_| {}),
        Err(StreamingError::PoolClosed)
    ));
    assert_eq!(transport.session_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_abandons_pending_reconnects() {
    let (client, transport) = start();
    client.trade_margin().listen_all(|_| {}).unwrap();

    transport
        .latest(AdapterSet::Account)
        .unwrap()
        .set_state(ConnectionState::Disconnected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.stop(true).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.session_attempts(), 1);
}

#[tokio::test]
async fn stop_without_wait_returns_immediately() {
    let (client, transport) = start();
    client.account_margin().listen_all(|_| {}).unwrap();

    client.stop(false).await;

    assert!(client.is_stopped());
    assert!(transport.latest(AdapterSet::Account).unwrap().is_destroyed());
}

#[tokio::test]
async fn stop_twice_is_harmless() {
    let (client, _transport) = start();
    client.default_prices().listen(2347_u32, |_| {}).unwrap();

    client.stop(true).await;
    client.stop(true).await;

    assert!(client.is_stopped());
}

#[tokio::test]
async fn unlisten_after_stop_leaves_transport_alone() {
    let (client, transport) = start();
    let token = client.prices().listen(5_u64, |_| {}).unwrap();

    client.stop(true).await;
    let conn = transport.latest(AdapterSet::Streaming).unwrap();
    assert_eq!(conn.tables_deleted(), 1);

    client.prices().unlisten(&token);
    assert!(!client.prices().unlisten(&token));
    assert_eq!(conn.tables_deleted(), 1);
    assert!(client.prices().bound_keys().is_empty());
}
