//! Subscription Lifecycle Integration Tests
//!
//! Listener reference counting, table lifetime, key normalization and
//! fan-out through the public client API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use cityindex_stream::application::services::{ConnectionPool, PricesChannel};
use cityindex_stream::{
    AdapterSet, Category, ChannelKey, IFX_POLAND_OPERATOR_ID, InMemoryTransport, ListenerToken,
    NewsHeadline, Order, OrderStatus, Price, Session, StreamRecord, StreamTransport,
    StreamingClient, StreamingError, StreamingOptions, SubscriptionRegistry, TableOptions,
};

fn start_client() -> (StreamingClient, Arc<InMemoryTransport>) {
    let transport = Arc::new(InMemoryTransport::new());
    let client = StreamingClient::start(
        StreamingOptions::default(),
        Arc::clone(&transport) as Arc<dyn StreamTransport>,
        Session::new("DM123", "token"),
        None,
    )
    .unwrap();
    (client, transport)
}

fn row<R: StreamRecord>(values: &[(&str, &'static str)]) -> Vec<Option<&'static str>> {
    R::SCHEMA
        .iter()
        .map(|spec| {
            values
                .iter()
                .find(|(name, _)| *name == spec.name)
                .map(|(_, value)| *value)
        })
        .collect()
}

// =============================================================================
// Reference counting
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Listen(u64),
    Unlisten(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0_u64..4).prop_map(Op::Listen),
        (0_usize..16).prop_map(Op::Unlisten),
    ]
}

proptest! {
    #[test]
    fn one_table_per_key_with_listeners(ops in prop::collection::vec(op(), 1..64)) {
        let transport = Arc::new(InMemoryTransport::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = Arc::new(ConnectionPool::new(
            Arc::clone(&transport) as Arc<dyn StreamTransport>,
            Session::new("DM123", "token"),
            tx,
        ));
        let prices: SubscriptionRegistry<PricesChannel> =
            SubscriptionRegistry::new(Arc::clone(&pool), TableOptions::default());

        let mut tokens: Vec<ListenerToken> = Vec::new();
        let mut model: HashMap<u64, usize> = HashMap::new();

        for op in ops {
            match op {
                Op::Listen(id) => {
                    tokens.push(prices.listen(id, |_| {}).unwrap());
                    *model.entry(id).or_default() += 1;
                }
                Op::Unlisten(index) if !tokens.is_empty() => {
                    let token = tokens.remove(index % tokens.len());
                    prop_assert!(prices.unlisten(&token));
                    prop_assert!(!prices.unlisten(&token));
                    let id: u64 = token.key().as_str()["PRICE.".len()..].parse().unwrap();
                    *model.get_mut(&id).unwrap() -= 1;
                }
                Op::Unlisten(_) => {}
            }

            for id in 0..4_u64 {
                let expected = model.get(&id).copied().unwrap_or(0);
                prop_assert_eq!(prices.listener_count(id), expected);
            }

            let live: usize = model.values().filter(|count| **count > 0).count();
            prop_assert_eq!(prices.stats().channel_count, live);
            let tables = transport
                .latest(AdapterSet::Streaming)
                .map_or(0, |conn| conn.live_tables().len());
            prop_assert_eq!(tables, live);
        }

        prop_assert!(transport.session_attempts() <= 1);
    }
}

// =============================================================================
// Client routing
// =============================================================================

#[tokio::test]
async fn one_connection_per_adapter_set() {
    let (client, transport) = start_client();

    client.prices().listen(1_u64, |_| {}).unwrap();
    client.news().listen("UK".to_string(), |_| {}).unwrap();
    client.orders().listen_all(|_| {}).unwrap();
    client.account_margin().listen_all(|_| {}).unwrap();
    client.trade_margin().listen_all(|_| {}).unwrap();
    client.quotes().listen_all(|_| {}).unwrap();
    client
        .default_prices()
        .listen(IFX_POLAND_OPERATOR_ID, |_| {})
        .unwrap();

    assert_eq!(transport.session_attempts(), 4);
    assert_eq!(transport.session_attempts_for(AdapterSet::Streaming), 1);
    assert_eq!(transport.session_attempts_for(AdapterSet::Account), 1);

    let account = transport.latest(AdapterSet::Account).unwrap();
    let items: Vec<_> = account
        .live_tables()
        .iter()
        .map(|t| t.items.to_string())
        .collect();
    assert_eq!(
        items,
        vec!["ORDERS.ALL", "CLIENTACCOUNTMARGIN.ALL", "TRADEMARGIN.ALL"]
    );

    let defaults = transport.latest(AdapterSet::DefaultPrices).unwrap();
    assert_eq!(defaults.live_tables()[0].items.as_str(), "AC2347");

    client.stop(true).await;
}

#[tokio::test]
async fn merged_market_ids_form_one_table() {
    let (client, transport) = start_client();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let token = client
        .prices()
        .listen([154_297_u64, 99_500], move |price: &Price| {
            sink.lock().push(price.market_id);
        })
        .unwrap();
    assert_eq!(token.key().as_str(), "PRICE.154297 PRICE.99500");

    // Same ids in a different order are a different subscription.
    client.prices().listen(vec![99_500_u64, 154_297], |_| {}).unwrap();

    let conn = transport.latest(AdapterSet::Streaming).unwrap();
    assert_eq!(conn.live_tables().len(), 2);

    conn.push(
        "PRICE.99500",
        &row::<Price>(&[("MarketId", "99500"), ("Bid", "1.1")]),
    );
    assert_eq!(*seen.lock(), vec![Some(99_500)]);

    client.stop(true).await;
}

#[tokio::test]
async fn order_rows_carry_status() {
    let (client, transport) = start_client();
    let seen = Arc::new(Mutex::new(Vec::<Order>::new()));
    let sink = Arc::clone(&seen);
    client
        .orders()
        .listen_all(move |order: &Order| sink.lock().push(order.clone()))
        .unwrap();

    let conn = transport.latest(AdapterSet::Account).unwrap();
    conn.push(
        "ORDERS.ALL",
        &row::<Order>(&[
            ("OrderId", "5001"),
            ("MarketId", "154297"),
            ("CurrencyISO", "GBP"),
            ("AutoRollover", "false"),
            ("Quantity", "2.5"),
            ("Status", "3"),
        ]),
    );

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status(), Some(OrderStatus::Open));
    assert_eq!(seen[0].quantity, Some(Decimal::new(25, 1)));
    assert_eq!(seen[0].currency_iso.as_deref(), Some("GBP"));
    drop(seen);

    client.stop(true).await;
}

#[tokio::test]
async fn news_headlines_decode_wcf_dates() {
    let (client, transport) = start_client();
    let seen = Arc::new(Mutex::new(Vec::<NewsHeadline>::new()));
    let sink = Arc::clone(&seen);
    let token = client
        .news()
        .listen("UK".to_string(), move |h: &NewsHeadline| {
            sink.lock().push(h.clone());
        })
        .unwrap();
    assert_eq!(token.key(), &ChannelKey::new("HEADLINES.UK"));

    transport.latest(AdapterSet::Streaming).unwrap().push(
        "HEADLINES.UK",
        &row::<NewsHeadline>(&[
            ("StoryId", "42"),
            ("Headline", "FTSE opens higher"),
            ("PublishDate", "\\/Date(1343067900000)\\/"),
        ]),
    );

    let seen = seen.lock();
    assert_eq!(seen[0].story_id, Some(42));
    assert_eq!(
        seen[0].publish_date,
        Some(Utc.timestamp_opt(1_343_067_900, 0).unwrap())
    );
    drop(seen);

    client.stop(true).await;
}

#[tokio::test]
async fn panicking_listener_is_isolated() {
    fn explode(_: &Price) {
        panic!("listener bug");
    }

    let (client, transport) = start_client();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    client.prices().listen(7_u64, explode).unwrap();
    client
        .prices()
        .listen(7_u64, move |_: &Price| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let conn = transport.latest(AdapterSet::Streaming).unwrap();
    for bid in ["1", "2", "3"] {
        conn.push("PRICE.7", &row::<Price>(&[("MarketId", "7"), ("Bid", bid)]));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(client.prices().listener_count(7_u64), 2);

    client.stop(true).await;
}

#[tokio::test]
async fn double_unlisten_is_a_noop() {
    let (client, transport) = start_client();
    let token = client.quotes().listen_all(|_| {}).unwrap();

    assert!(client.quotes().unlisten(&token));
    assert!(!client.quotes().unlisten(&token));

    let conn = transport.latest(AdapterSet::Trading).unwrap();
    assert_eq!(conn.tables_created(), 1);
    assert_eq!(conn.tables_deleted(), 1);

    client.stop(true).await;
}

#[tokio::test]
async fn unlisten_inside_callback_stops_delivery() {
    let (client, transport) = start_client();
    let client = Arc::new(client);
    let token: Arc<Mutex<Option<ListenerToken>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&client);
    let slot = Arc::clone(&token);
    let counter = Arc::clone(&calls);
    let issued = client
        .prices()
        .listen(11_u64, move |_: &Price| {
            counter.fetch_add(1, Ordering::SeqCst);
            let taken = slot.lock().take();
            if let (Some(client), Some(token)) = (weak.upgrade(), taken) {
                client.prices().unlisten(&token);
            }
        })
        .unwrap();
    *token.lock() = Some(issued);

    let conn = transport.latest(AdapterSet::Streaming).unwrap();
    conn.push("PRICE.11", &row::<Price>(&[("MarketId", "11")]));
    conn.push("PRICE.11", &row::<Price>(&[("MarketId", "11")]));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(client.prices().active_keys().is_empty());

    client.stop(true).await;
}

#[tokio::test]
async fn tokens_do_not_cross_clients() {
    let (first, first_transport) = start_client();
    let (second, second_transport) = start_client();

    let a = first.prices().listen(1_u64, |_| {}).unwrap();
    let b = second.prices().listen(1_u64, |_| {}).unwrap();
    assert_eq!(a.key(), b.key());

    assert!(!second.prices().unlisten(&a));
    assert!(!first.prices().unlisten(&b));
    assert_eq!(first.prices().listener_count(1_u64), 1);
    assert_eq!(second.prices().listener_count(1_u64), 1);
    for transport in [&first_transport, &second_transport] {
        let conn = transport.latest(AdapterSet::Streaming).unwrap();
        assert_eq!(conn.live_tables().len(), 1);
    }

    assert!(first.prices().unlisten(&a));
    assert!(second.prices().unlisten(&b));

    first.stop(true).await;
    second.stop(true).await;
}

#[tokio::test]
async fn empty_market_list_requests_no_table() {
    let (client, transport) = start_client();

    let err = client.prices().listen(Vec::<u64>::new(), |_| {}).unwrap_err();
    assert_eq!(err, StreamingError::EmptyKey(Category::Prices));
    assert!(client.prices().active_keys().is_empty());
    assert!(transport.latest(AdapterSet::Streaming).is_none());

    client.stop(true).await;
}
