//! Streaming Facade
//!
//! [`StreamingClient`] wires the pool, the state board, the supervisor and
//! one registry per category, then exposes them through typed accessors:
//!
//! ```text
//! client.prices()          PRICE.<id>               CITYINDEXSTREAMING
//! client.default_prices()  AC<operator>             CITYINDEXSTREAMINGDEFAULTPRICES
//! client.news()            HEADLINES.<category>     CITYINDEXSTREAMING
//! client.orders()          ORDERS.ALL               STREAMINGCLIENTACCOUNT
//! client.account_margin()  CLIENTACCOUNTMARGIN.ALL  STREAMINGCLIENTACCOUNT
//! client.trade_margin()    TRADEMARGIN.ALL          STREAMINGCLIENTACCOUNT
//! client.quotes()          QUOTE.ALL                STREAMINGTRADINGACCOUNT
//! ```
//!
//! Connections are opened lazily by the first `listen` on an adapter set.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::channels::{
    AccountMarginChannel, DefaultPricesChannel, NewsChannel, OrdersChannel, PricesChannel,
    QuotesChannel, TradeMarginChannel,
};
use super::errors::StreamingError;
use super::pool::ConnectionPool;
use super::reconnect::ReconnectConfig;
use super::registry::{SubscriptionRegistry, TableOptions};
use super::state_board::{ObserverToken, StateBoard};
use super::supervisor::ReconnectionSupervisor;
use crate::application::ports::{SessionRefresher, StreamTransport};
use crate::domain::session::Session;
use crate::domain::streaming::{ConnectionState, StateSnapshot};

/// Tuning for a [`StreamingClient`].
#[derive(Debug, Clone, Default)]
pub struct StreamingOptions {
    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectConfig,
    /// Mode and snapshot flag for every table.
    pub table: TableOptions,
}

/// Streaming entry point: one registry per category over a shared pool.
pub struct StreamingClient {
    pool: Arc<ConnectionPool>,
    board: Arc<StateBoard>,
    prices: SubscriptionRegistry<PricesChannel>,
    default_prices: SubscriptionRegistry<DefaultPricesChannel>,
    orders: SubscriptionRegistry<OrdersChannel>,
    account_margin: SubscriptionRegistry<AccountMarginChannel>,
    trade_margin: SubscriptionRegistry<TradeMarginChannel>,
    quotes: SubscriptionRegistry<QuotesChannel>,
    news: SubscriptionRegistry<NewsChannel>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingClient {
    /// Build the client and spawn its reconnection supervisor.
    ///
    /// `refresher` is used to obtain a new session when the server reports
    /// the current one expired; without it the client retries with the
    /// session it was started with.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn start(
        options: StreamingOptions,
        transport: Arc<dyn StreamTransport>,
        session: Session,
        refresher: Option<Arc<dyn SessionRefresher>>,
    ) -> Result<Self, StreamingError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StreamingError::NoRuntime)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(ConnectionPool::new(transport, session, events_tx));
        let board = Arc::new(StateBoard::new());
        let cancel = CancellationToken::new();

        let supervisor = ReconnectionSupervisor::new(
            Arc::clone(&pool),
            Arc::clone(&board),
            events_rx,
            options.reconnect,
            refresher,
            cancel.clone(),
        );
        let handle = runtime.spawn(supervisor.run());

        let table = options.table;
        tracing::info!(mode = table.mode.as_str(), snapshot = table.snapshot, "Streaming client started");

        Ok(Self {
            prices: SubscriptionRegistry::new(Arc::clone(&pool), table),
            default_prices: SubscriptionRegistry::new(Arc::clone(&pool), table),
            orders: SubscriptionRegistry::new(Arc::clone(&pool), table),
            account_margin: SubscriptionRegistry::new(Arc::clone(&pool), table),
            trade_margin: SubscriptionRegistry::new(Arc::clone(&pool), table),
            quotes: SubscriptionRegistry::new(Arc::clone(&pool), table),
            news: SubscriptionRegistry::new(Arc::clone(&pool), table),
            pool,
            board,
            cancel,
            supervisor: Mutex::new(Some(handle)),
        })
    }

    /// Market prices by market id.
    #[must_use]
    pub const fn prices(&self) -> &SubscriptionRegistry<PricesChannel> {
        &self.prices
    }

    /// Default prices by operator id.
    #[must_use]
    pub const fn default_prices(&self) -> &SubscriptionRegistry<DefaultPricesChannel> {
        &self.default_prices
    }

    /// Order updates.
    #[must_use]
    pub const fn orders(&self) -> &SubscriptionRegistry<OrdersChannel> {
        &self.orders
    }

    /// Client account margin.
    #[must_use]
    pub const fn account_margin(&self) -> &SubscriptionRegistry<AccountMarginChannel> {
        &self.account_margin
    }

    /// Per-trade margin.
    #[must_use]
    pub const fn trade_margin(&self) -> &SubscriptionRegistry<TradeMarginChannel> {
        &self.trade_margin
    }

    /// Trading account quotes.
    #[must_use]
    pub const fn quotes(&self) -> &SubscriptionRegistry<QuotesChannel> {
        &self.quotes
    }

    /// News headlines by category.
    #[must_use]
    pub const fn news(&self) -> &SubscriptionRegistry<NewsChannel> {
        &self.news
    }

    /// Call `observer` with the full state snapshot after every connection
    /// state transition.
    pub fn on_state<F>(&self, observer: F) -> ObserverToken
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        self.board.subscribe(Arc::new(observer))
    }

    /// Remove a state observer.
    pub fn remove_state_observer(&self, token: ObserverToken) -> bool {
        self.board.unsubscribe(token)
    }

    /// Current state of every connection.
    #[must_use]
    pub fn state(&self) -> StateSnapshot {
        self.board.snapshot()
    }

    /// Session used for new connections.
    #[must_use]
    pub fn session(&self) -> Session {
        self.pool.session()
    }

    /// True once [`Self::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.pool.is_closed()
    }

    /// Stop streaming. Every connection is destroyed, pending reconnects
    /// are abandoned and further `listen` calls fail with
    /// [`StreamingError::PoolClosed`]. With `wait`, resolves once every
    /// connection has closed and the supervisor has exited.
    pub async fn stop(&self, wait: bool) {
        let sets = self.pool.adapter_sets();
        self.pool.close_all(wait).await;
        self.cancel.cancel();

        for adapter_set in sets {
            self.board.publish(adapter_set, ConnectionState::Disconnected);
        }

        let handle = self.supervisor.lock().take();
        if wait
            && let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Reconnection supervisor ended abnormally");
        }
        tracing::info!("Streaming client stopped");
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("pool", &self.pool)
            .field("state", &self.board.snapshot())
            .finish_non_exhaustive()
    }
}
