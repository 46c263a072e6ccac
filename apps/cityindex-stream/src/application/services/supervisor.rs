//! Reconnection Supervisor
//!
//! A single task reacting to connection events. It keeps the aggregated
//! state snapshot current and re-establishes dropped connections:
//!
//! ```text
//! Connecting ──► Connected ──► Disconnected ──► Reconnecting ──┐
//!     ▲                                                        │
//!     └──────────────── backoff delay, new session ◄───────────┘
//! ```
//!
//! Nothing here blocks on I/O: backoff delays and session refreshes run
//! in small spawned tasks that report back through a wakeup channel.
//! Once the pool is closed no reconnect is scheduled and pending ones are
//! dropped.
//!
//! A table request refused by a live connection is retried on the same
//! connection with its own backoff, so a transient refusal does not leave a
//! subscription unbound until the next drop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::pool::ConnectionPool;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::state_board::StateBoard;
use crate::application::ports::{ConnectionEvent, ConnectionEventKind, SessionRefresher};
use crate::domain::session::{Session, SessionError};
use crate::domain::streaming::{AdapterSet, ConnectionState};
use crate::infrastructure::metrics;

/// Messages from the supervisor's own helper tasks.
#[derive(Debug)]
enum Wakeup {
    /// Backoff elapsed for a scheduled reconnect.
    ReconnectDue { adapter_set: AdapterSet, ticket: u64 },
    /// Backoff elapsed for re-requesting refused tables.
    TableRetryDue { adapter_set: AdapterSet, ticket: u64 },
    /// Session refresh finished.
    SessionRefreshed(Result<Session, SessionError>),
}

/// Drives reconnection for every pooled connection.
pub struct ReconnectionSupervisor {
    pool: Arc<ConnectionPool>,
    board: Arc<StateBoard>,
    refresher: Option<Arc<dyn SessionRefresher>>,
    config: ReconnectConfig,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    wakeup_tx: mpsc::UnboundedSender<Wakeup>,
    wakeup_rx: mpsc::UnboundedReceiver<Wakeup>,
    policies: HashMap<AdapterSet, ReconnectPolicy>,
    // Adapter set -> ticket of the reconnect currently scheduled for it.
    pending: HashMap<AdapterSet, u64>,
    table_policies: HashMap<AdapterSet, ReconnectPolicy>,
    pending_tables: HashMap<AdapterSet, u64>,
    next_ticket: u64,
    awaiting_session: HashSet<AdapterSet>,
    refreshing: bool,
    cancel: CancellationToken,
}

impl ReconnectionSupervisor {
    /// Create a supervisor consuming `events`.
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool>,
        board: Arc<StateBoard>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        config: ReconnectConfig,
        refresher: Option<Arc<dyn SessionRefresher>>,
        cancel: CancellationToken,
    ) -> Self {
        let (wakeup_tx, wakeup_rx) = mpsc::unbounded_channel();
        Self {
            pool,
            board,
            refresher,
            config,
            events,
            wakeup_tx,
            wakeup_rx,
            policies: HashMap::new(),
            pending: HashMap::new(),
            table_policies: HashMap::new(),
            pending_tables: HashMap::new(),
            next_ticket: 0,
            awaiting_session: HashSet::new(),
            refreshing: false,
            cancel,
        }
    }

    /// Spawn [`Self::run`] on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until cancelled or the pool is dropped.
    pub async fn run(mut self) {
        tracing::debug!("Reconnection supervisor started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(wakeup) = self.wakeup_rx.recv() => self.handle_wakeup(wakeup),
            }
        }
        tracing::debug!("Reconnection supervisor stopped");
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        let adapter_set = event.adapter_set;
        if self.pool.generation(adapter_set) != Some(event.generation) {
            tracing::debug!(
                adapter_set = %adapter_set,
                generation = event.generation,
                kind = ?event.kind,
                "Ignoring event from retired connection"
            );
            return;
        }

        match event.kind {
            ConnectionEventKind::State(ConnectionState::Connected) => {
                // A timer armed before the connection recovered would
                // otherwise tear down a healthy connection.
                self.pending.remove(&adapter_set);
                self.policy(adapter_set).reset();
                self.table_policy(adapter_set).reset();
                self.board.publish(adapter_set, ConnectionState::Connected);
            }
            ConnectionEventKind::State(ConnectionState::Disconnected) => {
                self.board.publish(adapter_set, ConnectionState::Disconnected);
                self.schedule_reconnect(adapter_set);
            }
            ConnectionEventKind::State(state) => {
                self.board.publish(adapter_set, state);
            }
            ConnectionEventKind::AuthExpired => self.handle_auth_expired(adapter_set),
            ConnectionEventKind::TableFailed => self.schedule_table_retry(adapter_set),
        }
    }

    fn handle_auth_expired(&mut self, adapter_set: AdapterSet) {
        let Some(refresher) = self.refresher.clone() else {
            tracing::warn!(
                adapter_set = %adapter_set,
                "Session expired and no refresher configured, retrying with current session"
            );
            self.schedule_reconnect(adapter_set);
            return;
        };

        tracing::warn!(adapter_set = %adapter_set, "Session expired");
        self.board.publish(adapter_set, ConnectionState::Reconnecting);
        self.awaiting_session.insert(adapter_set);
        if self.refreshing {
            return;
        }

        self.refreshing = true;
        let tx = self.wakeup_tx.clone();
        tokio::spawn(async move {
            let result = refresher.refresh().await;
            let _ = tx.send(Wakeup::SessionRefreshed(result));
        });
    }

    fn handle_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::ReconnectDue { adapter_set, ticket } => {
                if self.pending.get(&adapter_set) != Some(&ticket) {
                    return;
                }
                self.pending.remove(&adapter_set);

                if self.refreshing {
                    self.awaiting_session.insert(adapter_set);
                } else {
                    self.reconnect_now(adapter_set);
                }
            }
            Wakeup::TableRetryDue { adapter_set, ticket } => {
                if self.pending_tables.get(&adapter_set) != Some(&ticket) {
                    return;
                }
                self.pending_tables.remove(&adapter_set);
                if self.pending.contains_key(&adapter_set) {
                    return;
                }

                let rebound = self.pool.retry_tables(adapter_set);
                tracing::debug!(adapter_set = %adapter_set, rebound, "Retried refused tables");
            }
            Wakeup::SessionRefreshed(Ok(session)) => {
                self.refreshing = false;
                tracing::info!(username = session.username(), "Session refreshed");
                self.pool.set_session(session);

                let mut sets: Vec<_> = self.awaiting_session.drain().collect();
                sets.sort();
                for adapter_set in sets {
                    self.pending.remove(&adapter_set);
                    self.reconnect_now(adapter_set);
                }
            }
            Wakeup::SessionRefreshed(Err(e)) => {
                self.refreshing = false;
                tracing::error!(error = %e, "Session refresh failed");

                let mut sets: Vec<_> = self.awaiting_session.drain().collect();
                sets.sort();
                for adapter_set in sets {
                    self.schedule_reconnect(adapter_set);
                }
            }
        }
    }

    /// Publish `Reconnecting` and arm a backoff timer for the adapter set.
    fn schedule_reconnect(&mut self, adapter_set: AdapterSet) {
        if self.pool.is_closed() {
            tracing::debug!(adapter_set = %adapter_set, "Pool closed, not reconnecting");
            return;
        }
        if self.pending.contains_key(&adapter_set) {
            return;
        }

        let policy = self.policy(adapter_set);
        if policy.budget_spent() {
            tracing::warn!(
                adapter_set = %adapter_set,
                attempts = policy.attempt_count(),
                "Reconnect budget spent, retrying at max delay"
            );
        }
        let delay = policy.next_delay();
        let attempt = policy.attempt_count();

        self.board.publish(adapter_set, ConnectionState::Reconnecting);
        metrics::record_reconnect(adapter_set);
        tracing::info!(
            adapter_set = %adapter_set,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending.insert(adapter_set, ticket);
        self.arm_timer(Wakeup::ReconnectDue { adapter_set, ticket }, delay);
    }

    /// Arm a timer to re-request tables the live connection refused.
    ///
    /// Skipped while a reconnect is pending, since the replacement
    /// connection rebinds every table anyway.
    fn schedule_table_retry(&mut self, adapter_set: AdapterSet) {
        if self.pool.is_closed()
            || self.pending.contains_key(&adapter_set)
            || self.pending_tables.contains_key(&adapter_set)
        {
            return;
        }

        let policy = self.table_policy(adapter_set);
        let delay = policy.next_delay();
        tracing::info!(
            adapter_set = %adapter_set,
            attempt = policy.attempt_count(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling table retry"
        );

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending_tables.insert(adapter_set, ticket);
        self.arm_timer(Wakeup::TableRetryDue { adapter_set, ticket }, delay);
    }

    fn arm_timer(&self, wakeup: Wakeup, delay: Duration) {
        let tx = self.wakeup_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(wakeup);
                }
            }
        });
    }

    fn reconnect_now(&self, adapter_set: AdapterSet) {
        if !self.pool.reconnect(adapter_set) {
            tracing::debug!(adapter_set = %adapter_set, "Pool closed, reconnect skipped");
        }
    }

    fn policy(&mut self, adapter_set: AdapterSet) -> &mut ReconnectPolicy {
        let config = &self.config;
        self.policies
            .entry(adapter_set)
            .or_insert_with(|| ReconnectPolicy::new(config.clone()))
    }

    fn table_policy(&mut self, adapter_set: AdapterSet) -> &mut ReconnectPolicy {
        let config = &self.config;
        self.table_policies
            .entry(adapter_set)
            .or_insert_with(|| ReconnectPolicy::new(config.clone()))
    }
}

impl std::fmt::Debug for ReconnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectionSupervisor")
            .field("pending", &self.pending)
            .field("pending_tables", &self.pending_tables)
            .field("refreshing", &self.refreshing)
            .finish_non_exhaustive()
    }
}
