//! In-Memory Transport
//!
//! A [`StreamTransport`] that keeps every session and table in process.
//! Used to drive the streaming layer without a push server: tests push
//! rows, flip connection states and expire sessions by hand.
//!
//! ```ignore
//! let transport = Arc::new(InMemoryTransport::new());
//! let client = StreamingClient::start(options, transport.clone(), session, None)?;
//! client.prices().listen(154_297_u64, |price| println!("{price:?}"))?;
//!
//! let conn = transport.latest(AdapterSet::Streaming).unwrap();
//! conn.push("PRICE.154297", &[Some("154297"), None, Some("1.2345")]);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::application::ports::{
    StateSink, StreamConnection, StreamTable, StreamTransport, TableRequest, TransportError,
    UpdateHook,
};
use crate::domain::session::Session;
use crate::domain::streaming::{AdapterSet, ConnectionState};

// =============================================================================
// Transport
// =============================================================================

#[derive(Default)]
struct TransportState {
    attempts: Vec<(AdapterSet, Session)>,
    connections: Vec<Arc<InMemoryConnection>>,
}

/// In-process push transport.
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
    failing: AtomicBool,
    manual_connect: AtomicBool,
}

impl InMemoryTransport {
    /// Transport whose sessions report `Connected` immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TransportState::default()),
            failing: AtomicBool::new(false),
            manual_connect: AtomicBool::new(false),
        }
    }

    /// Make every following session request fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Leave new sessions in `Connecting` until [`InMemoryConnection::set_state`]
    /// is called.
    pub fn set_manual_connect(&self, manual: bool) {
        self.manual_connect.store(manual, Ordering::SeqCst);
    }

    /// Session requests made so far, including failed ones.
    #[must_use]
    pub fn session_attempts(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// Session requests made for one adapter set.
    #[must_use]
    pub fn session_attempts_for(&self, adapter_set: AdapterSet) -> usize {
        self.state
            .lock()
            .attempts
            .iter()
            .filter(|(set, _)| *set == adapter_set)
            .count()
    }

    /// Session token used by the most recent request.
    #[must_use]
    pub fn last_session(&self) -> Option<Session> {
        self.state
            .lock()
            .attempts
            .last()
            .map(|(_, session)| session.clone())
    }

    /// Every connection created, oldest first.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<InMemoryConnection>> {
        self.state.lock().connections.clone()
    }

    /// Most recent connection for an adapter set.
    #[must_use]
    pub fn latest(&self, adapter_set: AdapterSet) -> Option<Arc<InMemoryConnection>> {
        self.state
            .lock()
            .connections
            .iter()
            .rev()
            .find(|conn| conn.adapter_set == adapter_set)
            .cloned()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransport for InMemoryTransport {
    fn create_session(
        &self,
        session: &Session,
        adapter_set: AdapterSet,
        sink: StateSink,
    ) -> Result<Arc<dyn StreamConnection>, TransportError> {
        let mut state = self.state.lock();
        state.attempts.push((adapter_set, session.clone()));

        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable {
                message: "in-memory transport set to fail".to_string(),
            });
        }

        let connection = Arc::new(InMemoryConnection::new(adapter_set, session.clone(), sink));
        if !self.manual_connect.load(Ordering::SeqCst) {
            connection.set_state(ConnectionState::Connected);
        }
        state.connections.push(Arc::clone(&connection));
        Ok(connection)
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryTransport")
            .field("attempts", &state.attempts.len())
            .field("connections", &state.connections.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection
// =============================================================================

struct TableEntry {
    request: TableRequest,
    hook: UpdateHook,
}

type TableMap = Arc<Mutex<BTreeMap<u64, TableEntry>>>;

/// One in-process session.
pub struct InMemoryConnection {
    adapter_set: AdapterSet,
    session: Session,
    sink: StateSink,
    tables: TableMap,
    next_table: AtomicU64,
    tables_created: AtomicUsize,
    tables_deleted: Arc<AtomicUsize>,
    reject_tables: AtomicBool,
    closed: watch::Sender<bool>,
}

impl InMemoryConnection {
    fn new(adapter_set: AdapterSet, session: Session, sink: StateSink) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            adapter_set,
            session,
            sink,
            tables: Arc::new(Mutex::new(BTreeMap::new())),
            next_table: AtomicU64::new(1),
            tables_created: AtomicUsize::new(0),
            tables_deleted: Arc::new(AtomicUsize::new(0)),
            reject_tables: AtomicBool::new(false),
            closed,
        }
    }

    /// Adapter set this session serves.
    #[must_use]
    pub const fn adapter_set(&self) -> AdapterSet {
        self.adapter_set
    }

    /// Session the connection was opened with.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Pool generation that created the connection.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.sink.generation()
    }

    /// Report a state transition, as the server connection would.
    pub fn set_state(&self, state: ConnectionState) {
        self.sink.publish(state);
    }

    /// Report that the server rejected the session token.
    pub fn expire_auth(&self) {
        self.sink.auth_expired();
    }

    /// Refuse every following table request.
    pub fn set_reject_tables(&self, reject: bool) {
        self.reject_tables.store(reject, Ordering::SeqCst);
    }

    /// Deliver a row to every live table subscribed to `item`.
    ///
    /// Returns the number of tables that received it.
    pub fn push(&self, item: &str, values: &[Option<&str>]) -> usize {
        let row: Vec<Option<String>> = values.iter().map(|v| v.map(str::to_owned)).collect();
        let hooks: Vec<UpdateHook> = self
            .tables
            .lock()
            .values()
            .filter(|entry| entry.request.items.items().any(|i| i == item))
            .map(|entry| Arc::clone(&entry.hook))
            .collect();

        for hook in &hooks {
            hook(item, &row);
        }
        hooks.len()
    }

    /// Requests of the tables currently live, in creation order.
    #[must_use]
    pub fn live_tables(&self) -> Vec<TableRequest> {
        self.tables
            .lock()
            .values()
            .map(|entry| entry.request.clone())
            .collect()
    }

    /// Tables created over the connection's lifetime.
    #[must_use]
    pub fn tables_created(&self) -> usize {
        self.tables_created.load(Ordering::SeqCst)
    }

    /// Tables deleted by their owners.
    #[must_use]
    pub fn tables_deleted(&self) -> usize {
        self.tables_deleted.load(Ordering::SeqCst)
    }

    /// True once [`StreamConnection::destroy`] was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl StreamConnection for InMemoryConnection {
    fn create_table(
        &self,
        request: TableRequest,
        on_update: UpdateHook,
    ) -> Result<Box<dyn StreamTable>, TransportError> {
        if self.is_destroyed() {
            return Err(TransportError::Closed);
        }
        if self.reject_tables.load(Ordering::SeqCst) {
            return Err(TransportError::TableRejected {
                items: request.items.to_string(),
                message: "rejected by in-memory transport".to_string(),
            });
        }

        let id = self.next_table.fetch_add(1, Ordering::Relaxed);
        self.tables.lock().insert(
            id,
            TableEntry {
                request,
                hook: on_update,
            },
        );
        self.tables_created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(InMemoryTable {
            id,
            tables: Arc::clone(&self.tables),
            deleted: Arc::clone(&self.tables_deleted),
        }))
    }

    fn destroy(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        self.tables.lock().clear();
        self.sink.publish(ConnectionState::Disconnected);
    }

    async fn join(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this only ends once closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl std::fmt::Debug for InMemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConnection")
            .field("adapter_set", &self.adapter_set)
            .field("generation", &self.generation())
            .field("tables", &self.tables.lock().len())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Table
// =============================================================================

struct InMemoryTable {
    id: u64,
    tables: TableMap,
    deleted: Arc<AtomicUsize>,
}

impl StreamTable for InMemoryTable {
    fn delete(&self) {
        if self.tables.lock().remove(&self.id).is_some() {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
    }
}
