//! Connection Pool
//!
//! One push connection per adapter set, created on first demand and shared
//! by every registry routed through that adapter set.
//!
//! Each connection is stamped with a generation number. The supervisor
//! drops events whose generation is not the slot's current one, so a
//! retired connection reporting `Disconnected` cannot trigger a second
//! reconnect.
//!
//! Lock discipline: the pool lock is never held while calling into a
//! registry, and registries never hold their own lock while calling the
//! pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::errors::StreamingError;
use crate::application::ports::{
    ConnectionEvent, ConnectionEventKind, StateSink, StreamConnection, StreamTransport,
};
use crate::domain::session::Session;
use crate::domain::streaming::{AdapterSet, ConnectionState};
use crate::infrastructure::metrics;

/// A live connection together with the generation that created it.
pub type PooledConnection = (Arc<dyn StreamConnection>, u64);

/// Implemented by registries so the pool can move their tables onto a
/// replacement connection.
pub trait TableBinder: Send + Sync {
    /// Adapter set whose connection this binder's tables live on.
    fn adapter_set(&self) -> AdapterSet;

    /// Re-create every live table on `connection` that is not already
    /// bound at `generation`.
    fn rebind(&self, connection: &Arc<dyn StreamConnection>, generation: u64);

    /// Drop every table binding; the pool is closing.
    fn clear(&self);
}

struct Slot {
    generation: u64,
    connection: Option<Arc<dyn StreamConnection>>,
}

#[derive(Default)]
struct PoolInner {
    slots: HashMap<AdapterSet, Slot>,
    binders: Vec<Weak<dyn TableBinder>>,
}

/// Lazily created, shared connections keyed by adapter set.
pub struct ConnectionPool {
    transport: Arc<dyn StreamTransport>,
    session: RwLock<Session>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    inner: Mutex<PoolInner>,
    stopped: AtomicBool,
    next_generation: AtomicU64,
}

impl ConnectionPool {
    /// Create an empty pool. Connection events are sent to `events`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        session: Session,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            transport,
            session: RwLock::new(session),
            events,
            inner: Mutex::new(PoolInner::default()),
            stopped: AtomicBool::new(false),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Shared connection for an adapter set, creating it on first use.
    ///
    /// Returns `Ok(None)` while the adapter set has no live connection
    /// (session creation failed and a reconnect is pending); registries
    /// bind their tables when the reconnect succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::PoolClosed`] after [`Self::close_all`].
    pub fn connection(&self, adapter_set: AdapterSet) -> Result<Option<PooledConnection>, StreamingError> {
        if self.is_closed() {
            return Err(StreamingError::PoolClosed);
        }

        // Creation happens under the pool lock: two callers racing on the
        // same adapter set get the same connection.
        let mut inner = self.inner.lock();
        if self.is_closed() {
            return Err(StreamingError::PoolClosed);
        }

        if let Some(slot) = inner.slots.get(&adapter_set) {
            return Ok(slot
                .connection
                .as_ref()
                .map(|conn| (Arc::clone(conn), slot.generation)));
        }

        let slot = self.establish(adapter_set);
        let pooled = slot
            .connection
            .as_ref()
            .map(|conn| (Arc::clone(conn), slot.generation));
        inner.slots.insert(adapter_set, slot);
        Ok(pooled)
    }

    /// Replace the connection for an adapter set with a new generation and
    /// move every attached registry's tables onto it.
    ///
    /// Returns `false` if the pool is closed.
    pub fn reconnect(&self, adapter_set: AdapterSet) -> bool {
        let (retired, fresh, binders) = {
            let mut inner = self.inner.lock();
            if self.is_closed() {
                return false;
            }

            let retired = inner
                .slots
                .get_mut(&adapter_set)
                .and_then(|slot| slot.connection.take());
            let slot = self.establish(adapter_set);
            let fresh = slot
                .connection
                .as_ref()
                .map(|conn| (Arc::clone(conn), slot.generation));
            inner.slots.insert(adapter_set, slot);

            inner.binders.retain(|binder| binder.strong_count() > 0);
            let binders: Vec<_> = inner.binders.iter().filter_map(Weak::upgrade).collect();
            (retired, fresh, binders)
        };

        if let Some(old) = retired {
            old.destroy();
        }

        if let Some((connection, generation)) = fresh {
            for binder in binders
                .iter()
                .filter(|binder| binder.adapter_set() == adapter_set)
            {
                binder.rebind(&connection, generation);
            }
        }

        true
    }

    /// Report that `connection` refused a table request. The supervisor
    /// schedules [`Self::retry_tables`] unless a reconnect is already due.
    pub fn report_table_failure(&self, adapter_set: AdapterSet, generation: u64) {
        let event = ConnectionEvent {
            adapter_set,
            generation,
            kind: ConnectionEventKind::TableFailed,
        };
        if self.events.send(event).is_err() {
            tracing::trace!(adapter_set = %adapter_set, "Supervisor gone, table failure dropped");
        }
    }

    /// Ask every attached registry of the adapter set to bind its unbound
    /// tables on the current connection.
    ///
    /// Returns `false` if the pool is closed or the adapter set has no
    /// live connection.
    pub fn retry_tables(&self, adapter_set: AdapterSet) -> bool {
        let (connection, generation, binders) = {
            let mut inner = self.inner.lock();
            if self.is_closed() {
                return false;
            }
            let Some((connection, generation)) = inner.slots.get(&adapter_set).and_then(|slot| {
                slot.connection
                    .as_ref()
                    .map(|conn| (Arc::clone(conn), slot.generation))
            }) else {
                return false;
            };
            inner.binders.retain(|binder| binder.strong_count() > 0);
            let binders: Vec<_> = inner.binders.iter().filter_map(Weak::upgrade).collect();
            (connection, generation, binders)
        };

        for binder in binders
            .iter()
            .filter(|binder| binder.adapter_set() == adapter_set)
        {
            binder.rebind(&connection, generation);
        }
        true
    }

    /// Register a registry for rebinding after reconnects.
    pub fn attach(&self, binder: Weak<dyn TableBinder>) {
        self.inner.lock().binders.push(binder);
    }

    /// Current generation for an adapter set, `None` if no connection was
    /// ever requested or the pool is closed.
    #[must_use]
    pub fn generation(&self, adapter_set: AdapterSet) -> Option<u64> {
        if self.is_closed() {
            return None;
        }
        self.inner
            .lock()
            .slots
            .get(&adapter_set)
            .map(|slot| slot.generation)
    }

    /// Adapter sets with a connection slot.
    #[must_use]
    pub fn adapter_sets(&self) -> Vec<AdapterSet> {
        let mut sets: Vec<_> = self.inner.lock().slots.keys().copied().collect();
        sets.sort();
        sets
    }

    /// Session used for new connections.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Replace the session used for future connections.
    pub fn set_session(&self, session: Session) {
        *self.session.write() = session;
    }

    /// True once [`Self::close_all`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop the pool: no further connections are created, every live
    /// connection is destroyed and registries drop their tables. With
    /// `wait`, resolves once every connection has confirmed it closed.
    pub async fn close_all(&self, wait: bool) {
        let already_stopped = self.stopped.swap(true, Ordering::AcqRel);

        let (connections, binders) = {
            let mut inner = self.inner.lock();
            let connections: Vec<_> = inner
                .slots
                .values_mut()
                .filter_map(|slot| slot.connection.take())
                .collect();
            let binders: Vec<_> = inner.binders.drain(..).filter_map(|b| Weak::upgrade(&b)).collect();
            (connections, binders)
        };

        if !already_stopped {
            tracing::info!(connections = connections.len(), wait, "Closing connection pool");
        }

        for binder in &binders {
            binder.clear();
        }
        for connection in &connections {
            connection.destroy();
        }

        if wait {
            join_all(connections.iter().map(|connection| connection.join())).await;
            tracing::debug!("All connections closed");
        }
    }

    /// Open a session for an adapter set under a fresh generation.
    ///
    /// Called with the pool lock held.
    fn establish(&self, adapter_set: AdapterSet) -> Slot {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let sink = StateSink::new(adapter_set, generation, self.events.clone());
        sink.publish(ConnectionState::Connecting);

        let session = self.session();
        match self.transport.create_session(&session, adapter_set, sink.clone()) {
            Ok(connection) => {
                tracing::info!(
                    adapter_set = %adapter_set,
                    generation,
                    username = session.username(),
                    "Stream session requested"
                );
                metrics::record_session_created(adapter_set);
                Slot {
                    generation,
                    connection: Some(connection),
                }
            }
            Err(e) => {
                tracing::warn!(
                    adapter_set = %adapter_set,
                    generation,
                    error = %e,
                    "Failed to create stream session"
                );
                sink.publish(ConnectionState::Disconnected);
                Slot {
                    generation,
                    connection: None,
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("adapter_sets", &self.adapter_sets())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::infrastructure::memory::InMemoryTransport;

    fn pool_with(
        transport: &Arc<InMemoryTransport>,
    ) -> (Arc<ConnectionPool>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn StreamTransport> = Arc::clone(transport) as Arc<dyn StreamTransport>;
        let pool = Arc::new(ConnectionPool::new(transport, Session::new("user", "token"), tx));
        (pool, rx)
    }

    #[derive(Default)]
    struct RecordingBinder {
        rebinds: Mutex<Vec<u64>>,
        clears: AtomicUsize,
    }

    impl TableBinder for RecordingBinder {
        fn adapter_set(&self) -> AdapterSet {
            AdapterSet::Streaming
        }

        fn rebind(&self, _connection: &Arc<dyn StreamConnection>, generation: u64) {
            self.rebinds.lock().push(generation);
        }

        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn connection_is_created_once() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);

        let (_, first) = pool.connection(AdapterSet::Streaming).unwrap().unwrap();
        let (_, second) = pool.connection(AdapterSet::Streaming).unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.session_attempts(), 1);
        assert_eq!(pool.generation(AdapterSet::Streaming), Some(first));
    }

    #[test]
    fn concurrent_callers_share_one_connection() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let pool = Arc::clone(&pool);
                scope.spawn(move || pool.connection(AdapterSet::Account).unwrap());
            }
        });

        assert_eq!(transport.session_attempts_for(AdapterSet::Account), 1);
    }

    #[test]
    fn adapter_sets_get_separate_connections() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);

        pool.connection(AdapterSet::Streaming).unwrap();
        pool.connection(AdapterSet::Trading).unwrap();

        assert_eq!(transport.session_attempts(), 2);
        assert_eq!(
            pool.adapter_sets(),
            vec![AdapterSet::Streaming, AdapterSet::Trading]
        );
    }

    #[test]
    fn failed_session_reports_disconnected() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.set_failing(true);
        let (pool, mut rx) = pool_with(&transport);

        assert!(pool.connection(AdapterSet::Streaming).unwrap().is_none());

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ConnectionEventKind::State(ConnectionState::Connecting),
                ConnectionEventKind::State(ConnectionState::Disconnected),
            ]
        );
        // The slot exists, so a second caller does not retry on its own.
        assert!(pool.connection(AdapterSet::Streaming).unwrap().is_none());
        assert_eq!(transport.session_attempts(), 1);
    }

    #[test]
    fn reconnect_retires_old_connection_and_rebinds() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);
        let binder = Arc::new(RecordingBinder::default());
        let weak: Weak<dyn TableBinder> = Arc::downgrade(&binder) as Weak<dyn TableBinder>;
        pool.attach(weak);

        let (_, first) = pool.connection(AdapterSet::Streaming).unwrap().unwrap();
        let old = transport.latest(AdapterSet::Streaming).unwrap();

        assert!(pool.reconnect(AdapterSet::Streaming));

        let second = pool.generation(AdapterSet::Streaming).unwrap();
        assert!(second > first);
        assert!(old.is_destroyed());
        assert_eq!(*binder.rebinds.lock(), vec![second]);
        assert_eq!(transport.session_attempts(), 2);
    }

    #[test]
    fn reconnect_skips_binders_of_other_adapter_sets() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);
        let binder = Arc::new(RecordingBinder::default());
        let weak: Weak<dyn TableBinder> = Arc::downgrade(&binder) as Weak<dyn TableBinder>;
        pool.attach(weak);

        pool.connection(AdapterSet::Account).unwrap();
        pool.reconnect(AdapterSet::Account);

        assert!(binder.rebinds.lock().is_empty());
    }

    #[test]
    fn reconnect_uses_latest_session() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);

        pool.connection(AdapterSet::Streaming).unwrap();
        pool.set_session(Session::new("user", "fresh"));
        pool.reconnect(AdapterSet::Streaming);

        assert_eq!(transport.last_session().unwrap().session_id(), "fresh");
    }

    #[test]
    fn retry_tables_rebinds_on_current_connection() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, mut rx) = pool_with(&transport);
        let binder = Arc::new(RecordingBinder::default());
        pool.attach(Arc::downgrade(&binder) as Weak<dyn TableBinder>);

        assert!(!pool.retry_tables(AdapterSet::Streaming));

        let (_, generation) = pool.connection(AdapterSet::Streaming).unwrap().unwrap();
        while rx.try_recv().is_ok() {}
        pool.report_table_failure(AdapterSet::Streaming, generation);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ConnectionEventKind::TableFailed);
        assert_eq!(event.generation, generation);

        assert!(pool.retry_tables(AdapterSet::Streaming));
        assert_eq!(*binder.rebinds.lock(), vec![generation]);
        assert_eq!(transport.session_attempts(), 1);
    }

    #[tokio::test]
    async fn close_all_destroys_and_refuses() {
        let transport = Arc::new(InMemoryTransport::new());
        let (pool, _rx) = pool_with(&transport);
        let binder = Arc::new(RecordingBinder::default());
        let weak: Weak<dyn TableBinder> = Arc::downgrade(&binder) as Weak<dyn TableBinder>;
        pool.attach(weak);

        pool.connection(AdapterSet::Streaming).unwrap();
        pool.connection(AdapterSet::Account).unwrap();

        pool.close_all(true).await;

        assert!(pool.is_closed());
        assert!(transport.connections().iter().all(|conn| conn.is_destroyed()));
        assert_eq!(binder.clears.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pool.connection(AdapterSet::Streaming),
            Err(StreamingError::PoolClosed)
        ));
        assert_eq!(pool.generation(AdapterSet::Streaming), None);
        assert!(!pool.reconnect(AdapterSet::Streaming));

        // Second close is harmless.
        pool.close_all(true).await;
    }
}
