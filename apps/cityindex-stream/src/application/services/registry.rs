//! Subscription Registry
//!
//! Keyed, reference-counted fan-out for one channel category. Many
//! listeners on the same normalized key share one transport table; the
//! table is created with the first listener and deleted with the last.
//!
//! # Locking
//!
//! Bookkeeping is mutated under the registry lock. Transport calls (table
//! creation and deletion) and listener callbacks always run outside it, so
//! a callback may call `listen` or `unlisten` on the same registry, even
//! for the key being dispatched.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::channels::ChannelKind;
use super::errors::{CallbackError, StreamingError};
use super::pool::{ConnectionPool, TableBinder};
use crate::application::ports::{StreamConnection, StreamTable, TableRequest, UpdateHook};
use crate::domain::records::StreamRecord;
use crate::domain::schema::decode_row;
use crate::domain::streaming::{AdapterSet, Category, ChannelKey, SubscriptionMode};
use crate::domain::subscription::{ListenerBook, ListenerId, SubscriptionChange, SubscriptionStats};
use crate::infrastructure::metrics;

/// Listener callback for records of type `R`.
pub type Listener<R> = Arc<dyn Fn(&R) + Send + Sync>;

// Distinguishes registries so a token only detaches from its issuer.
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `listen`; pass it to `unlisten` to detach.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerToken {
    registry: u64,
    id: ListenerId,
    key: ChannelKey,
    category: Category,
}

impl ListenerToken {
    /// Normalized key the listener is attached to.
    #[must_use]
    pub const fn key(&self) -> &ChannelKey {
        &self.key
    }

    /// Category of the registry that issued the token.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }
}

/// Table request options shared by every table of a registry.
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Subscription mode.
    pub mode: SubscriptionMode,
    /// Request an initial snapshot.
    pub snapshot: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            mode: SubscriptionMode::Merge,
            snapshot: true,
        }
    }
}

// =============================================================================
// Registry State
// =============================================================================

struct Binding {
    generation: u64,
    table: Box<dyn StreamTable>,
}

struct RegistryState<R> {
    book: ListenerBook<Listener<R>>,
    // Keys present in `book` but absent here are waiting for a connection.
    tables: HashMap<ChannelKey, Binding>,
}

struct RegistryCore<C: ChannelKind> {
    id: u64,
    pool: Arc<ConnectionPool>,
    options: TableOptions,
    state: Mutex<RegistryState<C::Record>>,
    next_id: AtomicU64,
    self_ref: Weak<Self>,
    _kind: PhantomData<fn() -> C>,
}

/// Reference-counted listener registry for one channel category.
pub struct SubscriptionRegistry<C: ChannelKind> {
    core: Arc<RegistryCore<C>>,
}

impl<C: ChannelKind> SubscriptionRegistry<C> {
    /// Create a registry bound to `pool` and attach it for rebinding.
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>, options: TableOptions) -> Self {
        let core = Arc::new_cyclic(|self_ref| RegistryCore {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            pool: Arc::clone(&pool),
            options,
            state: Mutex::new(RegistryState {
                book: ListenerBook::new(),
                tables: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            self_ref: self_ref.clone(),
            _kind: PhantomData,
        });

        pool.attach(Arc::downgrade(&core) as Weak<dyn TableBinder>);

        Self { core }
    }

    /// Attach `callback` to the channel identified by `key`.
    ///
    /// The first listener on a key requests a table from the shared
    /// connection. Transport failures are not reported here; a refused
    /// table is requested again after a backoff, and every table is
    /// restored once a dropped connection recovers.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::PoolClosed`] if the client was stopped and
    /// [`StreamingError::EmptyKey`] if `key` names no item.
    pub fn listen<K, F>(&self, key: K, callback: F) -> Result<ListenerToken, StreamingError>
    where
        K: Into<C::Key>,
        F: Fn(&C::Record) + Send + Sync + 'static,
    {
        self.core.listen(C::normalize(key.into()), Arc::new(callback))
    }

    /// Detach a listener. The last listener on a key deletes its table.
    ///
    /// Returns `false` (and does nothing) if the token is not registered,
    /// including tokens already removed or issued by another registry.
    pub fn unlisten(&self, token: &ListenerToken) -> bool {
        if token.registry != self.core.id || token.category != C::CATEGORY {
            return false;
        }
        self.core.unlisten(&token.key, token.id)
    }

    /// Keys with at least one listener.
    #[must_use]
    pub fn active_keys(&self) -> Vec<ChannelKey> {
        self.core.state.lock().book.keys()
    }

    /// Listeners attached to the key `key` normalizes to.
    #[must_use]
    pub fn listener_count(&self, key: impl Into<C::Key>) -> usize {
        let key = C::normalize(key.into());
        self.core.state.lock().book.listener_count(&key)
    }

    /// Keys with a live transport table.
    #[must_use]
    pub fn bound_keys(&self) -> Vec<ChannelKey> {
        let mut keys: Vec<_> = self.core.state.lock().tables.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Listener and channel counts.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        self.core.state.lock().book.stats()
    }

    /// Category served.
    #[must_use]
    pub const fn category(&self) -> Category {
        C::CATEGORY
    }
}

impl<C: ChannelKind<Key = ()>> SubscriptionRegistry<C> {
    /// [`Self::listen`] for single-channel categories.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::PoolClosed`] if the client was stopped.
    pub fn listen_all<F>(&self, callback: F) -> Result<ListenerToken, StreamingError>
    where
        F: Fn(&C::Record) + Send + Sync + 'static,
    {
        self.listen((), callback)
    }
}

impl<C: ChannelKind> fmt::Debug for SubscriptionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("category", &C::CATEGORY)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Core
// =============================================================================

impl<C: ChannelKind> RegistryCore<C> {
    fn listen(
        &self,
        key: ChannelKey,
        listener: Listener<C::Record>,
    ) -> Result<ListenerToken, StreamingError> {
        if self.pool.is_closed() {
            return Err(StreamingError::PoolClosed);
        }
        if key.is_empty() {
            return Err(StreamingError::EmptyKey(C::CATEGORY));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let change = {
            let mut state = self.state.lock();
            let change = state.book.add(&key, id, listener);
            metrics::set_active_subscriptions(C::CATEGORY, state.book.stats().channel_count);
            change
        };

        if change == SubscriptionChange::Created {
            tracing::debug!(category = %C::CATEGORY, key = %key, "First listener, requesting table");
            if let Err(e) = self.bind(&key) {
                self.unlisten(&key, id);
                return Err(e);
            }
        }

        Ok(ListenerToken {
            registry: self.id,
            id,
            key,
            category: C::CATEGORY,
        })
    }

    fn unlisten(&self, key: &ChannelKey, id: ListenerId) -> bool {
        let (change, released) = {
            let mut state = self.state.lock();
            let change = state.book.remove(key, id);
            let released = if change == SubscriptionChange::Removed {
                state.tables.remove(key)
            } else {
                None
            };
            metrics::set_active_subscriptions(C::CATEGORY, state.book.stats().channel_count);
            (change, released)
        };

        if let Some(binding) = released {
            tracing::debug!(category = %C::CATEGORY, key = %key, "Last listener gone, deleting table");
            self.delete(binding);
        }

        change != SubscriptionChange::NotFound
    }

    /// Request a table for `key` on the current connection, if any.
    fn bind(&self, key: &ChannelKey) -> Result<(), StreamingError> {
        let Some((connection, generation)) = self.pool.connection(C::CATEGORY.adapter_set())? else {
            tracing::debug!(
                category = %C::CATEGORY,
                key = %key,
                "No live connection, table deferred until reconnect"
            );
            return Ok(());
        };

        if let Some(binding) = self.create_table(&connection, key, generation) {
            self.attach(key, binding);
        }
        Ok(())
    }

    fn create_table(
        &self,
        connection: &Arc<dyn StreamConnection>,
        key: &ChannelKey,
        generation: u64,
    ) -> Option<Binding> {
        let request = TableRequest {
            data_adapter: C::CATEGORY.data_adapter(),
            items: key.clone(),
            mode: self.options.mode,
            schema: C::Record::SCHEMA,
            snapshot: self.options.snapshot,
        };

        match connection.create_table(request, self.update_hook(key)) {
            Ok(table) => {
                metrics::record_table_created(C::CATEGORY);
                Some(Binding { generation, table })
            }
            Err(e) => {
                tracing::warn!(
                    category = %C::CATEGORY,
                    key = %key,
                    generation,
                    error = %e,
                    "Table request failed, retry scheduled"
                );
                metrics::record_table_failed(C::CATEGORY);
                self.pool
                    .report_table_failure(C::CATEGORY.adapter_set(), generation);
                None
            }
        }
    }

    /// Store a freshly created table, unless the key lost its listeners
    /// meanwhile or already holds a table from a newer connection.
    fn attach(&self, key: &ChannelKey, binding: Binding) {
        let discard = {
            let mut state = self.state.lock();
            let superseded = state
                .tables
                .get(key)
                .is_some_and(|current| current.generation >= binding.generation);
            if !state.book.contains_key(key) || superseded {
                Some(binding)
            } else {
                state.tables.insert(key.clone(), binding)
            }
        };

        if let Some(stale) = discard {
            self.delete(stale);
        }
    }

    fn delete(&self, binding: Binding) {
        binding.table.delete();
        metrics::record_table_deleted(C::CATEGORY);
    }

    fn update_hook(&self, key: &ChannelKey) -> UpdateHook {
        let core = self.self_ref.clone();
        let key = key.clone();
        Arc::new(move |item: &str, row: &[Option<String>]| {
            if let Some(core) = core.upgrade() {
                core.dispatch(&key, item, row);
            }
        })
    }

    /// Decode one row and deliver it to every listener on `key`.
    fn dispatch(&self, key: &ChannelKey, item: &str, row: &[Option<String>]) {
        let record = match decode_row(C::Record::SCHEMA, row) {
            Ok(record) => C::Record::from_record(&record),
            Err(e) => {
                tracing::warn!(
                    category = %C::CATEGORY,
                    key = %key,
                    item,
                    error = %e,
                    "Dropping undecodable update"
                );
                metrics::record_decode_error(C::CATEGORY);
                return;
            }
        };

        let listeners = self.state.lock().book.snapshot(key);
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&record))) {
                let error = CallbackError::from_panic(C::CATEGORY, key, &*payload);
                tracing::error!(category = %C::CATEGORY, key = %key, item, error = %error, "Listener failed");
                metrics::record_callback_failure(C::CATEGORY);
            }
        }
        metrics::record_update_dispatched(C::CATEGORY);
    }
}

impl<C: ChannelKind> TableBinder for RegistryCore<C> {
    fn adapter_set(&self) -> AdapterSet {
        C::CATEGORY.adapter_set()
    }

    fn rebind(&self, connection: &Arc<dyn StreamConnection>, generation: u64) {
        let keys: Vec<_> = {
            let state = self.state.lock();
            state
                .book
                .keys()
                .into_iter()
                .filter(|key| {
                    state
                        .tables
                        .get(key)
                        .is_none_or(|binding| binding.generation < generation)
                })
                .collect()
        };
        if keys.is_empty() {
            return;
        }

        tracing::info!(
            category = %C::CATEGORY,
            generation,
            tables = keys.len(),
            "Binding tables on connection"
        );
        for key in keys {
            if let Some(binding) = self.create_table(connection, &key, generation) {
                self.attach(&key, binding);
            }
        }
    }

    fn clear(&self) {
        let released: Vec<_> = self.state.lock().tables.drain().map(|(_, b)| b).collect();
        for binding in released {
            self.delete(binding);
        }
    }
}
