//! Stream Transport Port (Driven Port)
//!
//! Contract for the push-protocol implementation: session creation per
//! adapter set, table control requests and delivery of raw rows. The core
//! never sees wire bytes; it only hands out update hooks and receives
//! state transitions through a [`StateSink`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::schema::FieldSchema;
use crate::domain::session::Session;
use crate::domain::streaming::{AdapterSet, ChannelKey, ConnectionState, DataAdapter, SubscriptionMode};

/// Callback invoked by the transport for every inbound row of a table:
/// `(item id, positional raw values)`.
pub type UpdateHook = Arc<dyn Fn(&str, &[Option<String>]) + Send + Sync>;

/// Table subscription request.
#[derive(Debug, Clone)]
pub struct TableRequest {
    /// Data adapter serving the table.
    pub data_adapter: DataAdapter,
    /// Item ids, space-joined when several are merged into one table.
    pub items: ChannelKey,
    /// Subscription mode.
    pub mode: SubscriptionMode,
    /// Columns requested, in wire order.
    pub schema: &'static FieldSchema,
    /// Ask the server for an initial snapshot.
    pub snapshot: bool,
}

impl TableRequest {
    /// Field names to request, in wire order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        crate::domain::schema::field_names(self.schema)
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Server refused the session.
    #[error("session rejected: {message}")]
    SessionRejected {
        /// Server message.
        message: String,
    },

    /// Server could not be reached.
    #[error("stream server unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Table request refused.
    #[error("table request for {items} rejected: {message}")]
    TableRejected {
        /// Item ids requested.
        items: String,
        /// Server message.
        message: String,
    },

    /// Connection already destroyed.
    #[error("connection closed")]
    Closed,
}

// =============================================================================
// Connection Events
// =============================================================================

/// What happened on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEventKind {
    /// State transition.
    State(ConnectionState),
    /// Server reported the session token expired.
    AuthExpired,
    /// The connection refused a table request; the connection itself is
    /// still up.
    TableFailed,
}

/// Event reported by a connection, tagged with the pool generation that
/// created it so events from retired connections can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// Adapter set of the connection.
    pub adapter_set: AdapterSet,
    /// Pool generation of the connection.
    pub generation: u64,
    /// Event payload.
    pub kind: ConnectionEventKind,
}

/// Handed to [`StreamTransport::create_session`]; the transport reports
/// every state change and auth expiry of that connection through it.
///
/// Publishing never blocks and never fails; events sent after the
/// supervisor has stopped are dropped.
#[derive(Debug, Clone)]
pub struct StateSink {
    adapter_set: AdapterSet,
    generation: u64,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl StateSink {
    /// Create a sink for one connection.
    #[must_use]
    pub const fn new(
        adapter_set: AdapterSet,
        generation: u64,
        tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            adapter_set,
            generation,
            tx,
        }
    }

    /// Adapter set of the connection.
    #[must_use]
    pub const fn adapter_set(&self) -> AdapterSet {
        self.adapter_set
    }

    /// Pool generation of the connection.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a state transition.
    pub fn publish(&self, state: ConnectionState) {
        self.send(ConnectionEventKind::State(state));
    }

    /// Report that the session token was rejected as expired.
    pub fn auth_expired(&self) {
        self.send(ConnectionEventKind::AuthExpired);
    }

    fn send(&self, kind: ConnectionEventKind) {
        let event = ConnectionEvent {
            adapter_set: self.adapter_set,
            generation: self.generation,
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(
                adapter_set = %self.adapter_set,
                generation = self.generation,
                ?kind,
                "Supervisor gone, dropping connection event"
            );
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Handle to one subscribed table.
pub trait StreamTable: Send + Sync {
    /// Request deletion of the table. Idempotent.
    fn delete(&self);
}

/// One live push session.
#[async_trait]
pub trait StreamConnection: Send + Sync {
    /// Subscribe a table. Rows are delivered through `on_update` until the
    /// table is deleted or the connection is destroyed.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the request cannot be issued.
    fn create_table(
        &self,
        request: TableRequest,
        on_update: UpdateHook,
    ) -> Result<Box<dyn StreamTable>, TransportError>;

    /// Request teardown of the session. Idempotent.
    fn destroy(&self);

    /// Resolve once the session is fully closed.
    async fn join(&self);
}

/// Push-protocol implementation.
pub trait StreamTransport: Send + Sync {
    /// Open a session against one adapter set.
    ///
    /// The call returns as soon as the session is requested; the connection
    /// reports `Connected` (or `Disconnected`) later through `sink`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the session cannot even be requested.
    fn create_session(
        &self,
        session: &Session,
        adapter_set: AdapterSet,
        sink: StateSink,
    ) -> Result<Arc<dyn StreamConnection>, TransportError>;
}
