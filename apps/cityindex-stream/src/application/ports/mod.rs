//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamTransport`: push-protocol sessions and tables
//! - `SessionRefresher`: re-authentication after token expiry

mod session_port;
mod stream_transport;

#[cfg(test)]
pub use session_port::MockSessionRefresher;
pub use session_port::SessionRefresher;
pub use stream_transport::{
    ConnectionEvent, ConnectionEventKind, StateSink, StreamConnection, StreamTable,
    StreamTransport, TableRequest, TransportError, UpdateHook,
};
