//! Domain Layer - Core streaming types and business logic.
//!
//! Channel identifiers, wire schemas, typed records and listener
//! bookkeeping. Nothing here performs I/O or spawns tasks.

/// Typed records per channel category.
pub mod records;

/// Field schemas and positional row decoding.
pub mod schema;

/// Session identity.
pub mod session;

/// Adapter sets, channel keys and connection state.
pub mod streaming;

/// Listener bookkeeping and reference counting.
pub mod subscription;
