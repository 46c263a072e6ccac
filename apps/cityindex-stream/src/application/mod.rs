//! Application Layer - Ports and the streaming services built on them.

/// Port interfaces for the push transport and session refresh.
pub mod ports;

/// Registries, connection pool, reconnection supervisor and facade.
pub mod services;
