#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! CityIndex Stream - Push Subscription Multiplexer
//!
//! Client-side session and subscription layer for the CityIndex push feed.
//! Many listeners share one connection per adapter set; the first listener
//! on a channel creates its table and the last one deletes it. Rows arrive
//! as positional strings and are decoded into typed records before fan-out.
//! Dropped connections are re-established with backoff and their tables
//! restored.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Types with no I/O
//!   - `streaming`: adapter sets, categories, channel keys, connection state
//!   - `schema`: field kinds and the positional row decoder
//!   - `records`: typed records per category
//!   - `subscription`: reference-counted listener bookkeeping
//!
//! - **Application**: Ports and services
//!   - `ports`: push transport and session refresh contracts
//!   - `services`: registries, connection pool, reconnection supervisor,
//!     `StreamingClient` facade
//!
//! - **Infrastructure**: Adapters
//!   - `rest`: trading API client (login, markets, news)
//!   - `rate_limit`: leaky bucket shared by REST calls
//!   - `memory`: in-process transport
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                         ┌──────────────────┐
//!  transport row ───────► │ update hook      │──► decode_row ──► listeners
//!  (item, [Option<str>])  │ (per table)      │                  (catch_unwind)
//!                         └──────────────────┘
//!                                  ▲ create_table / delete
//!  listen / unlisten ──► SubscriptionRegistry ──► ConnectionPool ──► transport
//!                                                     │
//!  state events ◄─────────────────────────────────────┘
//!       │
//!       ▼
//!  ReconnectionSupervisor ──► StateBoard ──► on_state observers
//!       └─ backoff ──► pool.reconnect ──► registries rebind tables
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Streaming types with no I/O.
pub mod domain;

/// Application layer - Ports and streaming services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::records::{
    AccountMargin, NewsHeadline, Order, OrderStatus, Price, Quote, StreamRecord, TradeMargin,
};
pub use domain::schema::{DecodeError, FieldKind, FieldSpec, FieldValue, Record, decode_row};
pub use domain::session::{Session, SessionError};
pub use domain::streaming::{
    AdapterSet, Category, ChannelKey, ConnectionState, DataAdapter, StateSnapshot,
    SubscriptionMode,
};

// Streaming services
pub use application::ports::{SessionRefresher, StreamConnection, StreamTable, StreamTransport};
pub use application::services::{
    CallbackError, IFX_POLAND_OPERATOR_ID, ListenerToken, MarketIds, ObserverToken,
    ReconnectConfig, StreamingClient, StreamingError, StreamingOptions, SubscriptionRegistry,
    TableOptions,
};

// Infrastructure
pub use infrastructure::config::{ClientConfig, ConfigError, Credentials, Environment};
pub use infrastructure::memory::{InMemoryConnection, InMemoryTransport};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::rate_limit::LeakyBucket;
pub use infrastructure::rest::{RestClient, RestError};
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
