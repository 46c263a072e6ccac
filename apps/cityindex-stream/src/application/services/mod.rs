//! Application Services
//!
//! - [`SubscriptionRegistry`]: per-category listener bookkeeping and fan-out
//! - [`ConnectionPool`]: one shared connection per adapter set
//! - [`ReconnectionSupervisor`]: reacts to connection events and reconnects
//! - [`StreamingClient`]: wires everything together

mod channels;
mod errors;
mod facade;
mod pool;
mod reconnect;
mod registry;
mod state_board;
mod supervisor;

pub use channels::{
    AccountMarginChannel, ChannelKind, DefaultPricesChannel, IFX_POLAND_OPERATOR_ID, MarketIds,
    NewsChannel, OrdersChannel, PricesChannel, QuotesChannel, TradeMarginChannel,
};
pub use errors::{CallbackError, StreamingError};
pub use facade::{StreamingClient, StreamingOptions};
pub use pool::{ConnectionPool, PooledConnection, TableBinder};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use registry::{Listener, ListenerToken, SubscriptionRegistry, TableOptions};
pub use state_board::{ObserverToken, StateBoard, StateObserver};
pub use supervisor::ReconnectionSupervisor;
