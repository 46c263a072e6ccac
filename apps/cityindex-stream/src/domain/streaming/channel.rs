//! Adapter sets, data adapters and channel keys.

use std::fmt;

use serde::Serialize;

// =============================================================================
// Adapter Sets
// =============================================================================

/// Server-side adapter set. One shared connection serves every channel
/// routed through the same adapter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AdapterSet {
    /// Account streams: `CLIENTACCOUNTMARGIN.ALL`, `TRADEMARGIN.ALL`, `ORDERS.ALL`.
    Account,
    /// Default prices per operator: `AC{operatorId}`.
    DefaultPrices,
    /// Market prices and news: `PRICE.{marketId}`, `HEADLINES.{category}`.
    Streaming,
    /// Trading account quotes: `QUOTE.ALL`.
    Trading,
}

impl AdapterSet {
    /// All adapter sets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Account,
            Self::DefaultPrices,
            Self::Streaming,
            Self::Trading,
        ]
    }

    /// Wire name of the adapter set.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "STREAMINGCLIENTACCOUNT",
            Self::DefaultPrices => "CITYINDEXSTREAMINGDEFAULTPRICES",
            Self::Streaming => "CITYINDEXSTREAMING",
            Self::Trading => "STREAMINGTRADINGACCOUNT",
        }
    }
}

impl fmt::Display for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Data Adapters
// =============================================================================

/// Data adapter a table is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataAdapter {
    /// `CLIENTACCOUNTMARGIN` (account adapter set).
    ClientAccountMargin,
    /// `NEWS` (streaming adapter set).
    News,
    /// `ORDERS` (account adapter set).
    Orders,
    /// `PRICES` (streaming and default-prices adapter sets).
    Prices,
    /// `QUOTE` (trading adapter set).
    Quote,
    /// `TRADEMARGIN` (account adapter set).
    TradeMargin,
}

impl DataAdapter {
    /// Wire name of the data adapter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientAccountMargin => "CLIENTACCOUNTMARGIN",
            Self::News => "NEWS",
            Self::Orders => "ORDERS",
            Self::Prices => "PRICES",
            Self::Quote => "QUOTE",
            Self::TradeMargin => "TRADEMARGIN",
        }
    }
}

impl fmt::Display for DataAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table subscription mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionMode {
    /// Latest value per field, merged across updates.
    #[default]
    Merge,
    /// Every update delivered as a distinct event.
    Distinct,
    /// Keyed add/update/delete commands.
    Command,
    /// Unfiltered updates.
    Raw,
}

impl SubscriptionMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "MERGE",
            Self::Distinct => "DISTINCT",
            Self::Command => "COMMAND",
            Self::Raw => "RAW",
        }
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Named class of market data with its own schema and key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Market prices.
    Prices,
    /// Default prices for an operator.
    DefaultPrices,
    /// Order updates for the logged-in account.
    Orders,
    /// Client account margin.
    AccountMargin,
    /// Per-trade margin.
    TradeMargin,
    /// Trading account quotes.
    Quotes,
    /// News headlines.
    News,
}

impl Category {
    /// All categories.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Prices,
            Self::DefaultPrices,
            Self::Orders,
            Self::AccountMargin,
            Self::TradeMargin,
            Self::Quotes,
            Self::News,
        ]
    }

    /// Adapter set whose connection carries this category.
    #[must_use]
    pub const fn adapter_set(self) -> AdapterSet {
        match self {
            Self::Prices | Self::News => AdapterSet::Streaming,
            Self::DefaultPrices => AdapterSet::DefaultPrices,
            Self::Orders | Self::AccountMargin | Self::TradeMargin => AdapterSet::Account,
            Self::Quotes => AdapterSet::Trading,
        }
    }

    /// Data adapter tables of this category are requested from.
    #[must_use]
    pub const fn data_adapter(self) -> DataAdapter {
        match self {
            Self::Prices | Self::DefaultPrices => DataAdapter::Prices,
            Self::Orders => DataAdapter::Orders,
            Self::AccountMargin => DataAdapter::ClientAccountMargin,
            Self::TradeMargin => DataAdapter::TradeMargin,
            Self::Quotes => DataAdapter::Quote,
            Self::News => DataAdapter::News,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prices => "prices",
            Self::DefaultPrices => "default_prices",
            Self::Orders => "orders",
            Self::AccountMargin => "account_margin",
            Self::TradeMargin => "trade_margin",
            Self::Quotes => "quotes",
            Self::News => "news",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Channel Key
// =============================================================================

/// Normalized channel identifier; also the item id sent on the wire.
///
/// Several items merged into one subscription are joined with a single
/// space, e.g. `"PRICE.1 PRICE.2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Create a key from an already-normalized identifier.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Join several item ids into one merged key.
    #[must_use]
    pub fn merged<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for item in items {
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(item.as_ref());
        }
        Self(joined)
    }

    /// The wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual item ids making up this key.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }

    /// `true` when the key names no item at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().next().is_none()
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_without_items_is_empty() {
        assert!(ChannelKey::merged(Vec::<String>::new()).is_empty());
        assert!(ChannelKey::new(" ").is_empty());
        assert!(!ChannelKey::new("PRICE.1").is_empty());
    }

    #[test]
    fn merged_key_joins_with_spaces() {
        let key = ChannelKey::merged(["PRICE.1", "PRICE.2", "PRICE.3"]);
        assert_eq!(key.as_str(), "PRICE.1 PRICE.2 PRICE.3");
        assert_eq!(key.items().collect::<Vec<_>>(), ["PRICE.1", "PRICE.2", "PRICE.3"]);
    }

    #[test]
    fn categories_route_to_expected_adapter_sets() {
        assert_eq!(Category::Prices.adapter_set(), AdapterSet::Streaming);
        assert_eq!(Category::News.adapter_set(), AdapterSet::Streaming);
        assert_eq!(Category::DefaultPrices.adapter_set(), AdapterSet::DefaultPrices);
        assert_eq!(Category::Orders.adapter_set(), AdapterSet::Account);
        assert_eq!(Category::AccountMargin.adapter_set(), AdapterSet::Account);
        assert_eq!(Category::TradeMargin.adapter_set(), AdapterSet::Account);
        assert_eq!(Category::Quotes.adapter_set(), AdapterSet::Trading);
    }

    #[test]
    fn wire_names() {
        assert_eq!(AdapterSet::Streaming.as_str(), "CITYINDEXSTREAMING");
        assert_eq!(DataAdapter::ClientAccountMargin.as_str(), "CLIENTACCOUNTMARGIN");
        assert_eq!(SubscriptionMode::default().as_str(), "MERGE");
    }
}
