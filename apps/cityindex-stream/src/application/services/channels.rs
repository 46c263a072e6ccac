//! Channel Kinds
//!
//! Compile-time description of each category: its record type, the key
//! callers pass to `listen` and how that key normalizes to a wire item id.
//!
//! | Kind | Key | Item id |
//! |---|---|---|
//! | [`PricesChannel`] | [`MarketIds`] | `PRICE.<id>`, space-joined |
//! | [`DefaultPricesChannel`] | operator id | `AC<id>` |
//! | [`NewsChannel`] | category name | `HEADLINES.<category>` |
//! | [`OrdersChannel`] | `()` | `ORDERS.ALL` |
//! | [`AccountMarginChannel`] | `()` | `CLIENTACCOUNTMARGIN.ALL` |
//! | [`TradeMarginChannel`] | `()` | `TRADEMARGIN.ALL` |
//! | [`QuotesChannel`] | `()` | `QUOTE.ALL` |

use crate::domain::records::{
    AccountMargin, NewsHeadline, Order, Price, Quote, StreamRecord, TradeMargin,
};
use crate::domain::streaming::{Category, ChannelKey};

/// Operator id of IFX Poland, the usual default-prices operator.
pub const IFX_POLAND_OPERATOR_ID: u32 = 2347;

/// Static description of one channel category.
pub trait ChannelKind: Send + Sync + 'static {
    /// Key accepted by `listen`.
    type Key: Send;
    /// Record delivered to listeners.
    type Record: StreamRecord;
    /// Category served.
    const CATEGORY: Category;

    /// Map a caller key to its wire item id.
    fn normalize(key: Self::Key) -> ChannelKey;
}

// =============================================================================
// Keys
// =============================================================================

/// One or more market ids merged into a single price table.
///
/// Order is preserved: `[2, 1]` and `[1, 2]` are different subscriptions.
/// An empty list is refused by `listen` with
/// [`StreamingError::EmptyKey`](super::StreamingError::EmptyKey).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketIds(Vec<u64>);

impl MarketIds {
    /// Market ids in request order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl From<u64> for MarketIds {
    fn from(id: u64) -> Self {
        Self(vec![id])
    }
}

impl From<Vec<u64>> for MarketIds {
    fn from(ids: Vec<u64>) -> Self {
        Self(ids)
    }
}

impl From<&[u64]> for MarketIds {
    fn from(ids: &[u64]) -> Self {
        Self(ids.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for MarketIds {
    fn from(ids: [u64; N]) -> Self {
        Self(ids.to_vec())
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// Market prices on `CITYINDEXSTREAMING`.
#[derive(Debug)]
pub struct PricesChannel;

impl ChannelKind for PricesChannel {
    type Key = MarketIds;
    type Record = Price;
    const CATEGORY: Category = Category::Prices;

    fn normalize(key: MarketIds) -> ChannelKey {
        ChannelKey::merged(key.0.iter().map(|id| format!("PRICE.{id}")))
    }
}

/// Default prices for an operator on `CITYINDEXSTREAMINGDEFAULTPRICES`.
#[derive(Debug)]
pub struct DefaultPricesChannel;

impl ChannelKind for DefaultPricesChannel {
    type Key = u32;
    type Record = Price;
    const CATEGORY: Category = Category::DefaultPrices;

    fn normalize(operator_id: u32) -> ChannelKey {
        ChannelKey::new(format!("AC{operator_id}"))
    }
}

/// News headlines by category on `CITYINDEXSTREAMING`.
#[derive(Debug)]
pub struct NewsChannel;

impl ChannelKind for NewsChannel {
    type Key = String;
    type Record = NewsHeadline;
    const CATEGORY: Category = Category::News;

    fn normalize(category: String) -> ChannelKey {
        ChannelKey::new(format!("HEADLINES.{}", category.trim()))
    }
}

macro_rules! single_channel {
    ($(#[$doc:meta])* $name:ident, $record:ty, $category:expr, $item:literal) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name;

        impl ChannelKind for $name {
            type Key = ();
            type Record = $record;
            const CATEGORY: Category = $category;

            fn normalize((): ()) -> ChannelKey {
                ChannelKey::new($item)
            }
        }
    };
}

single_channel!(
    /// Order updates for the logged-in account.
    OrdersChannel,
    Order,
    Category::Orders,
    "ORDERS.ALL"
);

single_channel!(
    /// Client account margin.
    AccountMarginChannel,
    AccountMargin,
    Category::AccountMargin,
    "CLIENTACCOUNTMARGIN.ALL"
);

single_channel!(
    /// Per-trade margin.
    TradeMarginChannel,
    TradeMargin,
    Category::TradeMargin,
    "TRADEMARGIN.ALL"
);

single_channel!(
    /// Trading account quotes.
    QuotesChannel,
    Quote,
    Category::Quotes,
    "QUOTE.ALL"
);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn single_market_id() {
        assert_eq!(PricesChannel::normalize(154_297_u64.into()).as_str(), "PRICE.154297");
    }

    #[test]
    fn merged_market_ids_keep_order() {
        assert_eq!(
            PricesChannel::normalize([3_u64, 1, 2].into()).as_str(),
            "PRICE.3 PRICE.1 PRICE.2"
        );
    }

    #[test]
    fn same_id_through_different_key_forms_is_one_key() {
        let from_int = PricesChannel::normalize(MarketIds::from(7_u64));
        let from_vec = PricesChannel::normalize(MarketIds::from(vec![7_u64]));
        let from_slice = PricesChannel::normalize(MarketIds::from(&[7_u64][..]));
        assert_eq!(from_int, from_vec);
        assert_eq!(from_vec, from_slice);
    }

    #[test]
    fn no_market_ids_name_no_item() {
        assert!(PricesChannel::normalize(MarketIds::from(Vec::<u64>::new())).is_empty());
        assert!(!NewsChannel::normalize(String::new()).is_empty());
    }

    #[test]
    fn default_prices_operator() {
        assert_eq!(
            DefaultPricesChannel::normalize(IFX_POLAND_OPERATOR_ID).as_str(),
            "AC2347"
        );
    }

    #[test]
    fn news_category() {
        assert_eq!(NewsChannel::normalize("UK".to_owned()).as_str(), "HEADLINES.UK");
    }

    #[test_case(OrdersChannel::normalize(()), "ORDERS.ALL" ; "orders")]
    #[test_case(AccountMarginChannel::normalize(()), "CLIENTACCOUNTMARGIN.ALL" ; "account margin")]
    #[test_case(TradeMarginChannel::normalize(()), "TRADEMARGIN.ALL" ; "trade margin")]
    #[test_case(QuotesChannel::normalize(()), "QUOTE.ALL" ; "quotes")]
    fn single_channel_constants(key: ChannelKey, expected: &str) {
        assert_eq!(key.as_str(), expected);
    }
}
