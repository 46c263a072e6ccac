//! Typed Records
//!
//! One struct per channel category, built from a decoded [`Record`]. Each
//! type carries its wire schema; the column order of every schema below is
//! the order the server sends and must not be changed.
//!
//! All fields are optional: in merge mode the server omits unchanged
//! columns, and any column may be null.

mod margin;
mod news;
mod order;
mod price;
mod quote;

pub use margin::{AccountMargin, TradeMargin};
pub use news::NewsHeadline;
pub use order::{Order, OrderStatus};
pub use price::Price;
pub use quote::Quote;

use super::schema::{FieldSchema, Record};

/// A record type decoded from one category's rows.
pub trait StreamRecord: Send + Sync + Sized + 'static {
    /// Wire columns, in order.
    const SCHEMA: &'static FieldSchema;

    /// Build the typed record from a row decoded against [`Self::SCHEMA`].
    fn from_record(record: &Record) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::decode_row;

    fn names<T: StreamRecord>() -> Vec<&'static str> {
        T::SCHEMA.iter().map(|spec| spec.name).collect()
    }

    #[test]
    fn price_schema_order() {
        assert_eq!(
            names::<Price>(),
            [
                "MarketId",
                "TickDate",
                "Bid",
                "Offer",
                "Price",
                "High",
                "Low",
                "Change",
                "Direction",
                "AuditId",
                "StatusSummary",
            ]
        );
    }

    #[test]
    fn account_margin_schema_order() {
        assert_eq!(
            names::<AccountMargin>(),
            [
                "Cash",
                "Margin",
                "MarginIndicator",
                "NetEquity",
                "OpenTradeEquity",
                "TradeableFunds",
                "PendingFunds",
                "TradingResource",
                "TotalMarginRequirement",
                "CurrencyId",
                "CurrencyISO",
            ]
        );
    }

    #[test]
    fn trade_margin_schema_has_fifteen_columns() {
        let names = names::<TradeMargin>();
        assert_eq!(names.len(), 15);
        assert_eq!(names.first(), Some(&"ClientAccountId"));
        assert_eq!(names.last(), Some(&"Quantity"));
    }

    #[test]
    fn all_null_row_builds_empty_record() {
        let row = vec![None; Order::SCHEMA.len()];
        let record = decode_row(Order::SCHEMA, &row).unwrap();
        let order = Order::from_record(&record);
        assert_eq!(order.order_id, None);
        assert_eq!(order.status(), None);
    }
}
