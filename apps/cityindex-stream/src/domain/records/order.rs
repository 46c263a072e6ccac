use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::StreamRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, Record};

const ORDER_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("OrderId", FieldKind::Int),
    FieldSpec::new("MarketId", FieldKind::Int),
    FieldSpec::new("ClientAccountId", FieldKind::Int),
    FieldSpec::new("TradingAccountId", FieldKind::Int),
    FieldSpec::new("CurrencyId", FieldKind::Int),
    FieldSpec::new("CurrencyISO", FieldKind::Text),
    FieldSpec::new("Direction", FieldKind::Int),
    FieldSpec::new("AutoRollover", FieldKind::Bool),
    FieldSpec::new("ExecutionPrice", FieldKind::Decimal),
    FieldSpec::new("LastChangedTime", FieldKind::Timestamp),
    FieldSpec::new("OpenPrice", FieldKind::Decimal),
    FieldSpec::new("OriginalLastChangedDateTime", FieldKind::Timestamp),
    FieldSpec::new("OriginalQuantity", FieldKind::Decimal),
    FieldSpec::new("PositionMethodId", FieldKind::Int),
    FieldSpec::new("Quantity", FieldKind::Decimal),
    FieldSpec::new("Type", FieldKind::Int),
    FieldSpec::new("Status", FieldKind::Int),
    FieldSpec::new("ReasonId", FieldKind::Int),
];

/// Server-side order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderStatus {
    /// Awaiting acceptance.
    Pending,
    /// Accepted by the dealer.
    Accepted,
    /// Working.
    Open,
    /// Cancelled by the client.
    Cancelled,
    /// Rejected by the dealer.
    Rejected,
    /// Suspended.
    Suspended,
    /// Awaiting manual review.
    YellowCard,
    /// Filled and closed.
    Closed,
    /// Refused after review.
    RedCard,
    /// Stop or limit triggered.
    Triggered,
}

impl OrderStatus {
    /// Map a wire status code. Code 7 is unused by the server.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Pending),
            2 => Some(Self::Accepted),
            3 => Some(Self::Open),
            4 => Some(Self::Cancelled),
            5 => Some(Self::Rejected),
            6 => Some(Self::Suspended),
            8 => Some(Self::YellowCard),
            9 => Some(Self::Closed),
            10 => Some(Self::RedCard),
            11 => Some(Self::Triggered),
            _ => None,
        }
    }

    /// Wire status code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Pending => 1,
            Self::Accepted => 2,
            Self::Open => 3,
            Self::Cancelled => 4,
            Self::Rejected => 5,
            Self::Suspended => 6,
            Self::YellowCard => 8,
            Self::Closed => 9,
            Self::RedCard => 10,
            Self::Triggered => 11,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Open => "Open",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
            Self::Suspended => "Suspended",
            Self::YellowCard => "Yellow Card",
            Self::Closed => "Closed",
            Self::RedCard => "Red Card",
            Self::Triggered => "Triggered",
        }
    }

    /// True once the order can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Rejected | Self::Closed | Self::RedCard
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Order update for the logged-in account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Order {
    /// Order identifier.
    pub order_id: Option<u64>,
    /// Market.
    pub market_id: Option<u64>,
    /// Client account.
    pub client_account_id: Option<u64>,
    /// Trading account.
    pub trading_account_id: Option<u64>,
    /// Currency id.
    pub currency_id: Option<i64>,
    /// Currency ISO code.
    pub currency_iso: Option<String>,
    /// Direction id (buy/sell).
    pub direction: Option<i64>,
    /// Rolls over at expiry.
    pub auto_rollover: Option<bool>,
    /// Fill price.
    pub execution_price: Option<Decimal>,
    /// Last change time.
    pub last_changed_time: Option<DateTime<Utc>>,
    /// Price the position was opened at.
    pub open_price: Option<Decimal>,
    /// Change time of the original order.
    pub original_last_changed: Option<DateTime<Utc>>,
    /// Quantity originally requested.
    pub original_quantity: Option<Decimal>,
    /// Position method id.
    pub position_method_id: Option<i64>,
    /// Current quantity.
    pub quantity: Option<Decimal>,
    /// Order type id.
    pub order_type: Option<i64>,
    /// Raw status code; see [`Order::status`].
    pub status_code: Option<i64>,
    /// Status reason id.
    pub reason_id: Option<i64>,
}

impl Order {
    /// Decoded status, `None` if absent or unknown.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.status_code.and_then(OrderStatus::from_code)
    }
}

impl StreamRecord for Order {
    const SCHEMA: &'static FieldSchema = ORDER_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            order_id: record.uint("OrderId"),
            market_id: record.uint("MarketId"),
            client_account_id: record.uint("ClientAccountId"),
            trading_account_id: record.uint("TradingAccountId"),
            currency_id: record.int("CurrencyId"),
            currency_iso: record.text("CurrencyISO").map(str::to_owned),
            direction: record.int("Direction"),
            auto_rollover: record.bool("AutoRollover"),
            execution_price: record.decimal("ExecutionPrice"),
            last_changed_time: record.timestamp("LastChangedTime"),
            open_price: record.decimal("OpenPrice"),
            original_last_changed: record.timestamp("OriginalLastChangedDateTime"),
            original_quantity: record.decimal("OriginalQuantity"),
            position_method_id: record.int("PositionMethodId"),
            quantity: record.decimal("Quantity"),
            order_type: record.int("Type"),
            status_code: record.int("Status"),
            reason_id: record.int("ReasonId"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, OrderStatus::Pending ; "pending")]
    #[test_case(6, OrderStatus::Suspended ; "suspended")]
    #[test_case(8, OrderStatus::YellowCard ; "yellow card")]
    #[test_case(11, OrderStatus::Triggered ; "triggered")]
    fn status_codes_map_both_ways(code: i64, status: OrderStatus) {
        assert_eq!(OrderStatus::from_code(code), Some(status));
        assert_eq!(status.code(), code);
    }

    #[test]
    fn unused_and_unknown_codes() {
        assert_eq!(OrderStatus::from_code(7), None);
        assert_eq!(OrderStatus::from_code(0), None);
        assert_eq!(OrderStatus::from_code(12), None);
    }

    #[test]
    fn labels() {
        assert_eq!(OrderStatus::RedCard.to_string(), "Red Card");
        assert!(OrderStatus::Closed.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }

    #[test]
    fn order_status_from_record_code() {
        let order = Order {
            status_code: Some(3),
            ..Order::default()
        };
        assert_eq!(order.status(), Some(OrderStatus::Open));
    }
}
