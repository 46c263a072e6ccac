use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::StreamRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, Record};

const QUOTE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("QuoteId", FieldKind::Int),
    FieldSpec::new("OrderId", FieldKind::Int),
    FieldSpec::new("MarketId", FieldKind::Int),
    FieldSpec::new("BidPrice", FieldKind::Decimal),
    FieldSpec::new("BidAdjust", FieldKind::Decimal),
    FieldSpec::new("OfferPrice", FieldKind::Decimal),
    FieldSpec::new("OfferAdjust", FieldKind::Decimal),
    FieldSpec::new("Quantity", FieldKind::Decimal),
    FieldSpec::new("CurrencyId", FieldKind::Int),
    FieldSpec::new("StatusId", FieldKind::Int),
    FieldSpec::new("TypeId", FieldKind::Int),
    FieldSpec::new("RequestDateTime", FieldKind::Timestamp),
];

/// Dealer requote for a pending order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Quote {
    /// Quote identifier.
    pub quote_id: Option<u64>,
    /// Order being quoted.
    pub order_id: Option<u64>,
    /// Market.
    pub market_id: Option<u64>,
    /// Quoted bid.
    pub bid_price: Option<Decimal>,
    /// Bid adjustment.
    pub bid_adjust: Option<Decimal>,
    /// Quoted offer.
    pub offer_price: Option<Decimal>,
    /// Offer adjustment.
    pub offer_adjust: Option<Decimal>,
    /// Quantity.
    pub quantity: Option<Decimal>,
    /// Currency id.
    pub currency_id: Option<i64>,
    /// Quote status id.
    pub status_id: Option<i64>,
    /// Quote type id.
    pub type_id: Option<i64>,
    /// When the quote was requested.
    pub request_date_time: Option<DateTime<Utc>>,
}

impl StreamRecord for Quote {
    const SCHEMA: &'static FieldSchema = QUOTE_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            quote_id: record.uint("QuoteId"),
            order_id: record.uint("OrderId"),
            market_id: record.uint("MarketId"),
            bid_price: record.decimal("BidPrice"),
            bid_adjust: record.decimal("BidAdjust"),
            offer_price: record.decimal("OfferPrice"),
            offer_adjust: record.decimal("OfferAdjust"),
            quantity: record.decimal("Quantity"),
            currency_id: record.int("CurrencyId"),
            status_id: record.int("StatusId"),
            type_id: record.int("TypeId"),
            request_date_time: record.timestamp("RequestDateTime"),
        }
    }
}
