use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::StreamRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, Record};

const PRICE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("MarketId", FieldKind::Int),
    FieldSpec::new("TickDate", FieldKind::Timestamp),
    FieldSpec::new("Bid", FieldKind::Decimal),
    FieldSpec::new("Offer", FieldKind::Decimal),
    FieldSpec::new("Price", FieldKind::Decimal),
    FieldSpec::new("High", FieldKind::Decimal),
    FieldSpec::new("Low", FieldKind::Decimal),
    FieldSpec::new("Change", FieldKind::Decimal),
    FieldSpec::new("Direction", FieldKind::Int),
    FieldSpec::new("AuditId", FieldKind::Text),
    FieldSpec::new("StatusSummary", FieldKind::Int),
];

/// Market price tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Price {
    /// Market identifier.
    pub market_id: Option<u64>,
    /// Server tick time.
    pub tick_date: Option<DateTime<Utc>>,
    /// Bid.
    pub bid: Option<Decimal>,
    /// Offer.
    pub offer: Option<Decimal>,
    /// Mid price.
    pub price: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Change since the previous close.
    pub change: Option<Decimal>,
    /// Tick direction: 1 up, 0 down.
    pub direction: Option<i64>,
    /// Price audit identifier, quoted back when trading at this price.
    pub audit_id: Option<String>,
    /// Market status code.
    pub status_summary: Option<i64>,
}

impl Price {
    /// Offer minus bid, when both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.offer? - self.bid?)
    }
}

impl StreamRecord for Price {
    const SCHEMA: &'static FieldSchema = PRICE_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            market_id: record.uint("MarketId"),
            tick_date: record.timestamp("TickDate"),
            bid: record.decimal("Bid"),
            offer: record.decimal("Offer"),
            price: record.decimal("Price"),
            high: record.decimal("High"),
            low: record.decimal("Low"),
            change: record.decimal("Change"),
            direction: record.int("Direction"),
            audit_id: record.text("AuditId").map(str::to_owned),
            status_summary: record.int("StatusSummary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::decode_row;

    #[test]
    fn decodes_full_price_row() {
        let raw = [
            "154297",
            r"\/Date(1343067900000)\/",
            "1.2345",
            "1.2349",
            "1.2347",
            "1.25",
            "1.22",
            "-0.001",
            "1",
            "A1B2",
            "0",
        ];
        let row: Vec<Option<String>> = raw.iter().map(|s| Some((*s).to_owned())).collect();
        let price = Price::from_record(&decode_row(Price::SCHEMA, &row).unwrap());

        assert_eq!(price.market_id, Some(154_297));
        assert_eq!(price.tick_date.map(|t| t.timestamp()), Some(1_343_067_900));
        assert_eq!(price.bid, Some(Decimal::new(12345, 4)));
        assert_eq!(price.spread(), Some(Decimal::new(4, 4)));
        assert_eq!(price.audit_id.as_deref(), Some("A1B2"));
    }

    #[test]
    fn spread_needs_both_sides() {
        let price = Price {
            bid: Some(Decimal::ONE),
            ..Price::default()
        };
        assert_eq!(price.spread(), None);
    }
}
