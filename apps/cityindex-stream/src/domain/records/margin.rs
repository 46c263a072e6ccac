use rust_decimal::Decimal;
use serde::Serialize;

use super::StreamRecord;
use crate::domain::schema::{FieldKind, FieldSchema, FieldSpec, Record};

const ACCOUNT_MARGIN_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("Cash", FieldKind::Decimal),
    FieldSpec::new("Margin", FieldKind::Decimal),
    FieldSpec::new("MarginIndicator", FieldKind::Float),
    FieldSpec::new("NetEquity", FieldKind::Decimal),
    FieldSpec::new("OpenTradeEquity", FieldKind::Decimal),
    FieldSpec::new("TradeableFunds", FieldKind::Decimal),
    FieldSpec::new("PendingFunds", FieldKind::Decimal),
    FieldSpec::new("TradingResource", FieldKind::Decimal),
    FieldSpec::new("TotalMarginRequirement", FieldKind::Decimal),
    FieldSpec::new("CurrencyId", FieldKind::Int),
    FieldSpec::new("CurrencyISO", FieldKind::Text),
];

const TRADE_MARGIN_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("ClientAccountId", FieldKind::Int),
    FieldSpec::new("DirectionId", FieldKind::Int),
    FieldSpec::new("MarginRequirementConverted", FieldKind::Decimal),
    FieldSpec::new("MarginRequirementConvertedCurrencyId", FieldKind::Int),
    FieldSpec::new("MarginRequirementConvertedCurrencyISOCode", FieldKind::Text),
    FieldSpec::new("MarketId", FieldKind::Int),
    FieldSpec::new("MarketTypeId", FieldKind::Int),
    FieldSpec::new("Multiplier", FieldKind::Decimal),
    FieldSpec::new("OrderId", FieldKind::Int),
    FieldSpec::new("OTEConverted", FieldKind::Decimal),
    FieldSpec::new("OTEConvertedCurrencyId", FieldKind::Int),
    FieldSpec::new("OTEConvertedCurrencyISOCode", FieldKind::Text),
    FieldSpec::new("PriceCalculatedAt", FieldKind::Decimal),
    FieldSpec::new("PriceTakenAt", FieldKind::Decimal),
    FieldSpec::new("Quantity", FieldKind::Decimal),
];

/// Client account margin summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AccountMargin {
    /// Cash balance.
    pub cash: Option<Decimal>,
    /// Margin in use.
    pub margin: Option<Decimal>,
    /// Margin utilisation indicator.
    pub margin_indicator: Option<f64>,
    /// Net equity.
    pub net_equity: Option<Decimal>,
    /// Open trade equity.
    pub open_trade_equity: Option<Decimal>,
    /// Funds available to trade.
    pub tradeable_funds: Option<Decimal>,
    /// Funds pending settlement.
    pub pending_funds: Option<Decimal>,
    /// Trading resource.
    pub trading_resource: Option<Decimal>,
    /// Total margin requirement.
    pub total_margin_requirement: Option<Decimal>,
    /// Account currency id.
    pub currency_id: Option<i64>,
    /// Account currency ISO code.
    pub currency_iso: Option<String>,
}

impl StreamRecord for AccountMargin {
    const SCHEMA: &'static FieldSchema = ACCOUNT_MARGIN_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            cash: record.decimal("Cash"),
            margin: record.decimal("Margin"),
            margin_indicator: record.float("MarginIndicator"),
            net_equity: record.decimal("NetEquity"),
            open_trade_equity: record.decimal("OpenTradeEquity"),
            tradeable_funds: record.decimal("TradeableFunds"),
            pending_funds: record.decimal("PendingFunds"),
            trading_resource: record.decimal("TradingResource"),
            total_margin_requirement: record.decimal("TotalMarginRequirement"),
            currency_id: record.int("CurrencyId"),
            currency_iso: record.text("CurrencyISO").map(str::to_owned),
        }
    }
}

/// Margin attributed to one open trade.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TradeMargin {
    /// Client account.
    pub client_account_id: Option<u64>,
    /// Trade direction id.
    pub direction_id: Option<i64>,
    /// Margin requirement in the converted currency.
    pub margin_requirement_converted: Option<Decimal>,
    /// Converted currency id.
    pub margin_requirement_converted_currency_id: Option<i64>,
    /// Converted currency ISO code.
    pub margin_requirement_converted_currency_iso: Option<String>,
    /// Market.
    pub market_id: Option<u64>,
    /// Market type id.
    pub market_type_id: Option<i64>,
    /// Contract multiplier.
    pub multiplier: Option<Decimal>,
    /// Order behind the trade.
    pub order_id: Option<u64>,
    /// Open trade equity in the converted currency.
    pub ote_converted: Option<Decimal>,
    /// OTE currency id.
    pub ote_converted_currency_id: Option<i64>,
    /// OTE currency ISO code.
    pub ote_converted_currency_iso: Option<String>,
    /// Price the margin was calculated at.
    pub price_calculated_at: Option<Decimal>,
    /// Price the trade was taken at.
    pub price_taken_at: Option<Decimal>,
    /// Quantity.
    pub quantity: Option<Decimal>,
}

impl StreamRecord for TradeMargin {
    const SCHEMA: &'static FieldSchema = TRADE_MARGIN_SCHEMA;

    fn from_record(record: &Record) -> Self {
        Self {
            client_account_id: record.uint("ClientAccountId"),
            direction_id: record.int("DirectionId"),
            margin_requirement_converted: record.decimal("MarginRequirementConverted"),
            margin_requirement_converted_currency_id: record
                .int("MarginRequirementConvertedCurrencyId"),
            margin_requirement_converted_currency_iso: record
                .text("MarginRequirementConvertedCurrencyISOCode")
                .map(str::to_owned),
            market_id: record.uint("MarketId"),
            market_type_id: record.int("MarketTypeId"),
            multiplier: record.decimal("Multiplier"),
            order_id: record.uint("OrderId"),
            ote_converted: record.decimal("OTEConverted"),
            ote_converted_currency_id: record.int("OTEConvertedCurrencyId"),
            ote_converted_currency_iso: record
                .text("OTEConvertedCurrencyISOCode")
                .map(str::to_owned),
            price_calculated_at: record.decimal("PriceCalculatedAt"),
            price_taken_at: record.decimal("PriceTakenAt"),
            quantity: record.decimal("Quantity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::decode_row;

    #[test]
    fn account_margin_partial_row() {
        let mut row = vec![None; AccountMargin::SCHEMA.len()];
        row[0] = Some("1000.50".to_owned());
        row[2] = Some("0.35".to_owned());
        row[10] = Some("GBP".to_owned());

        let margin = AccountMargin::from_record(&decode_row(AccountMargin::SCHEMA, &row).unwrap());

        assert_eq!(margin.cash, Some(Decimal::new(100_050, 2)));
        assert_eq!(margin.margin_indicator, Some(0.35));
        assert_eq!(margin.currency_iso.as_deref(), Some("GBP"));
        assert_eq!(margin.net_equity, None);
    }

    #[test]
    fn trade_margin_ids() {
        let mut row = vec![None; TradeMargin::SCHEMA.len()];
        row[0] = Some("400123".to_owned());
        row[5] = Some("154297".to_owned());
        row[8] = Some("98765".to_owned());

        let margin = TradeMargin::from_record(&decode_row(TradeMargin::SCHEMA, &row).unwrap());

        assert_eq!(margin.client_account_id, Some(400_123));
        assert_eq!(margin.market_id, Some(154_297));
        assert_eq!(margin.order_id, Some(98_765));
    }
}
