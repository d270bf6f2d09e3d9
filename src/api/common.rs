use base64::Engine as _;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use juniper::{GraphQLEnum, GraphQLInputObject, GraphQLObject, GraphQLScalar, InputValue, ScalarValue};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{
    api::err::{invalid_input, ApiResult},
    db::util::SqlFilter,
};


/// Opaque cursor for pagination. Serializes as string.
///
/// Our connections are offset based: the cursor is the base64 encoding of
/// `arrayconnection:<offset>`, with `offset` being the zero based position of
/// the item in the sorted result set.
#[derive(Debug, Clone, PartialEq, Eq, GraphQLScalar)]
#[graphql(
    name = "Cursor",
    description = "An opaque cursor used for pagination",
    with = Self,
    parse_token(String),
)]
pub(crate) struct Cursor(String);

const CURSOR_PREFIX: &str = "arrayconnection:";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum CursorError {
    #[error("cursor is not valid base64")]
    Base64,
    #[error("cursor has an unknown format")]
    Format,
}

impl Cursor {
    pub(crate) fn for_offset(offset: u64) -> Self {
        let raw = format!("{CURSOR_PREFIX}{offset}");
        Self(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    pub(crate) fn offset(&self) -> Result<u64, CursorError> {
        let raw = base64::engine::general_purpose::STANDARD.decode(&self.0)
            .map_err(|_| CursorError::Base64)?;
        std::str::from_utf8(&raw).ok()
            .and_then(|s| s.strip_prefix(CURSOR_PREFIX))
            .and_then(|n| n.parse().ok())
            .ok_or(CursorError::Format)
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.0.clone())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        input.as_string_value()
            .map(|s| Self(s.to_owned()))
            .ok_or_else(|| "expected string".into())
    }
}


/// Arbitrary JSON, transported as string. Used for structured rich text
/// documents (Draft.js raw format), addresses and event parameters.
#[derive(Debug, Clone, PartialEq, GraphQLScalar)]
#[graphql(
    name = "JSONString",
    description = "A JSON value serialized as string",
    with = Self,
    parse_token(String),
)]
pub(crate) struct JsonString(pub(crate) serde_json::Value);

impl JsonString {
    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.0.to_string())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        let s = input.as_string_value().ok_or("expected string")?;
        serde_json::from_str(s)
            .map(Self)
            .map_err(|e| format!("invalid JSON: {e}"))
    }
}


/// An amount of money in the shop currency.
#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct Money {
    pub(crate) amount: f64,
    pub(crate) currency: String,
}

impl Money {
    pub(crate) fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount: amount.to_f64().unwrap_or_default(),
            currency: currency.to_owned(),
        }
    }
}

/// Net and gross amount. As taxes are not modelled, both are the same.
#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct TaxedMoney {
    pub(crate) net: Money,
    pub(crate) gross: Money,
    pub(crate) currency: String,
}

impl TaxedMoney {
    pub(crate) fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            net: Money::new(amount, currency),
            gross: Money::new(amount, currency),
            currency: currency.to_owned(),
        }
    }
}

/// Converts an amount passed to the API to a decimal with three decimal
/// places, which is what all money columns store.
pub(crate) fn to_decimal(amount: f64, field: &'static str) -> ApiResult<Decimal> {
    if !amount.is_finite() {
        return Err(invalid_input!(key = "invalid", "amount {amount} is not a number").on_field(field));
    }
    Decimal::try_from(amount)
        .map(|d| d.round_dp(3))
        .map_err(|_| invalid_input!(key = "invalid", "amount {amount} out of range").on_field(field))
}

/// Like `to_decimal`, but additionally rejects negative amounts.
pub(crate) fn to_positive_decimal(amount: f64, field: &'static str) -> ApiResult<Decimal> {
    let d = to_decimal(amount, field)?;
    if d < Decimal::ZERO {
        return Err(invalid_input!(key = "invalid", "amount must not be negative").on_field(field));
    }
    Ok(d)
}


/// Returned by all bulk mutations.
#[derive(Debug, Clone, Copy, GraphQLObject)]
pub(crate) struct BulkResult {
    /// Number of affected objects.
    pub(crate) count: i32,
}

impl BulkResult {
    pub(crate) fn new(count: u64) -> Self {
        Self { count: count.try_into().unwrap_or(i32::MAX) }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum ReportingPeriod {
    Today,
    ThisMonth,
}

impl ReportingPeriod {
    /// Start of the period (inclusive) relative to `now`, in UTC.
    pub(crate) fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let start = match self {
            Self::Today => date,
            Self::ThisMonth => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .unwrap_or(date),
        };
        Utc.from_utc_datetime(&start.and_time(chrono::NaiveTime::MIN))
    }
}


#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DateRangeInput {
    pub(crate) gte: Option<NaiveDate>,
    pub(crate) lte: Option<NaiveDate>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct DateTimeRangeInput {
    pub(crate) gte: Option<DateTime<Utc>>,
    pub(crate) lte: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct PriceRangeInput {
    pub(crate) gte: Option<f64>,
    pub(crate) lte: Option<f64>,
}

#[derive(Debug, Clone, GraphQLInputObject)]
pub(crate) struct IntRangeInput {
    pub(crate) gte: Option<i32>,
    pub(crate) lte: Option<i32>,
}

impl DateRangeInput {
    /// Adds the range condition for a date or timestamp column.
    pub(crate) fn apply(&self, filter: &mut SqlFilter, column: &str) {
        if let Some(gte) = self.gte {
            let p = filter.arg(gte);
            filter.and(format!("{column}::date >= {p}"));
        }
        if let Some(lte) = self.lte {
            let p = filter.arg(lte);
            filter.and(format!("{column}::date <= {p}"));
        }
    }
}

impl DateTimeRangeInput {
    pub(crate) fn apply(&self, filter: &mut SqlFilter, column: &str) {
        if let Some(gte) = self.gte {
            let p = filter.arg(gte);
            filter.and(format!("{column} >= {p}"));
        }
        if let Some(lte) = self.lte {
            let p = filter.arg(lte);
            filter.and(format!("{column} <= {p}"));
        }
    }
}

impl PriceRangeInput {
    pub(crate) fn apply(&self, filter: &mut SqlFilter, column: &str) -> ApiResult<()> {
        if let Some(gte) = self.gte {
            let p = filter.arg(to_decimal(gte, "price")?);
            filter.and(format!("{column} >= {p}"));
        }
        if let Some(lte) = self.lte {
            let p = filter.arg(to_decimal(lte, "price")?);
            filter.and(format!("{column} <= {p}"));
        }
        Ok(())
    }
}

impl IntRangeInput {
    pub(crate) fn apply(&self, filter: &mut SqlFilter, column: &str) {
        if let Some(gte) = self.gte {
            let p = filter.arg(gte);
            filter.and(format!("{column} >= {p}"));
        }
        if let Some(lte) = self.lte {
            let p = filter.arg(lte);
            filter.and(format!("{column} <= {p}"));
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::db::util::SqlFilter;
    use super::*;

    #[test]
    fn cursors() {
        let c = Cursor::for_offset(0);
        assert_eq!(c.0, "YXJyYXljb25uZWN0aW9uOjA=");
        assert_eq!(c.offset(), Ok(0));
        assert_eq!(Cursor::for_offset(1234).offset(), Ok(1234));

        assert_eq!(Cursor("!!!".into()).offset(), Err(CursorError::Base64));
        // "hello"
        assert_eq!(Cursor("aGVsbG8=".into()).offset(), Err(CursorError::Format));
        // "arrayconnection:-1"
        assert_eq!(Cursor("YXJyYXljb25uZWN0aW9uOi0x".into()).offset(), Err(CursorError::Format));
    }

    #[test]
    fn decimals() {
        assert_eq!(to_decimal(12.5, "price").unwrap(), Decimal::new(12500, 3));
        assert_eq!(to_decimal(0.1234, "price").unwrap(), Decimal::new(123, 3));
        assert!(to_decimal(f64::NAN, "price").is_err());
        assert!(to_decimal(f64::INFINITY, "price").is_err());
        assert!(to_positive_decimal(-1.0, "price").is_err());
        assert!(to_positive_decimal(0.0, "price").is_ok());
    }

    #[test]
    fn money() {
        let m = TaxedMoney::new(Decimal::new(1999, 2), "EUR");
        assert!((m.gross.amount - 19.99).abs() < 1e-9);
        assert_eq!(m.net.amount, m.gross.amount);
        assert_eq!(m.currency, "EUR");
    }

    #[test]
    fn periods() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 15, 30, 0).unwrap();
        assert_eq!(
            ReportingPeriod::Today.start(now),
            Utc.with_ymd_and_hms(2024, 3, 17, 0, 0, 0).unwrap(),
        );
        assert_eq!(
            ReportingPeriod::ThisMonth.start(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        );
    }

    #[test]
    fn ranges() {
        let mut f = SqlFilter::new();
        IntRangeInput { gte: Some(1), lte: None }.apply(&mut f, "vouchers.used");
        PriceRangeInput { gte: None, lte: Some(9.5) }.apply(&mut f, "products.price").unwrap();
        assert_eq!(f.where_clause(), "where vouchers.used >= $1 and products.price <= $2");
    }
}
