// 💱 Money & Date Normalizer
// Every source speaks its own units: decimal text (XML, CSV) or scaled
// integers (relational store). Everything leaves this module as Decimal.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Date-only format used by transaction and rate dates: 2011-01-01
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format used by `changed-at` attributes: 2011-09-02T20:40:53
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The source application stores amounts scaled by 10^(precision + 2)
const SCALE_OFFSET: u32 = 2;

// ============================================================================
// CURRENCY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    /// Number of decimal places configured for the currency
    pub precision: u32,
}

impl Currency {
    pub fn new(code: &str, precision: u32) -> Self {
        Currency {
            code: code.to_string(),
            precision,
        }
    }

    /// Convert a raw stored integer into a decimal amount.
    ///
    /// Divides by `10^(precision + 2)`: precision 2 and raw 11077800 -> 1107.78
    pub fn convert_amount(&self, raw: i64) -> Option<Decimal> {
        let scale = self.precision.checked_add(SCALE_OFFSET)?;
        if scale > Decimal::MAX_SCALE {
            return None;
        }
        Some(Decimal::new(raw, scale).normalize())
    }
}

/// Zero always carries a positive sign, so it never renders as `-0.00`
pub fn positive_zero(amount: Decimal) -> Decimal {
    let mut amount = amount;
    if amount.is_zero() {
        amount.set_sign_positive(true);
    }
    amount
}

/// Sign flip for the balancing leg of a posting
pub fn negate(amount: Decimal) -> Decimal {
    positive_zero(-amount)
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a decimal amount as written by the source ("-50.00", "100", " 3.5 ").
/// An empty cell means zero.
pub fn parse_amount(text: &str) -> Result<Decimal, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Decimal::ZERO);
    }

    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("invalid amount `{}`: {}", text, e))
}

/// Parse a date-only field as local midnight
pub fn parse_date(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|e| format!("invalid date `{}`: {}", text, e))
}

/// Parse a `changed-at` timestamp
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| format!("invalid timestamp `{}`: {}", text, e))
}

/// Unix seconds (relational store) -> local wall-clock time
pub fn from_unix(seconds: i64) -> Result<NaiveDateTime, String> {
    DateTime::from_timestamp(seconds, 0)
        .map(|utc| utc.with_timezone(&Local).naive_local())
        .ok_or_else(|| format!("invalid unix timestamp {}", seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_convert_amount_precision_two() {
        let usd = Currency::new("USD", 2);
        assert_eq!(usd.convert_amount(11077800), Some(Decimal::new(110778, 2)));
        assert_eq!(usd.convert_amount(110778000), Some(Decimal::new(110778, 1)));
    }

    #[test]
    fn test_convert_amount_zero_precision() {
        let jpy = Currency::new("JPY", 0);
        assert_eq!(jpy.convert_amount(-1500), Some(Decimal::from(-15)));
    }

    #[test]
    fn test_convert_amount_rejects_huge_precision() {
        let weird = Currency::new("XXX", 40);
        assert_eq!(weird.convert_amount(1), None);
    }

    #[test]
    fn test_negate_keeps_zero_positive() {
        let zero = Decimal::new(0, 2);
        assert!(negate(zero).is_sign_positive());
        assert_eq!(negate(zero).to_string(), "0.00");
        assert_eq!(positive_zero(-zero).to_string(), "0.00");
        assert_eq!(negate(Decimal::new(5000, 2)), Decimal::new(-5000, 2));
        assert_eq!(positive_zero(Decimal::new(-1, 2)), Decimal::new(-1, 2));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("-50.00").unwrap(), Decimal::new(-5000, 2));
        assert_eq!(parse_amount(" 100 ").unwrap(), Decimal::from(100));
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert!(parse_amount("12,5").is_err());
    }

    #[test]
    fn test_parse_date_is_midnight() {
        let date = parse_date("2011-01-05").unwrap();
        assert_eq!(date.date(), NaiveDate::from_ymd_opt(2011, 1, 5).unwrap());
        assert_eq!(date.hour(), 0);
        assert!(parse_date("05.01.2011").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2011-09-02T20:40:53").unwrap();
        assert_eq!(ts.hour(), 20);
        assert_eq!(ts.second(), 53);
        assert!(parse_timestamp("2011-09-02").is_err());
    }
}
