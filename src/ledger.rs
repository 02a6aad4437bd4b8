// 📒 Canonical Ledger Model
// What the converter produces and the exporter renders.

use crate::classifier::Metadata;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

pub const OPENING_BALANCE: &str = "Equity:Opening balances";
pub const ADJUSTMENT: &str = "Equity:Adjustments";
pub const OPENING_BALANCE_PAYEE: &str = "Opening Balance";
pub const TRANSFER_PAYEE: &str = "Transfer";
pub const EXCHANGE_PAYEE: &str = "Exchange";

/// Offsetting account used when a category has no lookup entry and there is
/// no raw path to fall back to
pub const UNCLASSIFIED: &str = "Unclassified";

/// Date of synthetic opening-balance transactions: 0001-01-01 00:00:00
pub fn opening_balance_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxItem {
    pub account: String,
    pub currency: Option<String>,
    pub amount: Option<Decimal>,
    /// Asserted balance after the transaction, instead of a delta
    pub balance_assertion: Option<Decimal>,
}

impl TxItem {
    pub fn posting(account: &str, currency: &str, amount: Decimal) -> Self {
        TxItem {
            account: account.to_string(),
            currency: Some(currency.to_string()),
            amount: Some(amount),
            balance_assertion: None,
        }
    }

    pub fn assertion(account: &str, currency: &str, balance: Decimal) -> Self {
        TxItem {
            account: account.to_string(),
            currency: Some(currency.to_string()),
            amount: None,
            balance_assertion: Some(balance),
        }
    }

    /// An item the ledger tool balances on its own
    pub fn elided(account: &str) -> Self {
        TxItem {
            account: account.to_string(),
            currency: None,
            amount: None,
            balance_assertion: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub payee: String,
    pub note: String,
    pub executed: bool,
    pub cleared: bool,
    pub items: Vec<TxItem>,
    pub metadata: Metadata,
}

impl Transaction {
    /// Two items sharing a currency must cancel out
    pub fn is_balanced(&self) -> bool {
        match self.items.as_slice() {
            [a, b] => match (&a.currency, &b.currency, a.amount, b.amount) {
                (Some(ca), Some(cb), Some(x), Some(y)) if ca == cb => (x + y).is_zero(),
                _ => true,
            },
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn tx(items: Vec<TxItem>) -> Transaction {
        Transaction {
            date: opening_balance_date(),
            payee: String::new(),
            note: String::new(),
            executed: true,
            cleared: false,
            items,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_opening_balance_date_is_year_one() {
        let date = opening_balance_date();
        assert_eq!((date.year(), date.month(), date.day()), (1, 1, 1));
    }

    #[test]
    fn test_is_balanced_same_currency() {
        let balanced = tx(vec![
            TxItem::posting("A", "USD", Decimal::from(-5)),
            TxItem::posting("B", "USD", Decimal::from(5)),
        ]);
        let unbalanced = tx(vec![
            TxItem::posting("A", "USD", Decimal::from(-5)),
            TxItem::posting("B", "USD", Decimal::from(4)),
        ]);
        assert!(balanced.is_balanced());
        assert!(!unbalanced.is_balanced());
    }

    #[test]
    fn test_exchange_is_not_checked() {
        let exchange = tx(vec![
            TxItem::posting("A", "USD", Decimal::from(-5)),
            TxItem::posting("B", "EUR", Decimal::from(4)),
        ]);
        assert!(exchange.is_balanced());
    }
}
