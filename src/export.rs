// 📝 Ledger Text Export
//
// Renders rates, transactions and the account list as ledger-cli text.
//
//   P 2011/01/01 USD 0.75 EUR
//
//   2011/01/03 * Corner shop
//       ; weekly shopping
//       ; Payee: Shops:Corner
//       Cash:Wallet           USD -50.00
//       Expenses:Groceries    USD 50.00
//
//   account Cash:Wallet

use crate::ledger::{Transaction, TxItem};
use crate::money::positive_zero;
use crate::sources::Rate;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const LEDGER_DATE_FORMAT: &str = "%Y/%m/%d";

const INDENT: &str = "    ";

/// Output files of one datafile: <target>-<entity>.<extension>
pub fn output_path(target: &str, entity: &str, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}-{}.{}", target, entity, extension))
}

// ============================================================================
// RENDERING
// ============================================================================

pub fn render_rates(rates: &[Rate]) -> String {
    let mut out = String::new();
    for rate in rates {
        // Price of one unit of currency1
        let Some(price) = rate.amount2.checked_div(rate.amount1) else {
            log::warn!(
                "skipping rate {} {}/{}: zero amount",
                rate.date.format(LEDGER_DATE_FORMAT),
                rate.currency1,
                rate.currency2
            );
            continue;
        };
        let _ = writeln!(
            out,
            "P {} {} {} {}",
            rate.date.format(LEDGER_DATE_FORMAT),
            rate.currency1,
            price.normalize(),
            rate.currency2
        );
    }
    out
}

fn render_item(out: &mut String, item: &TxItem, width: usize) {
    let mut line = format!("{}{:<width$}", INDENT, item.account, width = width);

    if let (Some(currency), Some(amount)) = (&item.currency, item.amount) {
        let _ = write!(line, "  {} {}", currency, positive_zero(amount));
    }
    if let (Some(currency), Some(balance)) = (&item.currency, item.balance_assertion) {
        let _ = write!(line, "  = {} {}", currency, positive_zero(balance));
    }

    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn render_transaction(out: &mut String, tx: &Transaction, width: usize) {
    let mut header = tx.date.format(LEDGER_DATE_FORMAT).to_string();
    if tx.cleared {
        header.push_str(" *");
    }
    if !tx.payee.is_empty() {
        header.push(' ');
        header.push_str(&tx.payee);
    }
    out.push_str(&header);
    out.push('\n');

    // One comment line per note line, a bare newline would end the entry
    for line in tx.note.lines() {
        let _ = writeln!(out, "{}; {}", INDENT, line);
    }
    for (kind, path) in &tx.metadata {
        let _ = writeln!(out, "{}; {}: {}", INDENT, kind, path);
    }
    for item in &tx.items {
        render_item(out, item, width);
    }
}

/// Transactions separated by blank lines
pub fn render_transactions(txs: &[Transaction], width: usize) -> String {
    let mut out = String::new();
    for (i, tx) in txs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_transaction(&mut out, tx, width);
    }
    out
}

pub fn render_accounts(accounts: &[String]) -> String {
    accounts
        .iter()
        .map(|account| format!("account {}\n", account))
        .collect()
}

// ============================================================================
// FILES
// ============================================================================

pub fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierKind, Metadata};
    use crate::ledger::{opening_balance_date, ADJUSTMENT};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_render_rates_price_per_unit() {
        let rates = vec![
            Rate {
                date: date(2011, 1, 1),
                currency1: "USD".to_string(),
                currency2: "RUB".to_string(),
                amount1: Decimal::from(100),
                amount2: Decimal::from(3050),
            },
            Rate {
                date: date(2011, 1, 2),
                currency1: "USD".to_string(),
                currency2: "EUR".to_string(),
                amount1: Decimal::ZERO,
                amount2: Decimal::ONE,
            },
        ];
        assert_eq!(render_rates(&rates), "P 2011/01/01 USD 30.5 RUB\n");
    }

    #[test]
    fn test_render_expense() {
        let mut metadata = Metadata::new();
        metadata.insert(ClassifierKind::ExpenseCategory, "Groceries".to_string());
        let tx = Transaction {
            date: date(2011, 1, 3),
            payee: "Corner shop".to_string(),
            note: "weekly shopping".to_string(),
            executed: true,
            cleared: true,
            items: vec![
                TxItem::posting("Cash:Wallet", "USD", Decimal::new(-5000, 2)),
                TxItem::posting("Expenses:Groceries", "USD", Decimal::new(5000, 2)),
            ],
            metadata,
        };

        let text = render_transactions(&[tx], 20);
        assert_eq!(
            text,
            "2011/01/03 * Corner shop\n\
             \x20   ; weekly shopping\n\
             \x20   ; ExpenseCategory: Groceries\n\
             \x20   Cash:Wallet           USD -50.00\n\
             \x20   Expenses:Groceries    USD 50.00\n"
        );
    }

    #[test]
    fn test_render_multiline_note() {
        let tx = Transaction {
            date: date(2011, 1, 3),
            payee: "Corner shop".to_string(),
            note: "first line\nsecond line".to_string(),
            executed: true,
            cleared: false,
            items: vec![TxItem::elided(ADJUSTMENT)],
            metadata: Metadata::new(),
        };

        let text = render_transactions(&[tx], 0);
        assert_eq!(
            text,
            "2011/01/03 Corner shop\n    ; first line\n    ; second line\n    Equity:Adjustments\n"
        );
    }

    #[test]
    fn test_render_negated_zero_without_sign() {
        let tx = Transaction {
            date: date(2011, 1, 3),
            payee: String::new(),
            note: String::new(),
            executed: true,
            cleared: false,
            items: vec![
                TxItem::posting("Expenses:Food", "USD", -Decimal::new(0, 2)),
                TxItem::assertion("Cash:Wallet", "USD", -Decimal::new(0, 2)),
            ],
            metadata: Metadata::new(),
        };

        let text = render_transactions(&[tx], 0);
        assert_eq!(
            text,
            "2011/01/03\n    Expenses:Food  USD 0.00\n    Cash:Wallet  = USD 0.00\n"
        );
    }

    #[test]
    fn test_render_balance_assertion() {
        let tx = Transaction {
            date: date(2011, 1, 5),
            payee: String::new(),
            note: String::new(),
            executed: true,
            cleared: false,
            items: vec![
                TxItem::assertion("Cash:Wallet", "USD", Decimal::new(295, 1)),
                TxItem::elided(ADJUSTMENT),
            ],
            metadata: Metadata::new(),
        };

        let text = render_transactions(&[tx], 0);
        assert_eq!(
            text,
            "2011/01/05\n    Cash:Wallet  = USD 29.5\n    Equity:Adjustments\n"
        );
    }

    #[test]
    fn test_render_opening_date_and_separator() {
        let tx = Transaction {
            date: opening_balance_date(),
            payee: "Opening Balance".to_string(),
            note: String::new(),
            executed: true,
            cleared: true,
            items: vec![],
            metadata: Metadata::new(),
        };
        let text = render_transactions(&[tx.clone(), tx], 0);
        assert_eq!(
            text,
            "0001/01/01 * Opening Balance\n\n0001/01/01 * Opening Balance\n"
        );
    }

    #[test]
    fn test_render_accounts_and_paths() {
        let accounts = vec!["Cash:Wallet".to_string(), "Expenses:Food".to_string()];
        assert_eq!(
            render_accounts(&accounts),
            "account Cash:Wallet\naccount Expenses:Food\n"
        );
        assert_eq!(
            output_path("out/money", "txs", "journal"),
            PathBuf::from("out/money-txs.journal")
        );
    }

    #[test]
    fn test_write_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x-accounts.journal");
        write_output(&path, "account A\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "account A\n");
        assert!(write_output(&dir.path().join("missing/dir/file"), "").is_err());
    }
}
