// 📊 CSV Reader - directory of Ability Cash CSV exports
//
// Fixed file names, positional columns, comma separated, UTF-8:
//   rates.csv       Date,Currency 1,Amount 1,Currency 2,Amount 2      (header)
//   structure.csv   Folder,Account   e.g. "\Root\Cash","Wallet"       (header)
//   accounts.csv    Name,Currency,Init balance                        (header)
//   categories.csv  Classifier,Category  e.g. "Category","\Expenses"  (header)
//   txs.csv         transactions, no header; "Executed" rows are skipped
//
// txs.csv columns:
//   0 Executed, 1 Locked, 2 Date, 3 Income account, 4 Income amount,
//   5 Income balance, 6 Expense account, 7 Expense amount, 8 Expense balance,
//   9 Comment, then either
//   10..12 Category of Category, Category of Provider, Category of Agent
//   or (newer exports)
//   10..12 Recurrence, Day of month, Interval, 13..15 the three categories

use super::{Account, Database, Leg, Rate, RawTransaction, TxKind};
use crate::account_plan::PlanFolder;
use crate::classifier::{normalize_path, ClassifierKind, Classifiers, Metadata};
use crate::error::{SourceError, SourceResult};
use crate::money::{parse_amount, parse_date};
use crate::quality::QualityIssue;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

pub const RATES_FILE: &str = "rates.csv";
pub const STRUCTURE_FILE: &str = "structure.csv";
pub const ACCOUNTS_FILE: &str = "accounts.csv";
pub const CATEGORIES_FILE: &str = "categories.csv";
pub const TRANSACTIONS_FILE: &str = "txs.csv";

/// First cell of the column-title row inside txs.csv
const SKIP_MARKER: &str = "Executed";

/// "+" marks a set flag
const FLAG_SET: &str = "+";

/// Category columns in positional order
const CATEGORY_KINDS: [ClassifierKind; 3] = [
    ClassifierKind::ExpenseCategory,
    ClassifierKind::Payee,
    ClassifierKind::Agent,
];

// ============================================================================
// COLUMN LAYOUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxLayout {
    /// 13 columns, categories right after the comment
    Short,
    /// 16 columns, recurrence columns before the categories
    WithRecurrence,
}

impl TxLayout {
    pub fn detect(columns: usize) -> Option<TxLayout> {
        match columns {
            13 => Some(TxLayout::Short),
            16 => Some(TxLayout::WithRecurrence),
            _ => None,
        }
    }

    pub fn categories_start(&self) -> usize {
        match self {
            TxLayout::Short => 10,
            TxLayout::WithRecurrence => 13,
        }
    }
}

// ============================================================================
// CSV DATABASE
// ============================================================================

#[derive(Debug, Default)]
pub struct CsvDatabase {
    accounts: Vec<Account>,
    rates: Vec<Rate>,
    transactions: Vec<RawTransaction>,
    classifiers: Classifiers,
    plan: PlanFolder,
    issues: Vec<QualityIssue>,
}

impl CsvDatabase {
    /// Read all files of an export directory.
    /// accounts.csv and txs.csv are required, the others may be missing.
    pub fn read(dir: &Path) -> SourceResult<Self> {
        let mut db = CsvDatabase::default();
        let mut structured = HashSet::new();

        read_optional(dir, RATES_FILE, true, |record| {
            db.rates.push(read_rate(record)?);
            Ok(())
        })?;

        read_optional(dir, STRUCTURE_FILE, true, |record| {
            let (folders, account) = read_structure(record)?;
            let folders: Vec<&str> = folders.iter().map(String::as_str).collect();
            db.plan.insert(&folders, &account);
            structured.insert(account);
            Ok(())
        })?;

        read_csv(&dir.join(ACCOUNTS_FILE), true, |record| {
            db.accounts.push(Account {
                name: field(record, 0)?.to_string(),
                currency: field(record, 1)?.to_string(),
                init_balance: parse_amount(field(record, 2)?)?,
            });
            Ok(())
        })?;

        read_optional(dir, CATEGORIES_FILE, true, |record| {
            let classifier = field(record, 0)?;
            let path = normalize_path(field(record, 1)?, '\\');
            match ClassifierKind::from_classifier_name(classifier) {
                Some(kind) => {
                    db.classifiers.entry(kind).or_default().insert(path);
                }
                None => db
                    .issues
                    .push(QualityIssue::unknown_classifier(classifier, &path)),
            }
            Ok(())
        })?;

        read_csv(&dir.join(TRANSACTIONS_FILE), false, |record| {
            if record.get(0) == Some(SKIP_MARKER) {
                return Ok(());
            }
            db.transactions.push(read_transaction(record)?);
            Ok(())
        })?;

        // Accounts missing from structure.csv sit at the top of the plan
        for account in &db.accounts {
            if !structured.contains(&account.name) {
                db.plan.accounts.push(account.name.clone());
            }
        }

        log::debug!(
            "{}: {} accounts, {} rates, {} transactions",
            dir.display(),
            db.accounts.len(),
            db.rates.len(),
            db.transactions.len()
        );

        Ok(db)
    }
}

/// Run `handler` for every record of a CSV file. Handler errors become
/// format errors carrying the line number.
fn read_csv(
    path: &Path,
    has_headers: bool,
    mut handler: impl FnMut(&StringRecord) -> Result<(), String>,
) -> SourceResult<()> {
    let file = File::open(path).map_err(|e| SourceError::io(path, e))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(file);

    for result in reader.records() {
        let record = result.map_err(|e| SourceError::from_csv(path, e))?;
        handler(&record).map_err(|message| {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            SourceError::format(path, format!("line {}: {}", line, message))
        })?;
    }

    Ok(())
}

fn read_optional(
    dir: &Path,
    file_name: &str,
    has_headers: bool,
    handler: impl FnMut(&StringRecord) -> Result<(), String>,
) -> SourceResult<()> {
    let path = dir.join(file_name);
    if !path.exists() {
        log::debug!("{} not found, skipping", path.display());
        return Ok(());
    }
    read_csv(&path, has_headers, handler)
}

fn field(record: &StringRecord, index: usize) -> Result<&str, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing column {}", index + 1))
}

fn read_rate(record: &StringRecord) -> Result<Rate, String> {
    Ok(Rate {
        date: parse_date(field(record, 0)?)?,
        currency1: field(record, 1)?.to_string(),
        amount1: parse_amount(field(record, 2)?)?,
        currency2: field(record, 3)?.to_string(),
        amount2: parse_amount(field(record, 4)?)?,
    })
}

/// "\Root\Cash\Safe","Box" -> (["Cash", "Safe"], "Box")
fn read_structure(record: &StringRecord) -> Result<(Vec<String>, String), String> {
    let mut folders: Vec<String> = field(record, 0)?
        .split('\\')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if folders.first().map(String::as_str) == Some("Root") {
        folders.remove(0);
    }
    Ok((folders, field(record, 1)?.to_string()))
}

/// "USD - Wallet" -> ("USD", "Wallet")
fn split_account(cell: &str) -> Result<(&str, &str), String> {
    cell.split_once(" - ")
        .map(|(currency, name)| (currency.trim(), name.trim()))
        .ok_or_else(|| format!("account `{}` is not `<currency> - <name>`", cell))
}

fn read_leg(account: &str, amount: &str) -> Result<Leg, String> {
    let (currency, name) = split_account(account)?;
    Ok(Leg::new(name, currency, parse_amount(amount)?))
}

fn read_transaction(record: &StringRecord) -> Result<RawTransaction, String> {
    let layout = TxLayout::detect(record.len())
        .ok_or_else(|| format!("unexpected column count {}", record.len()))?;

    let income_account = field(record, 3)?;
    let income_amount = field(record, 4)?;
    let income_balance = field(record, 5)?;
    let expense_account = field(record, 6)?;
    let expense_amount = field(record, 7)?;

    let kind = match (income_account.is_empty(), expense_account.is_empty()) {
        (false, false) => Some(TxKind::Transfer {
            expense: read_leg(expense_account, expense_amount)?,
            income: read_leg(income_account, income_amount)?,
        }),
        (false, true) if income_amount.trim().is_empty() && !income_balance.trim().is_empty() => {
            Some(TxKind::Balance(read_leg(income_account, income_balance)?))
        }
        (false, true) => Some(TxKind::Income(read_leg(income_account, income_amount)?)),
        (true, false) => Some(TxKind::Expense(read_leg(expense_account, expense_amount)?)),
        (true, true) => None,
    };

    let mut metadata = Metadata::new();
    let start = layout.categories_start();
    for (offset, kind) in CATEGORY_KINDS.iter().enumerate() {
        let cell = field(record, start + offset)?;
        if !cell.is_empty() {
            metadata.insert(*kind, normalize_path(cell, '\\'));
        }
    }

    Ok(RawTransaction {
        date: parse_date(field(record, 2)?)?,
        comment: field(record, 9)?.to_string(),
        payee: None,
        executed: field(record, 0)? == FLAG_SET,
        locked: field(record, 1)? == FLAG_SET,
        kind,
        metadata,
    })
}

impl Database for CsvDatabase {
    fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn rates(&self) -> &[Rate] {
        &self.rates
    }

    fn transactions(&self) -> &[RawTransaction] {
        &self.transactions
    }

    fn classifiers(&self) -> &Classifiers {
        &self.classifiers
    }

    fn account_plan(&self) -> PlanFolder {
        self.plan.clone()
    }

    fn issues(&self) -> &[QualityIssue] {
        &self.issues
    }
}

// ============================================================================
// TESTS
// ============================================================================
