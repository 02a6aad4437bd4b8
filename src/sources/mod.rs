// 🏗️ Source Readers
//
// Three export formats, one capability. Each reader parses its own format
// with its own indexing (integer ids, string keys, tree walking) and hands
// out the same read-only Database view.

use crate::account_plan::PlanFolder;
use crate::classifier::{Classifiers, Metadata};
use crate::error::{SourceError, SourceResult};
use crate::quality::QualityIssue;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

pub mod csvdir;
pub mod sqlite;
pub mod xml;

pub use self::csvdir::CsvDatabase;
pub use self::sqlite::SqliteDatabase;
pub use self::xml::XmlDatabase;

// ============================================================================
// RAW MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Raw account identifier, mapped to a ledger name at convert time
    pub name: String,
    pub currency: String,
    pub init_balance: Decimal,
}

/// amount1 of currency1 equals amount2 of currency2 on date
#[derive(Debug, Clone, PartialEq)]
pub struct Rate {
    pub date: NaiveDateTime,
    pub currency1: String,
    pub currency2: String,
    pub amount1: Decimal,
    pub amount2: Decimal,
}

/// One side of a source transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub account: String,
    pub currency: String,
    pub amount: Decimal,
}

impl Leg {
    pub fn new(account: &str, currency: &str, amount: Decimal) -> Self {
        Leg {
            account: account.to_string(),
            currency: currency.to_string(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxKind {
    /// Money moves between two source accounts, possibly across currencies
    Transfer { expense: Leg, income: Leg },
    Expense(Leg),
    Income(Leg),
    /// Balance correction; the leg's amount is the asserted balance
    Balance(Leg),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub date: NaiveDateTime,
    pub comment: String,
    pub payee: Option<String>,
    pub executed: bool,
    /// "Locked" in Ability Cash means finalized, i.e. cleared in the ledger
    pub locked: bool,
    /// None for legacy placeholder transactions without any payload
    pub kind: Option<TxKind>,
    pub metadata: Metadata,
}

// ============================================================================
// DATABASE CAPABILITY
// ============================================================================

/// Uniform read-only view of a parsed export
pub trait Database {
    fn accounts(&self) -> &[Account];

    fn rates(&self) -> &[Rate];

    fn transactions(&self) -> &[RawTransaction];

    fn classifiers(&self) -> &Classifiers;

    /// Folder structure of the accounts, used to seed the account lookup table.
    /// Formats without folders return a flat plan of all accounts.
    fn account_plan(&self) -> PlanFolder {
        let mut plan = PlanFolder::new("");
        for account in self.accounts() {
            plan.accounts.push(account.name.clone());
        }
        plan
    }

    /// Findings made while reading (dropped categories and the like)
    fn issues(&self) -> &[QualityIssue] {
        &[]
    }
}

// ============================================================================
// FORMAT DETECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xml,
    Csv,
    Sqlite,
}

impl SourceFormat {
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Xml => "XML",
            SourceFormat::Csv => "CSV",
            SourceFormat::Sqlite => "SQLite",
        }
    }
}

/// Pick the reader from the path: `.xml`, a CSV directory (or a `.csv` file
/// inside one) or an Ability Cash database file.
pub fn detect_format(path: &Path) -> SourceResult<SourceFormat> {
    if path.is_dir() {
        return Ok(SourceFormat::Csv);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("xml") => Ok(SourceFormat::Xml),
        None | Some("csv") => Ok(SourceFormat::Csv),
        Some("cash") | Some("sqlite") | Some("db") => Ok(SourceFormat::Sqlite),
        Some(other) => Err(SourceError::format(
            path,
            format!("unknown format `.{}`", other),
        )),
    }
}

/// Directory holding the CSV files for a CSV source path
pub fn csv_directory(path: &Path) -> PathBuf {
    if path.extension().is_some() && !path.is_dir() {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        path.to_path_buf()
    }
}

/// Read any supported export into a Database
pub fn read_database(path: &Path) -> SourceResult<Box<dyn Database>> {
    let format = detect_format(path)?;
    log::debug!("reading {} as {}", path.display(), format.name());

    Ok(match format {
        SourceFormat::Xml => Box::new(XmlDatabase::read(path)?),
        SourceFormat::Csv => Box::new(CsvDatabase::read(&csv_directory(path))?),
        SourceFormat::Sqlite => Box::new(SqliteDatabase::read(path)?),
    })
}
