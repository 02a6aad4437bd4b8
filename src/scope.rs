// 🧭 Scope - the list of datafiles to convert and their lookup tables
//
// Persisted as scope.json next to the user's books:
//
//   {
//     "datafiles": [
//       { "active": true, "equity": true, "path": "money.xml", "target": "money",
//         "accounts": { "Wallet": "Cash:Wallet" },
//         "classifiers": { "ExpenseCategory": { "Groceries": "Expenses:Food" } },
//         "primary_classifier": "ExpenseCategory",
//         "account_name_length": 20 }
//     ],
//     "common": { "family": { "accounts": {...}, "classifiers": {...} } }
//   }
//
// `prepare` fills the lookup tables with defaults for the operator to edit,
// `export` converts every active datafile using them.

use crate::account_plan::{flatten_reporting, AccountNameMap};
use crate::converter::{ClassifierMap, LedgerConverter};
use crate::classifier::ClassifierKind;
use crate::export::{output_path, render_accounts, render_rates, render_transactions, write_output};
use crate::quality::{QualityIssue, QualityReport};
use crate::sources::{read_database, Database};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_SCOPE_FILE: &str = "scope.json";
pub const DEFAULT_EXTENSION: &str = "journal";

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

// ============================================================================
// LOOKUP TABLES
// ============================================================================

/// Account and classifier lookup tables, either per datafile or shared
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedClassifiers {
    #[serde(default)]
    pub accounts: AccountNameMap,
    #[serde(default)]
    pub classifiers: ClassifierMap,
}

// ============================================================================
// DATAFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datafile {
    pub active: bool,
    /// Generate opening-balance transactions
    pub equity: bool,
    pub path: String,
    /// Output prefix: <target>-txs.<extension>
    pub target: String,
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub accounts: AccountNameMap,
    #[serde(default)]
    pub classifiers: ClassifierMap,

    #[serde(default)]
    pub primary_classifier: ClassifierKind,
    /// Name of a shared table in Scope::common used instead of the embedded ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_classifiers: Option<String>,
    /// Width the account column is padded to in the output
    #[serde(default)]
    pub account_name_length: usize,
}

impl Datafile {
    pub fn new(path: &str) -> Self {
        Datafile {
            active: true,
            equity: true,
            path: path.to_string(),
            target: Path::new(path).with_extension("").to_string_lossy().into_owned(),
            extension: default_extension(),
            accounts: AccountNameMap::new(),
            classifiers: ClassifierMap::new(),
            primary_classifier: ClassifierKind::default(),
            common_classifiers: None,
            account_name_length: 0,
        }
    }

    fn read(&self) -> Result<Box<dyn Database>> {
        read_database(Path::new(&self.path)).with_context(|| format!("Failed to read {}", self.path))
    }

    fn take_tables(&mut self) -> EmbeddedClassifiers {
        EmbeddedClassifiers {
            accounts: std::mem::take(&mut self.accounts),
            classifiers: std::mem::take(&mut self.classifiers),
        }
    }

    fn put_tables(&mut self, tables: EmbeddedClassifiers) {
        self.accounts = tables.accounts;
        self.classifiers = tables.classifiers;
    }

    fn check_account_length(&mut self, account: &str) {
        self.account_name_length = self.account_name_length.max(account.chars().count());
    }

    /// Merge what the source knows into the lookup tables.
    /// Entries already present are never touched.
    fn merge(&mut self, db: &dyn Database, tables: &mut EmbeddedClassifiers, report: &mut QualityReport) {
        let accounts = flatten_reporting(&db.account_plan(), report);
        for (short, full) in accounts {
            let ledger = tables.accounts.entry(short).or_insert(full);
            self.check_account_length(ledger);
        }

        for (kind, paths) in db.classifiers() {
            let table = tables.classifiers.entry(*kind).or_default();
            for path in paths {
                let ledger = table.entry(path.clone()).or_insert_with(|| path.clone());
                self.check_account_length(ledger);
            }
        }

        for issue in db.issues() {
            report.push(issue.clone());
        }

        for (index, tx) in db.transactions().iter().enumerate() {
            if tx.kind.is_none() {
                report.push(QualityIssue::unrecognized_transaction(&format!(
                    "#{} in {}",
                    index + 1,
                    self.path
                )));
            }
        }
    }

    fn export(&self, db: &dyn Database, tables: &EmbeddedClassifiers) -> Result<ExportSummary> {
        write_output(
            &output_path(&self.target, "rates", &self.extension),
            &render_rates(db.rates()),
        )?;

        let converter = LedgerConverter::new(&tables.accounts, &tables.classifiers)
            .with_primary(self.primary_classifier)
            .with_equity(self.equity);
        let conversion = converter.convert(db);

        write_output(
            &output_path(&self.target, "txs", &self.extension),
            &render_transactions(&conversion.transactions, self.account_name_length),
        )?;
        write_output(
            &output_path(&self.target, "accounts", &self.extension),
            &render_accounts(&converter.accounts_list()),
        )?;

        Ok(ExportSummary {
            path: self.path.clone(),
            transactions: conversion.transactions.len(),
            report: conversion.report,
        })
    }
}

// ============================================================================
// SCOPE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub datafiles: Vec<Datafile>,
    #[serde(default)]
    pub common: BTreeMap<String, EmbeddedClassifiers>,
}

/// Outcome of Scope::prepare
#[derive(Debug, Default)]
pub struct PrepareReport {
    pub messages: Vec<String>,
    pub report: QualityReport,
}

#[derive(Debug)]
pub struct ExportSummary {
    pub path: String,
    pub transactions: usize,
    pub report: QualityReport,
}

impl Scope {
    /// A missing scope file is an empty scope
    pub fn load(path: &Path) -> Result<Scope> {
        if !path.exists() {
            log::debug!("{} not found, starting with an empty scope", path.display());
            return Ok(Scope::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scope file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scope file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize scope")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write scope file: {}", path.display()))
    }

    pub fn add_file(&mut self, path: &str) -> Result<()> {
        if self.datafiles.iter().any(|df| df.path == path) {
            bail!("{} already in the list", path);
        }
        self.datafiles.push(Datafile::new(path));
        Ok(())
    }

    /// Tables of a datafile: its own, or the shared ones it points at
    fn tables_for(&mut self, index: usize) -> EmbeddedClassifiers {
        let datafile = &mut self.datafiles[index];
        match datafile.common_classifiers.clone() {
            Some(name) => self.common.get(&name).cloned().unwrap_or_default(),
            None => datafile.take_tables(),
        }
    }

    fn store_tables(&mut self, index: usize, tables: EmbeddedClassifiers) {
        let datafile = &mut self.datafiles[index];
        match datafile.common_classifiers.clone() {
            Some(name) => {
                self.common.insert(name, tables);
            }
            None => datafile.put_tables(tables),
        }
    }

    /// Read every datafile and extend its lookup tables with new entries
    pub fn prepare(&mut self) -> Result<PrepareReport> {
        let mut prepared = PrepareReport::default();

        for index in 0..self.datafiles.len() {
            let db = self.datafiles[index].read()?;
            let mut tables = self.tables_for(index);

            let datafile = &mut self.datafiles[index];
            datafile.merge(db.as_ref(), &mut tables, &mut prepared.report);
            prepared.messages.push(format!(
                "file {} is ok; found {} transactions",
                datafile.path,
                db.transactions().len()
            ));

            self.store_tables(index, tables);
        }

        Ok(prepared)
    }

    /// Convert every active datafile. Stops at the first failing file.
    pub fn export(&self) -> Result<Vec<ExportSummary>> {
        let mut summaries = Vec::new();

        for datafile in self.datafiles.iter().filter(|df| df.active) {
            let db = datafile.read()?;
            let tables = match &datafile.common_classifiers {
                Some(name) => self.common.get(name).cloned().unwrap_or_default(),
                None => EmbeddedClassifiers {
                    accounts: datafile.accounts.clone(),
                    classifiers: datafile.classifiers.clone(),
                },
            };

            let summary = datafile
                .export(db.as_ref(), &tables)
                .with_context(|| format!("Failed to export {}", datafile.path))?;
            summaries.push(summary);
        }

        Ok(summaries)
    }
}
