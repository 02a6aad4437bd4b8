// 🔄 Ledger Converter
//
// Database (any format) + lookup tables -> canonical ledger transactions.
//
// Output order:
//   1. one "Opening Balance" transaction per account with a non-zero start
//      balance (only when equity generation is on)
//   2. every executed source transaction, in source order
//
// Lookups never fail the run. An account missing from the name map passes
// through unchanged; a category missing from the classifier map falls back
// to its raw path and is reported.

use crate::account_plan::AccountNameMap;
use crate::classifier::{ClassifierKind, Metadata};
use crate::ledger::{
    opening_balance_date, Transaction, TxItem, ADJUSTMENT, EXCHANGE_PAYEE, OPENING_BALANCE,
    OPENING_BALANCE_PAYEE, TRANSFER_PAYEE, UNCLASSIFIED,
};
use crate::money::{negate, DATE_FORMAT};
use crate::quality::{QualityIssue, QualityReport};
use crate::sources::{Database, RawTransaction, TxKind};
use std::collections::{BTreeMap, BTreeSet};

/// Classifier kind -> category path -> ledger account
pub type ClassifierMap = BTreeMap<ClassifierKind, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct Conversion {
    pub transactions: Vec<Transaction>,
    pub report: QualityReport,
}

pub struct LedgerConverter<'a> {
    pub accounts: &'a AccountNameMap,
    pub classifiers: &'a ClassifierMap,
    /// Classifier whose lookup table resolves the second leg of expenses and incomes
    pub primary: ClassifierKind,
    pub generate_equity: bool,
}

impl<'a> LedgerConverter<'a> {
    pub fn new(accounts: &'a AccountNameMap, classifiers: &'a ClassifierMap) -> Self {
        LedgerConverter {
            accounts,
            classifiers,
            primary: ClassifierKind::ExpenseCategory,
            generate_equity: false,
        }
    }

    pub fn with_primary(mut self, primary: ClassifierKind) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_equity(mut self, generate_equity: bool) -> Self {
        self.generate_equity = generate_equity;
        self
    }

    pub fn convert(&self, db: &dyn Database) -> Conversion {
        let mut conversion = Conversion::default();

        if self.generate_equity {
            conversion.transactions.extend(self.opening_balances(db));
        }

        let mut skipped = 0;
        for (index, source) in db.transactions().iter().enumerate() {
            if !source.executed {
                skipped += 1;
                continue;
            }

            match self.convert_transaction(source, &mut conversion.report) {
                Some(tx) => conversion.transactions.push(tx),
                None => {
                    let subject = format!("#{} of {}", index + 1, source.date.format(DATE_FORMAT));
                    conversion
                        .report
                        .push(QualityIssue::unrecognized_transaction(&subject));
                }
            }
        }

        log::debug!(
            "converted {} transactions, {} not executed",
            conversion.transactions.len(),
            skipped
        );

        conversion
    }

    fn opening_balances<'d>(&'d self, db: &'d dyn Database) -> impl Iterator<Item = Transaction> + 'd {
        db.accounts()
            .iter()
            .filter(|account| !account.init_balance.is_zero())
            .map(move |account| Transaction {
                date: opening_balance_date(),
                payee: OPENING_BALANCE_PAYEE.to_string(),
                note: String::new(),
                executed: true,
                cleared: true,
                items: vec![
                    TxItem::posting(self.account(&account.name), &account.currency, account.init_balance),
                    TxItem::posting(OPENING_BALANCE, &account.currency, negate(account.init_balance)),
                ],
                metadata: Metadata::new(),
            })
    }

    /// None when the source transaction has no recognisable variant
    fn convert_transaction(&self, source: &RawTransaction, report: &mut QualityReport) -> Option<Transaction> {
        let kind = source.kind.as_ref()?;

        let items = match kind {
            TxKind::Transfer { expense, income } => vec![
                TxItem::posting(self.account(&expense.account), &expense.currency, expense.amount),
                TxItem::posting(self.account(&income.account), &income.currency, income.amount),
            ],
            TxKind::Expense(leg) | TxKind::Income(leg) => {
                let offset = self.account_from_categories(&source.metadata, report);
                vec![
                    TxItem::posting(self.account(&leg.account), &leg.currency, leg.amount),
                    TxItem::posting(&offset, &leg.currency, negate(leg.amount)),
                ]
            }
            TxKind::Balance(leg) => vec![
                TxItem::assertion(self.account(&leg.account), &leg.currency, leg.amount),
                TxItem::elided(ADJUSTMENT),
            ],
        };

        let payee = match (&source.payee, kind) {
            (Some(payee), _) => payee.clone(),
            (None, TxKind::Transfer { expense, income }) if expense.currency == income.currency => {
                TRANSFER_PAYEE.to_string()
            }
            (None, TxKind::Transfer { .. }) => EXCHANGE_PAYEE.to_string(),
            (None, _) => String::new(),
        };

        Some(Transaction {
            date: source.date,
            payee,
            note: source.comment.clone(),
            executed: source.executed,
            cleared: source.locked,
            items,
            metadata: source.metadata.clone(),
        })
    }

    fn account<'s>(&'s self, raw: &'s str) -> &'s str {
        self.accounts.get(raw).map(String::as_str).unwrap_or(raw)
    }

    fn account_from_categories(&self, metadata: &Metadata, report: &mut QualityReport) -> String {
        let path = metadata.get(&self.primary);

        if let Some(account) = path.and_then(|p| self.classifiers.get(&self.primary)?.get(p)) {
            return account.clone();
        }

        let fallback = path.map(String::as_str).unwrap_or(UNCLASSIFIED);
        report.push(QualityIssue::unresolved_classifier(
            path.map(String::as_str).unwrap_or("<none>"),
            fallback,
        ));
        fallback.to_string()
    }

    /// Every ledger account the lookup tables can produce, sorted, no duplicates
    pub fn accounts_list(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self.accounts.values().map(String::as_str).collect();
        if let Some(categories) = self.classifiers.get(&self.primary) {
            names.extend(categories.values().map(String::as_str));
        }
        names.into_iter().map(String::from).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
