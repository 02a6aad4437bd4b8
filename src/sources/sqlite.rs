// 🗄️ SQLite Reader - Ability Cash database file (*.cash)
//
// Relational schema, integer ids, soft-deleted rows (Deleted = 1) are
// filtered out of every query. Amounts are stored as scaled integers, see
// Currency::convert_amount. Dates are unix seconds.

use super::{Account, Database, Leg, Rate, RawTransaction, TxKind};
use crate::classifier::{classify_path, join_path, Classifiers, Metadata};
use crate::error::{SourceError, SourceResult};
use crate::money::{from_unix, Currency};
use crate::quality::QualityIssue;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const CURRENCIES_SQL: &str = "SELECT Id, Code, Precision FROM Currencies WHERE NOT Deleted";
const RATES_SQL: &str = "SELECT RateDate, Currency1, Currency2, Value1, Value2 FROM CurrencyRates WHERE NOT Deleted ORDER BY RateDate";
const ACCOUNTS_SQL: &str = "SELECT Id, Name, StartingBalance, Currency FROM Accounts WHERE NOT Deleted ORDER BY Id";
const CATEGORIES_SQL: &str = "SELECT Id, Name, Parent FROM Categories WHERE NOT Deleted ORDER BY Id";
const TX_CATEGORIES_SQL: &str = "SELECT Category, \"Transaction\" FROM TransactionCategories WHERE NOT Deleted";
const TRANSACTION_COLUMNS_SQL: &str = "SELECT name FROM pragma_table_info('Transactions')";

/// Holds the target balance of balance-correction rows. Files written by
/// older program versions lack it; they are read as if it were NULL, so
/// such rows come out as zero-amount incomes.
const INCOME_BALANCE: &str = "IncomeBalance";

fn transactions_sql(income_balance: &str) -> String {
    format!(
        "SELECT Id, BudgetDate, Executed, Locked, IncomeAccount, IncomeAmount, {}, ExpenseAccount, ExpenseAmount, Comment FROM Transactions WHERE NOT Deleted ORDER BY BudgetDate, Id",
        income_balance
    )
}

/// Delimiter between category names in the source application
const CATEGORY_DELIMITER: &str = "\\";

// ============================================================================
// ROWS
// ============================================================================

struct CategoryRow {
    name: String,
    parent: Option<i64>,
}

struct TransactionRow {
    id: i64,
    date: i64,
    executed: bool,
    locked: bool,
    income_account: Option<i64>,
    income_amount: Option<i64>,
    income_balance: Option<i64>,
    expense_account: Option<i64>,
    expense_amount: Option<i64>,
    comment: Option<String>,
}

/// Amount columns hold integers, but older files carry REAL values
fn raw_amount(row: &Row, index: usize) -> rusqlite::Result<Option<i64>> {
    match row.get_ref(index)? {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(value) => Ok(Some(value)),
        ValueRef::Real(value) => Ok(Some(value.round() as i64)),
        other => Err(rusqlite::Error::InvalidColumnType(
            index,
            format!("amount column {}", index),
            other.data_type(),
        )),
    }
}

// ============================================================================
// SQLITE DATABASE
// ============================================================================

#[derive(Debug, Default)]
pub struct SqliteDatabase {
    accounts: Vec<Account>,
    rates: Vec<Rate>,
    transactions: Vec<RawTransaction>,
    classifiers: Classifiers,
    issues: Vec<QualityIssue>,
}

/// Id-indexed lookups that only live while reading
struct Indexes {
    currencies: HashMap<i64, Currency>,
    accounts: HashMap<i64, (String, Currency)>,
    categories: HashMap<i64, String>,
    tx_categories: HashMap<i64, Vec<i64>>,
}

impl SqliteDatabase {
    pub fn read(path: &Path) -> SourceResult<Self> {
        if !path.is_file() {
            return Err(SourceError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such database file"),
            ));
        }

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                SourceError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;

        let reader = SqliteReader { conn: &conn, path };
        let mut db = SqliteDatabase::default();

        let currencies = reader.read_currencies()?;
        db.rates = reader.read_rates(&currencies)?;
        let (accounts, account_index) = reader.read_accounts(&currencies)?;
        db.accounts = accounts;
        let categories = reader.read_categories()?;

        let mut ids: Vec<&i64> = categories.keys().collect();
        ids.sort();
        for id in ids {
            let category = &categories[id];
            match classify_path(category) {
                Some(kind) => {
                    db.classifiers.entry(kind).or_default().insert(category.clone());
                }
                None => {
                    let top = category.split(':').next().unwrap_or_default();
                    db.issues.push(QualityIssue::unknown_classifier(top, category));
                }
            }
        }

        let indexes = Indexes {
            currencies,
            accounts: account_index,
            categories,
            tx_categories: reader.read_tx_categories()?,
        };
        db.transactions = reader.read_transactions(&indexes)?;

        log::debug!(
            "{}: {} currencies, {} accounts, {} categories, {} transactions",
            path.display(),
            indexes.currencies.len(),
            db.accounts.len(),
            indexes.categories.len(),
            db.transactions.len()
        );

        Ok(db)
    }
}

struct SqliteReader<'a> {
    conn: &'a Connection,
    path: &'a Path,
}

impl<'a> SqliteReader<'a> {
    fn format_error(&self, message: impl Into<String>) -> SourceError {
        SourceError::format(self.path, message)
    }

    /// Run a query and collect its rows
    fn query<T>(
        &self,
        sql: &str,
        map: impl FnMut(&Row) -> rusqlite::Result<T>,
    ) -> SourceResult<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| self.format_error(e.to_string()))?;

        let rows = stmt
            .query_map([], map)
            .map_err(|e| self.format_error(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| self.format_error(e.to_string()))
    }

    fn read_currencies(&self) -> SourceResult<HashMap<i64, Currency>> {
        let rows = self.query(CURRENCIES_SQL, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut currencies = HashMap::with_capacity(rows.len());
        for (id, code, precision) in rows {
            let precision = u32::try_from(precision).map_err(|_| {
                self.format_error(format!("currency {} has precision {}", code, precision))
            })?;
            currencies.insert(id, Currency::new(&code, precision));
        }
        Ok(currencies)
    }

    fn currency<'c>(
        &self,
        currencies: &'c HashMap<i64, Currency>,
        id: i64,
    ) -> SourceResult<&'c Currency> {
        currencies
            .get(&id)
            .ok_or_else(|| self.format_error(format!("unknown currency id {}", id)))
    }

    fn convert(&self, currency: &Currency, raw: i64) -> SourceResult<Decimal> {
        currency.convert_amount(raw).ok_or_else(|| {
            self.format_error(format!(
                "amount {} of {} cannot be scaled by precision {}",
                raw, currency.code, currency.precision
            ))
        })
    }

    fn read_rates(&self, currencies: &HashMap<i64, Currency>) -> SourceResult<Vec<Rate>> {
        let rows = self.query(RATES_SQL, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                raw_amount(row, 3)?.unwrap_or(0),
                raw_amount(row, 4)?.unwrap_or(0),
            ))
        })?;

        let mut rates = Vec::with_capacity(rows.len());
        for (date, c1, c2, v1, v2) in rows {
            let currency1 = self.currency(currencies, c1)?;
            let currency2 = self.currency(currencies, c2)?;
            rates.push(Rate {
                date: from_unix(date).map_err(|e| self.format_error(e))?,
                currency1: currency1.code.clone(),
                currency2: currency2.code.clone(),
                amount1: self.convert(currency1, v1)?,
                amount2: self.convert(currency2, v2)?,
            });
        }
        Ok(rates)
    }

    #[allow(clippy::type_complexity)]
    fn read_accounts(
        &self,
        currencies: &HashMap<i64, Currency>,
    ) -> SourceResult<(Vec<Account>, HashMap<i64, (String, Currency)>)> {
        let rows = self.query(ACCOUNTS_SQL, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                raw_amount(row, 2)?.unwrap_or(0),
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut accounts = Vec::with_capacity(rows.len());
        let mut index = HashMap::new();

        for (id, name, balance, currency_id) in rows {
            let currency = self.currency(currencies, currency_id)?;
            accounts.push(Account {
                name: name.clone(),
                currency: currency.code.clone(),
                init_balance: self.convert(currency, balance)?,
            });
            index.insert(id, (name, currency.clone()));
        }

        Ok((accounts, index))
    }

    /// Full category paths, parents resolved by walking the Parent chain
    fn read_categories(&self) -> SourceResult<HashMap<i64, String>> {
        let rows = self.query(CATEGORIES_SQL, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                CategoryRow {
                    name: row.get(1)?,
                    parent: row.get(2)?,
                },
            ))
        })?;
        let nodes: HashMap<i64, CategoryRow> = rows.into_iter().collect();

        let mut paths = HashMap::with_capacity(nodes.len());
        for id in nodes.keys() {
            paths.insert(*id, self.category_path(&nodes, *id)?);
        }
        Ok(paths)
    }

    fn category_path(&self, nodes: &HashMap<i64, CategoryRow>, id: i64) -> SourceResult<String> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            if !seen.insert(node_id) {
                return Err(self.format_error(format!("category {} has a cyclic parent chain", id)));
            }
            match nodes.get(&node_id) {
                Some(node) => {
                    names.push(node.name.as_str());
                    current = node.parent;
                }
                // Parent was deleted; what is left is the path
                None => break,
            }
        }

        names.reverse();
        Ok(join_path(names.into_iter().flat_map(|name| name.split(CATEGORY_DELIMITER))))
    }

    fn read_tx_categories(&self) -> SourceResult<HashMap<i64, Vec<i64>>> {
        let rows = self.query(TX_CATEGORIES_SQL, |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut index: HashMap<i64, Vec<i64>> = HashMap::new();
        for (category, tx) in rows {
            index.entry(tx).or_default().push(category);
        }
        Ok(index)
    }

    fn has_income_balance(&self) -> SourceResult<bool> {
        let columns = self.query(TRANSACTION_COLUMNS_SQL, |row| row.get::<_, String>(0))?;
        Ok(columns.iter().any(|name| name.eq_ignore_ascii_case(INCOME_BALANCE)))
    }

    fn read_transactions(&self, indexes: &Indexes) -> SourceResult<Vec<RawTransaction>> {
        let sql = if self.has_income_balance()? {
            transactions_sql(INCOME_BALANCE)
        } else {
            log::debug!("{}: no {} column", self.path.display(), INCOME_BALANCE);
            transactions_sql("NULL")
        };

        let rows = self.query(&sql, |row| {
            Ok(TransactionRow {
                id: row.get(0)?,
                date: row.get(1)?,
                executed: row.get(2)?,
                locked: row.get(3)?,
                income_account: row.get(4)?,
                income_amount: raw_amount(row, 5)?,
                income_balance: raw_amount(row, 6)?,
                expense_account: row.get(7)?,
                expense_amount: raw_amount(row, 8)?,
                comment: row.get(9)?,
            })
        })?;

        rows.iter()
            .map(|row| self.read_transaction(row, indexes))
            .collect()
    }

    fn leg(&self, indexes: &Indexes, account_id: i64, raw: Option<i64>) -> SourceResult<Leg> {
        let (name, currency) = indexes
            .accounts
            .get(&account_id)
            .ok_or_else(|| self.format_error(format!("unknown account id {}", account_id)))?;
        let amount = self.convert(currency, raw.unwrap_or(0))?;
        Ok(Leg::new(name, &currency.code, amount))
    }

    fn read_transaction(&self, row: &TransactionRow, indexes: &Indexes) -> SourceResult<RawTransaction> {
        let kind = match (row.income_account, row.expense_account) {
            (Some(income), Some(expense)) => Some(TxKind::Transfer {
                expense: self.leg(indexes, expense, row.expense_amount)?,
                income: self.leg(indexes, income, row.income_amount)?,
            }),
            (Some(income), None) if row.income_amount.is_none() && row.income_balance.is_some() => {
                Some(TxKind::Balance(self.leg(indexes, income, row.income_balance)?))
            }
            (Some(income), None) => Some(TxKind::Income(self.leg(indexes, income, row.income_amount)?)),
            (None, Some(expense)) => Some(TxKind::Expense(self.leg(indexes, expense, row.expense_amount)?)),
            (None, None) => None,
        };

        let mut metadata = Metadata::new();
        if let Some(categories) = indexes.tx_categories.get(&row.id) {
            for category in categories {
                let Some(path) = indexes.categories.get(category) else {
                    continue;
                };
                if let Some(kind) = classify_path(path) {
                    metadata.insert(kind, path.clone());
                }
            }
        }

        Ok(RawTransaction {
            date: from_unix(row.date).map_err(|e| self.format_error(e))?,
            comment: row.comment.clone().unwrap_or_default(),
            payee: None,
            executed: row.executed,
            locked: row.locked,
            kind,
            metadata,
        })
    }
}

impl Database for SqliteDatabase {
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

    fn issues(&self) -> &[QualityIssue] {
        &self.issues
    }
}

// ============================================================================
// TESTS
// ============================================================================
