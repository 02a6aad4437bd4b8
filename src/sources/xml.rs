// 📄 XML Reader - Ability Cash XML export
//
// One hierarchical document:
//   <ability-cash>
//     <rates>, <accounts>, <account-plans>, <transactions>, <classifiers>
//   </ability-cash>
//
// Transactions carry exactly one of <transfer>, <expense>, <income>,
// <balance>. Status flags are empty marker elements (<executed/>,
// <locked/>): present means true.

use super::{Account, Database, Leg, Rate, RawTransaction, TxKind};
use crate::account_plan::PlanFolder;
use crate::classifier::{
    classify_path, join_path, ClassifierEntry, ClassifierKind, Classifiers, Metadata,
};
use crate::error::{SourceError, SourceResult};
use crate::money::{parse_amount, parse_date, parse_timestamp};
use crate::quality::QualityIssue;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// DOCUMENT SCHEMA
// ============================================================================

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct Document {
    #[serde(default)]
    rates: RateList,
    #[serde(default)]
    accounts: AccountList,
    #[serde(default)]
    account_plans: PlanList,
    #[serde(default)]
    transactions: TransactionList,
    #[serde(default)]
    classifiers: ClassifierList,
}

#[derive(Deserialize, Debug, Default)]
struct RateList {
    #[serde(rename = "rate", default)]
    items: Vec<XmlRate>,
}

#[derive(Deserialize, Debug, Default)]
struct AccountList {
    #[serde(rename = "account", default)]
    items: Vec<XmlAccount>,
}

#[derive(Deserialize, Debug, Default)]
struct PlanList {
    #[serde(rename = "account-plan", default)]
    items: Vec<XmlFolder>,
}

#[derive(Deserialize, Debug, Default)]
struct TransactionList {
    #[serde(rename = "transaction", default)]
    items: Vec<XmlTransaction>,
}

#[derive(Deserialize, Debug, Default)]
struct ClassifierList {
    #[serde(rename = "classifier", default)]
    items: Vec<XmlClassifier>,
}

#[derive(Deserialize, Debug)]
struct XmlRate {
    date: String,
    #[serde(rename = "currency-1")]
    currency1: String,
    #[serde(rename = "currency-2")]
    currency2: String,
    #[serde(rename = "amount-1")]
    amount1: String,
    #[serde(rename = "amount-2")]
    amount2: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct XmlAccount {
    name: String,
    currency: String,
    #[serde(default)]
    init_balance: String,
}

/// Both <account-plan> and nested <folder> elements
#[derive(Deserialize, Debug, Default)]
struct XmlFolder {
    #[serde(default)]
    name: String,
    #[serde(rename = "account", default)]
    accounts: Vec<XmlPlanAccount>,
    #[serde(rename = "folder", default)]
    folders: Vec<XmlFolder>,
}

#[derive(Deserialize, Debug)]
struct XmlPlanAccount {
    name: String,
}

#[derive(Deserialize, Debug)]
struct XmlTransaction {
    date: String,
    #[serde(default)]
    comment: String,
    transfer: Option<XmlPayload>,
    expense: Option<XmlPayload>,
    income: Option<XmlPayload>,
    balance: Option<XmlPayload>,
}

/// Empty marker element
#[derive(Deserialize, Debug)]
struct Marker {}

/// Body shared by the four variants; which fields must be present depends
/// on the variant
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct XmlPayload {
    #[serde(rename = "@changed-at", default)]
    changed_at: Option<String>,
    executed: Option<Marker>,
    locked: Option<Marker>,
    income_account: Option<XmlTxAccount>,
    income_amount: Option<String>,
    income_balance: Option<String>,
    expense_account: Option<XmlTxAccount>,
    expense_amount: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<XmlTxCategory>,
}

#[derive(Deserialize, Debug)]
struct XmlTxAccount {
    name: String,
    currency: String,
}

/// A category reference as a chain: root -> child -> ... -> leaf
#[derive(Deserialize, Debug)]
struct XmlTxCategory {
    #[serde(rename = "@classifier", default)]
    classifier: String,
    #[serde(default)]
    name: String,
    category: Option<Box<XmlTxCategory>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct XmlClassifier {
    #[serde(default)]
    singular_name: String,
    #[serde(default)]
    plural_name: String,
    income_tree: Option<XmlTree>,
    expense_tree: Option<XmlTree>,
    single_tree: Option<XmlTree>,
}

#[derive(Deserialize, Debug, Default)]
struct XmlTree {
    #[serde(rename = "category", default)]
    categories: Vec<XmlTreeNode>,
}

#[derive(Deserialize, Debug)]
struct XmlTreeNode {
    name: String,
    #[serde(rename = "category", default)]
    children: Vec<XmlTreeNode>,
}

// ============================================================================
// SCHEMA HELPERS
// ============================================================================

impl XmlTxCategory {
    /// (classifier name, canonical path)
    fn flatten(&self) -> (&str, String) {
        let mut segments = vec![self.name.as_str()];
        let mut next = self.category.as_deref();
        while let Some(category) = next {
            segments.push(category.name.as_str());
            next = category.category.as_deref();
        }
        (self.classifier.as_str(), join_path(segments))
    }
}

impl XmlClassifier {
    fn kind(&self) -> Option<ClassifierKind> {
        if self.income_tree.is_some() || self.expense_tree.is_some() {
            return Some(ClassifierKind::ExpenseCategory);
        }
        ClassifierKind::from_classifier_name(&self.singular_name)
            .or_else(|| ClassifierKind::from_classifier_name(&self.plural_name))
    }

    fn trees(&self) -> impl Iterator<Item = &XmlTree> {
        [&self.income_tree, &self.expense_tree, &self.single_tree]
            .into_iter()
            .flatten()
    }
}

/// Every node path of a category tree, parents before children
fn collect_paths(nodes: &[XmlTreeNode], prefix: &str, out: &mut Vec<String>) {
    for node in nodes {
        let path = join_path([prefix, node.name.as_str()]);
        out.push(path.clone());
        collect_paths(&node.children, &path, out);
    }
}

impl From<&XmlFolder> for PlanFolder {
    fn from(folder: &XmlFolder) -> Self {
        PlanFolder {
            name: folder.name.clone(),
            accounts: folder.accounts.iter().map(|a| a.name.clone()).collect(),
            folders: folder.folders.iter().map(PlanFolder::from).collect(),
        }
    }
}

// ============================================================================
// XML DATABASE
// ============================================================================

#[derive(Debug, Default)]
pub struct XmlDatabase {
    accounts: Vec<Account>,
    rates: Vec<Rate>,
    transactions: Vec<RawTransaction>,
    classifiers: Classifiers,
    plan: PlanFolder,
    issues: Vec<QualityIssue>,
}

impl XmlDatabase {
    pub fn read(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse document text; `path` only labels errors
    pub fn parse(path: &Path, content: &str) -> SourceResult<Self> {
        let document: Document = quick_xml::de::from_str(content)
            .map_err(|e| SourceError::format(path, e.to_string()))?;

        let plan = match document.account_plans.items.as_slice() {
            [plan] => PlanFolder::from(plan),
            plans => {
                return Err(SourceError::format(
                    path,
                    format!("expected exactly one account plan, found {}", plans.len()),
                ))
            }
        };

        let mut db = XmlDatabase {
            plan,
            ..Default::default()
        };

        let kinds = db.read_classifiers(&document.classifiers.items);

        for account in &document.accounts.items {
            db.accounts.push(Account {
                name: account.name.clone(),
                currency: account.currency.clone(),
                init_balance: parse_amount(&account.init_balance)
                    .map_err(|e| SourceError::format(path, e))?,
            });
        }

        for rate in &document.rates.items {
            db.rates.push(read_rate(rate).map_err(|e| SourceError::format(path, e))?);
        }

        for (index, tx) in document.transactions.items.iter().enumerate() {
            let raw = db
                .read_transaction(tx, &kinds)
                .map_err(|e| SourceError::format(path, format!("transaction #{}: {}", index + 1, e)))?;
            db.transactions.push(raw);
        }

        log::debug!(
            "{}: {} accounts, {} rates, {} transactions",
            path.display(),
            db.accounts.len(),
            db.rates.len(),
            db.transactions.len()
        );

        Ok(db)
    }

    /// Enumerate categories and remember which classifier name means what
    fn read_classifiers(&mut self, classifiers: &[XmlClassifier]) -> HashMap<String, ClassifierKind> {
        let mut kinds = HashMap::new();

        for classifier in classifiers {
            let Some(kind) = classifier.kind() else {
                log::debug!("ignoring classifier `{}`", classifier.singular_name);
                continue;
            };
            for name in [&classifier.singular_name, &classifier.plural_name] {
                if !name.is_empty() {
                    kinds.insert(name.clone(), kind);
                }
            }

            let mut paths = Vec::new();
            for tree in classifier.trees() {
                collect_paths(&tree.categories, "", &mut paths);
            }
            self.classifiers.entry(kind).or_default().extend(paths);
        }

        kinds
    }

    fn read_transaction(
        &mut self,
        tx: &XmlTransaction,
        kinds: &HashMap<String, ClassifierKind>,
    ) -> Result<RawTransaction, String> {
        let date = parse_date(&tx.date)?;

        let (kind, payload) = if let Some(p) = &tx.transfer {
            (
                Some(TxKind::Transfer {
                    expense: expense_leg(p)?,
                    income: income_leg(p, p.income_amount.as_deref())?,
                }),
                Some(p),
            )
        } else if let Some(p) = &tx.expense {
            (Some(TxKind::Expense(expense_leg(p)?)), Some(p))
        } else if let Some(p) = &tx.income {
            (
                Some(TxKind::Income(income_leg(p, p.income_amount.as_deref())?)),
                Some(p),
            )
        } else if let Some(p) = &tx.balance {
            (
                Some(TxKind::Balance(income_leg(p, p.income_balance.as_deref())?)),
                Some(p),
            )
        } else {
            (None, None)
        };

        // Checked for well-formedness only
        if let Some(text) = payload.and_then(|p| p.changed_at.as_deref()) {
            parse_timestamp(text)?;
        }

        let metadata = match payload {
            Some(p) => self.read_categories(&p.categories, kinds),
            None => Metadata::new(),
        };

        Ok(RawTransaction {
            date,
            comment: tx.comment.clone(),
            payee: None,
            executed: payload.map(|p| p.executed.is_some()).unwrap_or(false),
            locked: payload.map(|p| p.locked.is_some()).unwrap_or(false),
            kind,
            metadata,
        })
    }

    fn read_categories(
        &mut self,
        categories: &[XmlTxCategory],
        kinds: &HashMap<String, ClassifierKind>,
    ) -> Metadata {
        let mut entries = Vec::new();

        for category in categories {
            let (classifier, path) = category.flatten();
            let kind = kinds
                .get(classifier)
                .copied()
                .or_else(|| ClassifierKind::from_classifier_name(classifier))
                .or_else(|| classify_path(&path));

            match kind {
                Some(kind) => entries.push(ClassifierEntry::new(kind, path)),
                None => self
                    .issues
                    .push(QualityIssue::unknown_classifier(classifier, &path)),
            }
        }

        crate::classifier::to_metadata(entries)
    }
}

fn read_rate(rate: &XmlRate) -> Result<Rate, String> {
    Ok(Rate {
        date: parse_date(&rate.date)?,
        currency1: rate.currency1.clone(),
        currency2: rate.currency2.clone(),
        amount1: parse_amount(&rate.amount1)?,
        amount2: parse_amount(&rate.amount2)?,
    })
}

fn expense_leg(payload: &XmlPayload) -> Result<Leg, String> {
    let account = payload
        .expense_account
        .as_ref()
        .ok_or("missing <expense-account>")?;
    let amount = required_amount(payload.expense_amount.as_deref(), "expense-amount")?;
    Ok(Leg::new(&account.name, &account.currency, amount))
}

fn income_leg(payload: &XmlPayload, amount: Option<&str>) -> Result<Leg, String> {
    let account = payload
        .income_account
        .as_ref()
        .ok_or("missing <income-account>")?;
    let amount = required_amount(amount, "income-amount/income-balance")?;
    Ok(Leg::new(&account.name, &account.currency, amount))
}

fn required_amount(text: Option<&str>, field: &str) -> Result<Decimal, String> {
    match text {
        Some(text) => parse_amount(text),
        None => Err(format!("missing <{}>", field)),
    }
}

impl Database for XmlDatabase {
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::account_plan::flatten;
    use chrono::NaiveDate;

    pub(crate) const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ability-cash>
  <currencies>
    <currency oid="c1" changed-at="2011-01-01T10:00:00"><name>Dollar</name><code>USD</code><precision>2</precision></currency>
  </currencies>
  <rates>
    <rate oid="r1" changed-at="2011-01-01T10:00:00">
      <date>2011-01-01</date>
      <currency-1>USD</currency-1><currency-2>EUR</currency-2>
      <amount-1>1</amount-1><amount-2>0.75</amount-2>
    </rate>
  </rates>
  <accounts>
    <account oid="a1" changed-at="2011-01-01T10:00:00"><name>Wallet</name><currency>USD</currency><init-balance>100.00</init-balance></account>
    <account oid="a2" changed-at="2011-01-01T10:00:00"><name>Card</name><currency>USD</currency><init-balance>0</init-balance></account>
    <account oid="a3" changed-at="2011-01-01T10:00:00"><name>Euro</name><currency>EUR</currency></account>
  </accounts>
  <account-plans>
    <account-plan oid="p1">
      <name>Main</name>
      <account><name>Card</name></account>
      <folder>
        <name>Cash</name>
        <account><name>Wallet</name></account>
        <account><name>Euro</name></account>
      </folder>
    </account-plan>
  </account-plans>
  <transactions>
    <transaction oid="t1">
      <date>2011-01-02</date>
      <transfer changed-at="2011-01-02T12:30:00">
        <executed/>
        <locked/>
        <income-account><name>Card</name><currency>USD</currency></income-account>
        <income-amount>20</income-amount>
        <expense-account><name>Wallet</name><currency>USD</currency></expense-account>
        <expense-amount>-20</expense-amount>
      </transfer>
    </transaction>
    <transaction oid="t2">
      <date>2011-01-03</date>
      <comment>weekly shopping</comment>
      <expense changed-at="2011-01-03T09:00:00">
        <executed/>
        <expense-account><name>Wallet</name><currency>USD</currency></expense-account>
        <expense-amount>-50.00</expense-amount>
        <category classifier="Category"><name>Groceries</name></category>
        <category classifier="Payee"><name>Shops</name><category><name>Corner</name></category></category>
      </expense>
    </transaction>
    <transaction oid="t3">
      <date>2011-01-04</date>
      <income changed-at="2011-01-04T09:00:00">
        <executed/>
        <income-account><name>Card</name><currency>USD</currency></income-account>
        <income-amount>1000</income-amount>
        <category classifier="Category"><name>Salary</name></category>
      </income>
    </transaction>
    <transaction oid="t4">
      <date>2011-01-05</date>
      <balance changed-at="2011-01-05T09:00:00">
        <executed/>
        <locked/>
        <income-account><name>Wallet</name><currency>USD</currency></income-account>
        <income-balance>29.5</income-balance>
      </balance>
    </transaction>
    <transaction oid="t5">
      <date>2011-02-01</date>
      <expense changed-at="2011-01-05T09:00:00">
        <expense-account><name>Wallet</name><currency>USD</currency></expense-account>
        <expense-amount>-10</expense-amount>
        <category classifier="Category"><name>Groceries</name></category>
      </expense>
    </transaction>
  </transactions>
  <classifiers>
    <classifier oid="k1">
      <singular-name>Category</singular-name>
      <plural-name>Categories</plural-name>
      <income-tree><category><name>Salary</name></category></income-tree>
      <expense-tree>
        <category><name>Groceries</name></category>
        <category><name>Home</name><category><name>Rent</name></category></category>
      </expense-tree>
    </classifier>
    <classifier oid="k2">
      <singular-name>Payee</singular-name>
      <plural-name>Payees</plural-name>
      <single-tree><category><name>Shops</name><category><name>Corner</name></category></category></single-tree>
    </classifier>
    <classifier oid="k3">
      <singular-name>Project</singular-name>
      <plural-name>Projects</plural-name>
      <single-tree><category><name>Renovation</name></category></single-tree>
    </classifier>
  </classifiers>
</ability-cash>
"#;

    fn sample() -> XmlDatabase {
        XmlDatabase::parse(Path::new("sample.xml"), SAMPLE).unwrap()
    }

    #[test]
    fn test_xml_reads_accounts_and_rates() {
        let db = sample();
        assert_eq!(db.accounts().len(), 3);
        assert_eq!(db.accounts()[0].init_balance, Decimal::new(10000, 2));
        assert_eq!(db.accounts()[2].init_balance, Decimal::ZERO);

        let rate = &db.rates()[0];
        assert_eq!(rate.currency1, "USD");
        assert_eq!(rate.currency2, "EUR");
        assert_eq!(rate.amount2, Decimal::new(75, 2));
        assert_eq!(rate.date.date(), NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
    }

    #[test]
    fn test_xml_transaction_variants() {
        let db = sample();
        let txs = db.transactions();
        assert_eq!(txs.len(), 5);

        assert!(matches!(txs[0].kind, Some(TxKind::Transfer { .. })));
        assert!(matches!(txs[1].kind, Some(TxKind::Expense(_))));
        assert!(matches!(txs[2].kind, Some(TxKind::Income(_))));
        match &txs[3].kind {
            Some(TxKind::Balance(leg)) => assert_eq!(leg.amount, Decimal::new(295, 1)),
            other => panic!("expected balance, got {:?}", other),
        }
    }

    #[test]
    fn test_xml_markers() {
        let db = sample();
        let txs = db.transactions();
        assert!(txs[0].executed && txs[0].locked);
        assert!(txs[1].executed && !txs[1].locked);
        assert!(!txs[4].executed);
        assert_eq!(txs[1].comment, "weekly shopping");
    }

    #[test]
    fn test_xml_categories_become_metadata() {
        let db = sample();
        let expense = &db.transactions()[1];
        assert_eq!(
            expense.metadata.get(&ClassifierKind::ExpenseCategory),
            Some(&"Groceries".to_string())
        );
        assert_eq!(
            expense.metadata.get(&ClassifierKind::Payee),
            Some(&"Shops:Corner".to_string())
        );
    }

    #[test]
    fn test_xml_classifier_enumeration() {
        let db = sample();
        let categories = &db.classifiers()[&ClassifierKind::ExpenseCategory];
        assert!(categories.contains("Salary"));
        assert!(categories.contains("Home"));
        assert!(categories.contains("Home:Rent"));
        assert!(db.classifiers()[&ClassifierKind::Payee].contains("Shops:Corner"));
        // "Project" is not a ledger classifier
        assert_eq!(db.classifiers().len(), 2);
    }

    #[test]
    fn test_xml_account_plan() {
        let db = sample();
        let map = flatten(&db.account_plan(), |_| {});
        assert_eq!(map["Wallet"], "Cash:Wallet");
        assert_eq!(map["Card"], "Card");
    }

    #[test]
    fn test_xml_requires_single_account_plan() {
        let doc = SAMPLE.replace(
            "</account-plans>",
            "<account-plan><name>Second</name></account-plan></account-plans>",
        );
        let result = XmlDatabase::parse(Path::new("two.xml"), &doc);
        assert!(matches!(result, Err(SourceError::Format { .. })));
    }

    #[test]
    fn test_xml_malformed_date_is_format_error() {
        let doc = SAMPLE.replace("<date>2011-01-03</date>", "<date>03.01.2011</date>");
        let result = XmlDatabase::parse(Path::new("bad.xml"), &doc);
        assert!(matches!(result, Err(SourceError::Format { .. })));
    }

    #[test]
    fn test_xml_malformed_changed_at_is_format_error() {
        let doc = SAMPLE.replace(
            r#"<transfer changed-at="2011-01-02T12:30:00">"#,
            r#"<transfer changed-at="02.01.2011 12:30">"#,
        );
        let result = XmlDatabase::parse(Path::new("bad.xml"), &doc);
        assert!(matches!(result, Err(SourceError::Format { .. })));
    }

    #[test]
    fn test_xml_unknown_classifier_is_reported() {
        let doc = SAMPLE.replace(
            r#"<category classifier="Category"><name>Salary</name></category>"#,
            r#"<category classifier="Project"><name>Renovation</name></category>"#,
        );
        let db = XmlDatabase::parse(Path::new("p.xml"), &doc).unwrap();
        assert!(db.transactions()[2].metadata.is_empty());
        assert_eq!(db.issues().len(), 1);
    }

    #[test]
    fn test_xml_transaction_without_payload() {
        let doc = SAMPLE.replace(
            "</transactions>",
            "<transaction oid=\"t9\"><date>2011-03-01</date></transaction></transactions>",
        );
        let db = XmlDatabase::parse(Path::new("p.xml"), &doc).unwrap();
        let last = db.transactions().last().unwrap();
        assert_eq!(last.kind, None);
        assert!(!last.executed);
    }

    #[test]
    fn test_xml_garbage_is_format_error() {
        let result = XmlDatabase::parse(Path::new("junk.xml"), "<ability-cash><rates>");
        assert!(matches!(result, Err(SourceError::Format { .. })));
    }
}
