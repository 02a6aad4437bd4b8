// 🏷️ Classifier Resolver
//
// Ability Cash tags transactions with categories from several classifiers.
// Three of them matter for the ledger: the expense/income category tree,
// the payee list and the agent list. Every reader funnels its raw category
// representation through this module so the kinds mean the same thing
// regardless of the export format.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Delimiter of canonical account and category paths
pub const PATH_DELIMITER: &str = ":";

// ============================================================================
// CLASSIFIER KIND
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassifierKind {
    #[default]
    ExpenseCategory,
    Payee,
    Agent,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::ExpenseCategory => "ExpenseCategory",
            ClassifierKind::Payee => "Payee",
            ClassifierKind::Agent => "Agent",
        }
    }

    /// Kind of a classifier by its display name in the source application
    /// (XML `singular-name`/`plural-name`, CSV `categories.csv` first column).
    pub fn from_classifier_name(name: &str) -> Option<ClassifierKind> {
        match name.trim() {
            "ExpenseCategory" | "Category" | "Categories" => Some(ClassifierKind::ExpenseCategory),
            "Payee" | "Payees" | "Provider" | "Providers" => Some(ClassifierKind::Payee),
            "Agent" | "Agents" => Some(ClassifierKind::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a category by the top-level segment of its path.
/// Anything else is not a classification the ledger cares about.
pub fn classify(top_level_segment: &str) -> Option<ClassifierKind> {
    match top_level_segment {
        "Income" | "Expenses" => Some(ClassifierKind::ExpenseCategory),
        "Payee" => Some(ClassifierKind::Payee),
        "Agents" => Some(ClassifierKind::Agent),
        _ => None,
    }
}

/// classify() applied to the first segment of a canonical path
pub fn classify_path(path: &str) -> Option<ClassifierKind> {
    classify(path.split(PATH_DELIMITER).next().unwrap_or(""))
}

// ============================================================================
// PATHS
// ============================================================================

/// Join segments with the canonical delimiter, skipping empty ones
pub fn join_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(PATH_DELIMITER)
}

/// Normalise a path written with a source-specific delimiter
/// ("\Expenses\Food" -> "Expenses:Food")
pub fn normalize_path(raw: &str, delimiter: char) -> String {
    join_path(raw.split(delimiter))
}


// ============================================================================
// ENTRIES
// ============================================================================

/// Classifier metadata carried by one transaction; last write per kind wins
pub type Metadata = BTreeMap<ClassifierKind, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierEntry {
    pub kind: ClassifierKind,
    pub path: String,
}

impl ClassifierEntry {
    pub fn new(kind: ClassifierKind, path: impl Into<String>) -> Self {
        ClassifierEntry {
            kind,
            path: path.into(),
        }
    }
}

/// Fold entries into transaction metadata
pub fn to_metadata(entries: impl IntoIterator<Item = ClassifierEntry>) -> Metadata {
    let mut metadata = Metadata::new();
    for entry in entries {
        metadata.insert(entry.kind, entry.path);
    }
    metadata
}

/// Every category known to a source, grouped by kind
pub type Classifiers = BTreeMap<ClassifierKind, BTreeSet<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_fixed_mapping() {
        assert_eq!(classify("Income"), Some(ClassifierKind::ExpenseCategory));
        assert_eq!(classify("Expenses"), Some(ClassifierKind::ExpenseCategory));
        assert_eq!(classify("Payee"), Some(ClassifierKind::Payee));
        assert_eq!(classify("Agents"), Some(ClassifierKind::Agent));
        assert_eq!(classify("Projects"), None);
        assert_eq!(classify("expenses"), None);
    }

    #[test]
    fn test_classify_path_uses_first_segment() {
        assert_eq!(
            classify_path("Expenses:Food:Coffee"),
            Some(ClassifierKind::ExpenseCategory)
        );
        assert_eq!(classify_path("Payee:Shop"), Some(ClassifierKind::Payee));
        assert_eq!(classify_path("Food:Expenses"), None);
    }

    #[test]
    fn test_classifier_names() {
        assert_eq!(
            ClassifierKind::from_classifier_name("Provider"),
            Some(ClassifierKind::Payee)
        );
        assert_eq!(
            ClassifierKind::from_classifier_name("Category"),
            Some(ClassifierKind::ExpenseCategory)
        );
        assert_eq!(ClassifierKind::from_classifier_name("Project"), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("\\Expenses\\Food", '\\'), "Expenses:Food");
        assert_eq!(normalize_path("Root", '\\'), "Root");
        assert_eq!(normalize_path("", '\\'), "");
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let metadata = to_metadata(vec![
            ClassifierEntry::new(ClassifierKind::Payee, "Payee:A"),
            ClassifierEntry::new(ClassifierKind::Payee, "Payee:B"),
            ClassifierEntry::new(ClassifierKind::Agent, "Agents:Me"),
        ]);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[&ClassifierKind::Payee], "Payee:B");
    }

    #[test]
    fn test_kind_serializes_as_map_key() {
        let mut map = BTreeMap::new();
        map.insert(ClassifierKind::ExpenseCategory, "x".to_string());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"ExpenseCategory":"x"}"#);
        let back: BTreeMap<ClassifierKind, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
