// ✅ Data Quality Report
//
// Non-fatal findings collected while preparing or converting a datafile.
// They point the operator at entries of the lookup tables that need a
// manual fix; conversion itself carries on with a best-effort fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Output was produced with a fallback value
    Info,    // Nothing lost, just worth a look
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    DuplicateAccountName,
    UnresolvedClassifier,
    UnrecognizedTransaction,
    UnknownClassifier,
}

// ============================================================================
// QUALITY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// What the issue is about (account name, category path, date...)
    pub subject: String,
    pub issue: String,
    pub recommendation: String,
}

impl QualityIssue {
    pub fn duplicate_account(short_name: &str) -> Self {
        QualityIssue {
            severity: Severity::Warning,
            kind: IssueKind::DuplicateAccountName,
            subject: short_name.to_string(),
            issue: format!("duplicate account name: {}", short_name),
            recommendation: "rename one of the accounts in the lookup table by hand".to_string(),
        }
    }

    pub fn unresolved_classifier(path: &str, fallback: &str) -> Self {
        QualityIssue {
            severity: Severity::Warning,
            kind: IssueKind::UnresolvedClassifier,
            subject: path.to_string(),
            issue: format!("no ledger account for category `{}`, using `{}`", path, fallback),
            recommendation: "add the category to the classifier lookup table".to_string(),
        }
    }

    pub fn unrecognized_transaction(subject: &str) -> Self {
        QualityIssue {
            severity: Severity::Warning,
            kind: IssueKind::UnrecognizedTransaction,
            subject: subject.to_string(),
            issue: format!("transaction {} is neither transfer, expense, income nor balance", subject),
            recommendation: "check the source for placeholder transactions".to_string(),
        }
    }

    pub fn unknown_classifier(classifier: &str, path: &str) -> Self {
        QualityIssue {
            severity: Severity::Info,
            kind: IssueKind::UnknownClassifier,
            subject: path.to_string(),
            issue: format!("category `{}` of classifier `{}` dropped", path, classifier),
            recommendation: "only Category, Payee and Agent classifiers reach the ledger".to_string(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} ({})", self.severity, self.issue, self.recommendation)
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: QualityIssue) {
        log::warn!("{}", issue.issue);
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Issues: {} ({} warnings)",
            self.issues.len(),
            self.issues
                .iter()
                .filter(|i| i.severity == Severity::Warning)
                .count()
        )
    }
}
