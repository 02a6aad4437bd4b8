// AbilityCash → Ledger - Core Library
// Readers for the three export formats, the ledger converter and scope handling

pub mod error;
pub mod money;          // Scaled integers, decimal text, dates
pub mod classifier;     // Category kinds and paths
pub mod quality;        // Non-fatal findings for the operator
pub mod account_plan;   // Folder tree -> flat ledger account names
pub mod ledger;         // Canonical transaction model
pub mod sources;        // XML, CSV and SQLite readers
pub mod converter;
pub mod export;
pub mod scope;

// Re-export commonly used types
pub use error::{SourceError, SourceResult};
pub use money::Currency;
pub use classifier::{classify, ClassifierKind, Classifiers, Metadata};
pub use quality::{IssueKind, QualityIssue, QualityReport, Severity};
pub use account_plan::{flatten, AccountNameMap, PlanFolder};
pub use ledger::{Transaction, TxItem};
pub use sources::{
    detect_format, read_database,
    Account, Database, Rate, RawTransaction, SourceFormat, TxKind,
    CsvDatabase, SqliteDatabase, XmlDatabase,
};
pub use converter::{ClassifierMap, Conversion, LedgerConverter};
pub use scope::{Datafile, Scope, DEFAULT_SCOPE_FILE};
