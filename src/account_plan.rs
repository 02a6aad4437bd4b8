// 🗂️ Account-Plan Flattener
//
// Ability Cash groups accounts into folders. The ledger wants one flat
// name per account: the folder path followed by the short account name.
//
//   Root
//   ├── Bank Card          -> "Bank Card"
//   └── Cash
//       └── Wallet         -> "Cash:Wallet"
//
// Short names must be unique inside one plan. When they are not, the first
// mapping is kept and the duplicate is handed to the caller, who decides
// whether that is a warning or something worse.

use crate::classifier::{join_path, PATH_DELIMITER};
use crate::quality::{QualityIssue, QualityReport};
use std::collections::BTreeMap;

/// Raw account identifier -> canonical ledger account
pub type AccountNameMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFolder {
    pub name: String,
    pub accounts: Vec<String>,
    pub folders: Vec<PlanFolder>,
}

impl PlanFolder {
    pub fn new(name: &str) -> Self {
        PlanFolder {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_account(mut self, name: &str) -> Self {
        self.accounts.push(name.to_string());
        self
    }

    pub fn with_folder(mut self, folder: PlanFolder) -> Self {
        self.folders.push(folder);
        self
    }

    /// Insert an account under a folder path, creating folders on the way.
    /// Used to rebuild a tree from flat remap tables.
    pub fn insert(&mut self, folder_path: &[&str], account: &str) {
        match folder_path.split_first() {
            None => self.accounts.push(account.to_string()),
            Some((head, rest)) => {
                let position = self.folders.iter().position(|f| f.name == *head);
                let folder = match position {
                    Some(i) => &mut self.folders[i],
                    None => {
                        self.folders.push(PlanFolder::new(head));
                        let last = self.folders.len() - 1;
                        &mut self.folders[last]
                    }
                };
                folder.insert(rest, account);
            }
        }
    }
}

/// Flatten a plan. The root folder's own name is not part of any path.
///
/// Accounts of a folder come before the accounts of its sub-folders.
pub fn flatten(plan: &PlanFolder, mut on_duplicate: impl FnMut(&str)) -> AccountNameMap {
    let mut target = AccountNameMap::new();
    fill_accounts(plan, "", &mut target, &mut on_duplicate);
    target
}

/// flatten() that records duplicates as quality issues
pub fn flatten_reporting(plan: &PlanFolder, report: &mut QualityReport) -> AccountNameMap {
    flatten(plan, |duplicate| {
        report.push(QualityIssue::duplicate_account(duplicate))
    })
}

fn fill_accounts(
    folder: &PlanFolder,
    prefix: &str,
    target: &mut AccountNameMap,
    on_duplicate: &mut dyn FnMut(&str),
) {
    for account in &folder.accounts {
        if target.contains_key(account) {
            on_duplicate(account);
        } else {
            target.insert(account.clone(), join_path([prefix, account.as_str()]));
        }
    }

    for child in &folder.folders {
        let child_prefix = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}{}{}", prefix, PATH_DELIMITER, child.name)
        };
        fill_accounts(child, &child_prefix, target, on_duplicate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> PlanFolder {
        PlanFolder::new("Root")
            .with_account("Bank Card")
            .with_folder(
                PlanFolder::new("Cash")
                    .with_account("Wallet")
                    .with_folder(PlanFolder::new("Safe").with_account("Box")),
            )
            .with_folder(PlanFolder::new("Travel").with_account("Wallet"))
    }

    #[test]
    fn test_flatten_builds_paths() {
        let map = flatten(&sample_plan(), |_| {});
        assert_eq!(map["Bank Card"], "Bank Card");
        assert_eq!(map["Wallet"], "Cash:Wallet");
        assert_eq!(map["Box"], "Cash:Safe:Box");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_flatten_first_write_wins_and_reports() {
        let mut duplicates = Vec::new();
        let map = flatten(&sample_plan(), |d| duplicates.push(d.to_string()));
        assert_eq!(map["Wallet"], "Cash:Wallet");
        assert_eq!(duplicates, vec!["Wallet".to_string()]);
    }

    #[test]
    fn test_flatten_accounts_before_subfolders() {
        // "Card" in a sub-folder loses against the same name one level up,
        // even though the sub-folder is listed first
        let plan = PlanFolder::new("Root")
            .with_folder(PlanFolder::new("Nested").with_account("Card"))
            .with_account("Card");
        let mut duplicates = Vec::new();
        let map = flatten(&plan, |d| duplicates.push(d.to_string()));
        assert_eq!(map["Card"], "Card");
        assert_eq!(duplicates, vec!["Card".to_string()]);
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let plan = sample_plan();
        let mut first_report = QualityReport::new();
        let mut second_report = QualityReport::new();
        let first = flatten_reporting(&plan, &mut first_report);
        let second = flatten_reporting(&plan, &mut second_report);
        assert_eq!(first, second);
        assert_eq!(first_report, second_report);
    }

    #[test]
    fn test_insert_rebuilds_tree() {
        let mut plan = PlanFolder::new("Root");
        plan.insert(&["Cash"], "Wallet");
        plan.insert(&["Cash", "Safe"], "Box");
        plan.insert(&[], "Bank Card");
        plan.insert(&["Cash"], "Jar");

        assert_eq!(plan.folders.len(), 1);
        let map = flatten(&plan, |_| {});
        assert_eq!(map.len(), 4);
        assert_eq!(map["Jar"], "Cash:Jar");
        assert_eq!(map["Box"], "Cash:Safe:Box");
    }
}
