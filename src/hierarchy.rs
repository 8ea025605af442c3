use crate::chart_of_accounts::Account;
use crate::utils::{code_level, parent_code};
use log::warn;
use std::collections::HashMap;

/// Read-only lookup structures over one chart's accounts.
///
/// Accounts live in a dense slice; everything else refers to them by index.
/// `children_of` only records a child when its parent code is present in the
/// chart, so orphans are resolvable but never rolled up. No cycle check is
/// performed here.
#[derive(Debug)]
pub struct Hierarchy<'c> {
    accounts: &'c [Account],
    by_code: HashMap<&'c str, usize>,
    children_of: Vec<Vec<usize>>,
    level_of: Vec<usize>,
}

impl<'c> Hierarchy<'c> {
    pub fn build(accounts: &'c [Account]) -> Self {
        let mut by_code = HashMap::with_capacity(accounts.len());
        for (idx, account) in accounts.iter().enumerate() {
            if by_code.insert(account.code.as_str(), idx).is_some() {
                warn!("Duplicate account code {}; the last definition wins", account.code);
            }
        }

        let mut children_of = vec![Vec::new(); accounts.len()];
        for (idx, account) in accounts.iter().enumerate() {
            // Shadowed duplicates never become children.
            if by_code.get(account.code.as_str()) != Some(&idx) {
                continue;
            }
            let Some(parent) = parent_code(&account.code) else {
                continue;
            };
            if let Some(&parent_idx) = by_code.get(parent) {
                children_of[parent_idx].push(idx);
            }
        }

        let level_of = accounts.iter().map(|a| code_level(&a.code)).collect();

        Self {
            accounts,
            by_code,
            children_of,
            level_of,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn accounts(&self) -> &'c [Account] {
        self.accounts
    }

    /// Panics on an index that did not come from this hierarchy.
    pub(crate) fn account(&self, idx: usize) -> &'c Account {
        &self.accounts[idx]
    }

    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.by_code.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    pub fn get(&self, code: &str) -> Option<&'c Account> {
        self.index_of(code).map(|idx| &self.accounts[idx])
    }

    /// Direct children in chart order.
    pub fn children_of(&self, idx: usize) -> &[usize] {
        self.children_of.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn level_of(&self, idx: usize) -> usize {
        self.level_of.get(idx).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::AccountKind;
    use indexmap::IndexMap;

    fn account(code: &str, kind: AccountKind) -> Account {
        Account {
            code: code.to_string(),
            description: None,
            kind,
            type_label: String::new(),
            formula: None,
            data_source_links: IndexMap::new(),
            level: code_level(code),
        }
    }

    #[test]
    fn test_children_and_levels() {
        let accounts = vec![
            account("1", AccountKind::RollUp),
            account("1.1", AccountKind::Leaf),
            account("1.2", AccountKind::RollUp),
            account("1.2.1", AccountKind::Leaf),
            account("2", AccountKind::Formula),
        ];
        let hierarchy = Hierarchy::build(&accounts);

        let root = hierarchy.index_of("1").unwrap();
        let children: Vec<&str> = hierarchy
            .children_of(root)
            .iter()
            .map(|&i| hierarchy.account(i).code.as_str())
            .collect();
        assert_eq!(children, vec!["1.1", "1.2"]);

        let sub = hierarchy.index_of("1.2").unwrap();
        assert_eq!(hierarchy.children_of(sub).len(), 1);
        assert!(hierarchy.children_of(hierarchy.index_of("2").unwrap()).is_empty());

        assert_eq!(hierarchy.level_of(hierarchy.index_of("1.2.1").unwrap()), 3);
        assert_eq!(hierarchy.level_of(root), 1);
    }

    #[test]
    fn test_orphan_is_indexed_but_not_a_child() {
        let accounts = vec![
            account("1", AccountKind::RollUp),
            account("3.4", AccountKind::Leaf),
        ];
        let hierarchy = Hierarchy::build(&accounts);

        assert!(hierarchy.contains("3.4"));
        assert!(!hierarchy.contains("3"));
        assert!(hierarchy.children_of(0).is_empty());
        assert_eq!(hierarchy.level_of(1), 2);
    }

    #[test]
    fn test_duplicate_code_is_rolled_up_once() {
        let accounts = vec![
            account("1", AccountKind::RollUp),
            account("1.1", AccountKind::Leaf),
            account("1.1", AccountKind::Formula),
        ];
        let hierarchy = Hierarchy::build(&accounts);

        assert_eq!(hierarchy.index_of("1.1"), Some(2));
        assert_eq!(hierarchy.children_of(0), &[2]);
    }

    #[test]
    fn test_unknown_code_lookup() {
        let accounts = vec![account("1", AccountKind::RollUp)];
        let hierarchy = Hierarchy::build(&accounts);
        assert_eq!(hierarchy.index_of("9"), None);
        assert!(hierarchy.get("9").is_none());
        assert_eq!(hierarchy.len(), 1);
        assert!(hierarchy.children_of(7).is_empty());
        assert_eq!(hierarchy.level_of(7), 0);
    }
}
