use crate::schema::{AccountRow, ChartFeed, DataSource};
use crate::utils::code_level;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Label stored for accounts whose type cell was empty.
pub const DEFAULT_TYPE_LABEL: &str = "sintetica";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// Sum of the raw data codes linked for the current data source ("analitica").
    Leaf,
    /// Sum of the direct children ("sintetica").
    RollUp,
    /// Arithmetic over other accounts ("calculo (...)").
    Formula,
}

impl AccountKind {
    /// Case-insensitive classification of a type label. Returns `None` for
    /// labels that match no kind.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        if normalized == "analitica" {
            Some(Self::Leaf)
        } else if normalized == "sintetica" {
            Some(Self::RollUp)
        } else if normalized.starts_with("calculo") {
            Some(Self::Formula)
        } else {
            None
        }
    }

    /// Leaf and roll-up accounts are hidden from a view when every value is zero.
    pub fn is_zero_suppressible(self) -> bool {
        matches!(self, Self::Leaf | Self::RollUp)
    }
}

fn formula_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)calculo\s*\((.*?)\)").expect("formula label pattern is valid")
    })
}

/// Extracts the formula text of a "calculo (...)" label.
pub fn extract_formula(label: &str) -> Option<String> {
    let captures = formula_pattern().captures(label)?;
    let formula = captures.get(1)?.as_str().trim();
    if formula.is_empty() {
        None
    } else {
        Some(formula.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub code: String,
    pub description: Option<String>,
    pub kind: AccountKind,
    /// The label as written in the plan, emitted unchanged as `tipo`.
    pub type_label: String,
    pub formula: Option<String>,
    pub data_source_links: IndexMap<String, String>,
    pub level: usize,
}

impl Account {
    /// Builds an account from a plan row. Rows without a code yield `None`.
    pub fn from_row(row: &AccountRow) -> Option<Self> {
        let code = row.code.as_deref().map(str::trim).filter(|c| !c.is_empty())?;

        let label = row
            .raw_type_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let (kind, type_label, formula) = match label {
            None => {
                warn!(
                    "Missing account type for code {}. Using '{}' as default.",
                    code, DEFAULT_TYPE_LABEL
                );
                (AccountKind::RollUp, DEFAULT_TYPE_LABEL.to_string(), None)
            }
            Some(label) => match AccountKind::from_label(label) {
                Some(AccountKind::Formula) => {
                    (AccountKind::Formula, label.to_string(), extract_formula(label))
                }
                Some(kind) => (kind, label.to_string(), None),
                None => {
                    warn!(
                        "Unrecognized account type '{}' for code {}. Treating it as '{}'.",
                        label, code, DEFAULT_TYPE_LABEL
                    );
                    (AccountKind::RollUp, label.to_string(), None)
                }
            },
        };

        let data_source_links = row
            .data_source_links
            .iter()
            .map(|(source, link)| (source.trim().to_string(), link.trim().to_string()))
            .filter(|(_, link)| !link.is_empty())
            .collect();

        Some(Self {
            code: code.to_string(),
            description: row.description.clone(),
            kind,
            type_label,
            formula,
            data_source_links,
            level: code_level(code),
        })
    }
}

/// A named plan: accounts sorted by code plus the data sources it can be
/// resolved against.
#[derive(Debug, Clone)]
pub struct Chart {
    pub name: String,
    pub accounts: Vec<Account>,
    pub linked_data_sources: Vec<String>,
}

impl Chart {
    /// Assembles a chart from its feed. `available` holds the data sources
    /// that actually have data; only those are kept as linked sources.
    pub fn from_feed(name: &str, feed: &ChartFeed, available: &IndexMap<String, DataSource>) -> Self {
        let mut accounts: Vec<Account> = feed.accounts.iter().filter_map(Account::from_row).collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        let skipped = feed.accounts.len() - accounts.len();
        if skipped > 0 {
            debug!("Chart '{}': skipped {} rows without a code", name, skipped);
        }

        let referenced: IndexSet<&str> = feed
            .data_sources
            .iter()
            .map(|s| s.trim())
            .chain(
                accounts
                    .iter()
                    .flat_map(|a| a.data_source_links.keys().map(String::as_str)),
            )
            .filter(|s| !s.is_empty())
            .collect();

        let mut linked_data_sources: Vec<String> = referenced
            .into_iter()
            .filter(|s| available.get(*s).is_some_and(DataSource::has_data))
            .map(str::to_string)
            .collect();
        linked_data_sources.sort();

        Self {
            name: name.to_string(),
            accounts,
            linked_data_sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataSourceFeed, RawDataPoint};

    fn row(code: Option<&str>, label: Option<&str>) -> AccountRow {
        AccountRow {
            code: code.map(str::to_string),
            description: Some("desc".to_string()),
            raw_type_label: label.map(str::to_string),
            data_source_links: IndexMap::new(),
        }
    }

    #[test]
    fn test_kind_from_label() {
        assert_eq!(AccountKind::from_label("Analitica"), Some(AccountKind::Leaf));
        assert_eq!(AccountKind::from_label(" SINTETICA "), Some(AccountKind::RollUp));
        assert_eq!(
            AccountKind::from_label("Calculo (1 - 2)"),
            Some(AccountKind::Formula)
        );
        assert_eq!(AccountKind::from_label("calculo"), Some(AccountKind::Formula));
        assert_eq!(AccountKind::from_label("total"), None);
    }

    #[test]
    fn test_extract_formula() {
        assert_eq!(extract_formula("calculo (1 - 2)"), Some("1 - 2".to_string()));
        assert_eq!(extract_formula("CALCULO(1.1+1.2)"), Some("1.1+1.2".to_string()));
        assert_eq!(extract_formula("calculo"), None);
        assert_eq!(extract_formula("calculo ()"), None);
        // Only up to the first closing parenthesis is captured.
        assert_eq!(extract_formula("calculo ((1+2)*3)"), Some("(1+2".to_string()));
    }

    #[test]
    fn test_account_from_row_defaults() {
        let account = Account::from_row(&row(Some("1.2"), None)).unwrap();
        assert_eq!(account.kind, AccountKind::RollUp);
        assert_eq!(account.type_label, "sintetica");
        assert_eq!(account.level, 2);

        let account = Account::from_row(&row(Some("3"), Some("whatever"))).unwrap();
        assert_eq!(account.kind, AccountKind::RollUp);
        assert_eq!(account.type_label, "whatever");

        assert!(Account::from_row(&row(None, Some("analitica"))).is_none());
        assert!(Account::from_row(&row(Some("  "), Some("analitica"))).is_none());
    }

    #[test]
    fn test_formula_account_keeps_full_label() {
        let account = Account::from_row(&row(Some("2"), Some("calculo (1 + 100)"))).unwrap();
        assert_eq!(account.kind, AccountKind::Formula);
        assert_eq!(account.type_label, "calculo (1 + 100)");
        assert_eq!(account.formula.as_deref(), Some("1 + 100"));
    }

    #[test]
    fn test_chart_sorting_and_linked_sources() {
        let mut leaf = row(Some("1.1"), Some("analitica"));
        leaf.data_source_links
            .insert("Real".to_string(), "R1".to_string());
        leaf.data_source_links
            .insert("Ghost".to_string(), "R1".to_string());

        let feed = ChartFeed {
            accounts: vec![row(Some("2"), Some("sintetica")), leaf, row(Some("1"), Some("sintetica"))],
            data_sources: vec!["Budget".to_string(), "Empty".to_string()],
        };

        let with_data = DataSourceFeed {
            periods: vec!["P".to_string()],
            records: vec![RawDataPoint {
                code: Some("R1".to_string()),
                ..Default::default()
            }],
        };
        let mut available = IndexMap::new();
        available.insert("Real".to_string(), DataSource::from_feed("Real", &with_data));
        available.insert("Budget".to_string(), DataSource::from_feed("Budget", &with_data));
        available.insert(
            "Empty".to_string(),
            DataSource::from_feed("Empty", &DataSourceFeed::default()),
        );

        let chart = Chart::from_feed("Main", &feed, &available);
        let codes: Vec<&str> = chart.accounts.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["1", "1.1", "2"]);
        assert_eq!(chart.linked_data_sources, vec!["Budget", "Real"]);
    }
}
