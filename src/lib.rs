//! # Account Views
//!
//! Resolves hierarchical charts of accounts against raw data sources and
//! produces one calculated view per (chart, data source) pair.
//!
//! ## Core Concepts
//!
//! - **Data source**: raw values keyed by raw code and period label
//! - **Chart**: accounts identified by dot-separated codes (`1`, `1.2`, `1.2.3`)
//! - **Leaf** (`analitica`): sum of the linked raw codes in the data source
//! - **Roll-up** (`sintetica`): sum of the direct children
//! - **Formula** (`calculo (...)`): arithmetic over other account codes
//! - **View**: every account of a chart valued for every period of one source
//!
//! ## Example
//!
//! ```rust,ignore
//! use account_views::*;
//!
//! let workbook: Workbook = serde_json::from_str(r#"{
//!     "dataSources": {
//!         "D": {
//!             "periods": ["2024-01"],
//!             "records": [
//!                 {"code": "R1", "valuesByPeriod": {"2024-01": 10}},
//!                 {"code": "R2", "valuesByPeriod": {"2024-01": 5}}
//!             ]
//!         }
//!     },
//!     "charts": {
//!         "Main": {
//!             "accounts": [
//!                 {"code": "1", "rawTypeLabel": "sintetica"},
//!                 {"code": "1.1", "rawTypeLabel": "analitica", "dataSourceLinks": {"D": "R1"}},
//!                 {"code": "1.2", "rawTypeLabel": "analitica", "dataSourceLinks": {"D": "R2;R3"}},
//!                 {"code": "2", "rawTypeLabel": "calculo (1 + 100)"}
//!             ]
//!         }
//!     }
//! }"#).unwrap();
//!
//! let document = process_workbook(&workbook, &ProcessingOptions::default()).unwrap();
//! let view = document.view("Main", "D").unwrap();
//! assert_eq!(view.account("2").unwrap().values["2024-01"], 115.0);
//! ```

pub mod chart_of_accounts;
pub mod config;
pub mod error;
pub mod formula;
pub mod hierarchy;
pub mod ingestion;
pub mod resolver;
pub mod schema;
pub mod sink;
pub mod utils;
pub mod views;

pub use chart_of_accounts::{Account, AccountKind, Chart};
pub use config::ProcessingOptions;
pub use error::{AccountViewError, Result};
pub use formula::{Formula, FormulaError, FormulaTable};
pub use hierarchy::Hierarchy;
pub use ingestion::{load_csv_workbook, load_json_workbook, workbook_from_sheets, Sheet};
pub use resolver::{ResolutionCache, ResolutionStats, ValueResolver};
pub use schema::*;
pub use sink::{HtmlSink, JsonFileSink, ViewSink};
pub use views::{CalculatedAccount, CalculatedView, ViewBuilder, ViewsDocument};

use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashSet;

pub struct ViewProcessor;

impl ViewProcessor {
    pub fn process(workbook: &Workbook, options: &ProcessingOptions) -> Result<ViewsDocument> {
        options.validate()?;

        info!(
            "Processing {} charts against {} data sources",
            workbook.charts.len(),
            workbook.data_sources.len()
        );

        let mut sources: IndexMap<String, DataSource> = IndexMap::new();
        for (name, feed) in &workbook.data_sources {
            if let Some(problem) = feed_problem(name, feed) {
                warn!("Data source '{}' skipped: {}", name, problem);
                continue;
            }
            let source = DataSource::from_feed(name, feed);
            if source.has_data() {
                sources.insert(name.clone(), source);
            } else {
                warn!("Data source '{}' has no coded records. Ignoring it.", name);
            }
        }

        let charts: Vec<Chart> = workbook
            .charts
            .iter()
            .filter(|(name, _)| {
                let named = !name.trim().is_empty();
                if !named {
                    warn!("Skipping a chart with an empty name");
                }
                named
            })
            .map(|(name, feed)| Chart::from_feed(name, feed, &sources))
            .collect();
        debug!(
            "Assembled charts: {:?}",
            charts.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let views = ViewBuilder::new(options).build_views(&charts, &sources);
        for view in &views {
            info!(
                "{} x {}: {} accounts over {} periods",
                view.plan_name,
                view.data_source_name,
                view.accounts.len(),
                view.periods.len()
            );
        }

        Ok(ViewsDocument::new(views))
    }

    /// Processes the workbook and hands the document to `sink`. Nothing is
    /// written when no view could be calculated.
    pub fn process_into(
        workbook: &Workbook,
        options: &ProcessingOptions,
        sink: &dyn ViewSink,
    ) -> Result<ViewsDocument> {
        let document = Self::process(workbook, options)?;

        if document.calculated_views.is_empty() {
            warn!("No views were calculated. Output left untouched.");
            return Ok(document);
        }

        sink.write(&document)?;
        Ok(document)
    }
}

pub fn process_workbook(workbook: &Workbook, options: &ProcessingOptions) -> Result<ViewsDocument> {
    ViewProcessor::process(workbook, options)
}

pub fn process_workbook_into(
    workbook: &Workbook,
    options: &ProcessingOptions,
    sink: &dyn ViewSink,
) -> Result<ViewsDocument> {
    ViewProcessor::process_into(workbook, options, sink)
}

/// Describes why a data source feed cannot be resolved, if it cannot.
fn feed_problem(name: &str, feed: &DataSourceFeed) -> Option<String> {
    if name.trim().is_empty() {
        return Some("empty name".to_string());
    }

    let mut seen = HashSet::new();
    feed.periods
        .iter()
        .find(|period| !seen.insert(period.as_str()))
        .map(|period| format!("period '{}' is repeated", period))
}
