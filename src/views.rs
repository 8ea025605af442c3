use crate::chart_of_accounts::Chart;
use crate::config::ProcessingOptions;
use crate::formula::FormulaTable;
use crate::hierarchy::Hierarchy;
use crate::resolver::{ResolutionCache, ValueResolver};
use crate::schema::DataSource;
use chrono::{Local, SecondsFormat, Utc};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// One account of a view with its resolved value per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedAccount {
    #[serde(rename = "codigo")]
    pub code: String,

    #[serde(rename = "descricao")]
    pub description: Option<String>,

    #[serde(rename = "tipo")]
    pub type_label: String,

    #[serde(rename = "formula", default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(rename = "valores")]
    pub values: IndexMap<String, f64>,

    #[serde(rename = "nivel")]
    pub level: usize,
}

/// A chart resolved against one of its data sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedView {
    pub plan_name: String,
    pub data_source_name: String,
    #[serde(rename = "periodos")]
    pub periods: Vec<String>,
    pub accounts: Vec<CalculatedAccount>,
}

impl CalculatedView {
    /// Flattens the view into (code, period, value) triples.
    pub fn value_triples(&self) -> Vec<(String, String, f64)> {
        self.accounts
            .iter()
            .flat_map(|account| {
                account
                    .values
                    .iter()
                    .map(|(period, value)| (account.code.clone(), period.clone(), *value))
            })
            .collect()
    }

    pub fn account(&self, code: &str) -> Option<&CalculatedAccount> {
        self.accounts.iter().find(|a| a.code == code)
    }
}

/// The complete output of a run, as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewsDocument {
    pub calculated_views: Vec<CalculatedView>,
    pub timestamp_utc: String,
    pub timestamp_local: String,
}

impl ViewsDocument {
    /// Wraps the views and stamps the current time.
    pub fn new(calculated_views: Vec<CalculatedView>) -> Self {
        Self {
            calculated_views,
            timestamp_utc: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            timestamp_local: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }

    pub fn view(&self, plan_name: &str, data_source_name: &str) -> Option<&CalculatedView> {
        self.calculated_views
            .iter()
            .find(|v| v.plan_name == plan_name && v.data_source_name == data_source_name)
    }
}

pub struct ViewBuilder<'o> {
    options: &'o ProcessingOptions,
}

impl<'o> ViewBuilder<'o> {
    pub fn new(options: &'o ProcessingOptions) -> Self {
        Self { options }
    }

    /// Resolves every chart against each of its linked data sources, in
    /// chart-then-data-source order.
    pub fn build_views(
        &self,
        charts: &[Chart],
        sources: &IndexMap<String, DataSource>,
    ) -> Vec<CalculatedView> {
        let mut views = Vec::new();

        for chart in charts {
            if chart.accounts.is_empty() || chart.linked_data_sources.is_empty() {
                info!(
                    "Skipping chart '{}': no valid accounts or no linked data sources with data",
                    chart.name
                );
                continue;
            }

            info!("Calculating views for chart '{}'", chart.name);
            let hierarchy = Hierarchy::build(&chart.accounts);
            let formulas = FormulaTable::compile(&hierarchy);

            for source_name in &chart.linked_data_sources {
                let Some(source) = sources.get(source_name) else {
                    continue;
                };
                if source.periods.is_empty() {
                    info!(
                        "Data source '{}' has no periods; skipping it for chart '{}'",
                        source_name, chart.name
                    );
                    continue;
                }

                let view = self.build_view(&chart.name, &hierarchy, &formulas, source);
                info!(
                    " - View for '{}' with '{}' generated ({} accounts)",
                    view.plan_name,
                    view.data_source_name,
                    view.accounts.len()
                );
                views.push(view);
            }
        }

        views
    }

    /// Resolves one (chart, data source) pair with a fresh cache.
    pub fn build_view(
        &self,
        chart_name: &str,
        hierarchy: &Hierarchy<'_>,
        formulas: &FormulaTable,
        source: &DataSource,
    ) -> CalculatedView {
        let mut resolver = ValueResolver::new(hierarchy, formulas, source, ResolutionCache::new())
            .with_link_delimiter(self.options.link_delimiter)
            .with_cycle_detection(self.options.detect_cycles);

        let mut accounts = Vec::with_capacity(hierarchy.len());
        for (idx, account) in hierarchy.accounts().iter().enumerate() {
            // Only the definition that won the code index is emitted.
            if hierarchy.index_of(&account.code) != Some(idx) {
                continue;
            }

            let values: IndexMap<String, f64> = source
                .periods
                .iter()
                .enumerate()
                .map(|(period_idx, period)| (period.clone(), resolver.resolve(idx, period_idx)))
                .collect();

            if account.kind.is_zero_suppressible() && values.values().all(|v| *v == 0.0) {
                continue;
            }

            accounts.push(CalculatedAccount {
                code: account.code.clone(),
                description: account.description.clone(),
                type_label: account.type_label.clone(),
                formula: account.formula.clone(),
                values,
                level: hierarchy.level_of(idx),
            });
        }

        let stats = resolver.stats();
        debug!(
            "Chart '{}' x '{}': {} evaluations, {} cache hits, {} formula failures, {} cycles",
            chart_name,
            source.name,
            stats.evaluations,
            stats.cache_hits,
            stats.formula_failures,
            stats.cycles_detected
        );

        CalculatedView {
            plan_name: chart_name.to_string(),
            data_source_name: source.name.clone(),
            periods: source.periods.clone(),
            accounts,
        }
    }
}
