use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A raw spreadsheet cell. Anything that is not a number is kept as read and
/// coerced later by [`crate::utils::safe_float`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawDataPoint {
    #[serde(default)]
    #[schemars(description = "Raw code referenced by the link columns of a chart. Rows without a code are skipped.")]
    pub code: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    #[schemars(description = "Value per period label. Null or missing means no value (treated as 0).")]
    pub values_by_period: IndexMap<String, Option<RawValue>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataSourceFeed {
    #[schemars(description = "Ordered period labels shared by every record of this data source")]
    pub periods: Vec<String>,

    #[serde(default)]
    pub records: Vec<RawDataPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountRow {
    #[serde(default)]
    #[schemars(description = "Dot-separated hierarchical code, e.g. '1.2.3'. Rows without a code are skipped.")]
    pub code: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "'analitica' (sum of linked raw codes), 'sintetica' (sum of children) or 'calculo (<formula>)'. Anything else is treated as 'sintetica'."
    )]
    pub raw_type_label: Option<String>,

    #[serde(default)]
    #[schemars(description = "Data source name -> raw code(s), several codes joined by the link delimiter")]
    pub data_source_links: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartFeed {
    #[serde(default)]
    pub accounts: Vec<AccountRow>,

    #[serde(default)]
    #[schemars(
        description = "Data sources named by the chart's link columns. Names found in account links are added automatically."
    )]
    pub data_sources: Vec<String>,
}

/// Everything one run reads: named data sources and named charts, in feed order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    #[serde(default)]
    pub data_sources: IndexMap<String, DataSourceFeed>,

    #[serde(default)]
    pub charts: IndexMap<String, ChartFeed>,
}

impl Workbook {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Workbook)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// A data source indexed by raw code, ready for lookups during resolution.
#[derive(Debug, Clone)]
pub struct DataSource {
    pub name: String,
    pub periods: Vec<String>,
    pub records: HashMap<String, RawDataPoint>,
}

impl DataSource {
    /// Indexes the feed's records by trimmed code. Records without a code are
    /// dropped; when a code repeats, the last record wins.
    pub fn from_feed(name: &str, feed: &DataSourceFeed) -> Self {
        let mut records = HashMap::with_capacity(feed.records.len());
        for record in &feed.records {
            let Some(code) = record.code.as_deref().map(str::trim) else {
                continue;
            };
            if code.is_empty() {
                continue;
            }
            records.insert(code.to_string(), record.clone());
        }

        Self {
            name: name.to_string(),
            periods: feed.periods.clone(),
            records,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn value(&self, raw_code: &str, period: &str) -> Option<&RawValue> {
        self.records
            .get(raw_code)?
            .values_by_period
            .get(period)?
            .as_ref()
    }
}
