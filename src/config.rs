use crate::error::{AccountViewError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Knobs for one processing run. Every field has a default matching the
/// conventions of the source workbooks, so an empty JSON object is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Separator between raw codes inside a single link cell (e.g. "R2; R3").
    pub link_delimiter: char,
    /// Sheets whose name starts with this prefix hold raw data.
    pub data_sheet_prefix: String,
    /// Sheets whose name starts with this prefix hold a chart of accounts.
    pub plan_sheet_prefix: String,
    /// JavaScript variable patched by the HTML sink.
    pub js_variable_name: String,
    /// Indent width of the serialized document.
    pub json_indent: usize,
    /// Track in-progress resolutions so a cyclic chart yields 0 instead of
    /// exhausting the stack.
    pub detect_cycles: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            link_delimiter: ';',
            data_sheet_prefix: "dados".to_string(),
            plan_sheet_prefix: "plano".to_string(),
            js_variable_name: "calculatedViewsData".to_string(),
            json_indent: 4,
            detect_cycles: true,
        }
    }
}

impl ProcessingOptions {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.link_delimiter.is_alphanumeric() || self.link_delimiter == '.' {
            return Err(AccountViewError::InvalidConfig(format!(
                "link delimiter '{}' would split account codes",
                self.link_delimiter
            )));
        }

        let is_identifier = self
            .js_variable_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && self
                .js_variable_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !is_identifier {
            return Err(AccountViewError::InvalidConfig(format!(
                "'{}' is not a valid JavaScript identifier",
                self.js_variable_name
            )));
        }

        if self.data_sheet_prefix.trim().is_empty() || self.plan_sheet_prefix.trim().is_empty() {
            return Err(AccountViewError::InvalidConfig(
                "sheet prefixes must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
