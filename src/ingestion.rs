use crate::config::ProcessingOptions;
use crate::error::{AccountViewError, Result};
use crate::schema::{AccountRow, ChartFeed, DataSourceFeed, RawDataPoint, RawValue, Workbook};
use crate::utils::name_in_parentheses;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// A tabular sheet: header cells plus data rows. Blank cells are `None`.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<Option<String>>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Data,
    Plan,
}

impl Sheet {
    /// Reads a sheet exported as CSV. The first record is the header.
    pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();
        let header = match records.next() {
            Some(record) => to_cells(&record?),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for record in records {
            rows.push(to_cells(&record?));
        }

        Ok(Self {
            name: name.to_string(),
            header,
            rows,
        })
    }

    fn cell(row: &[Option<String>], column: usize) -> Option<&str> {
        row.get(column).and_then(|c| c.as_deref())
    }

    fn header_text(&self, column: usize) -> String {
        Self::cell(&self.header, column)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unnamed: {}", column))
    }

    /// Rows with a code in the first column, minus a leading row that
    /// repeats the header's code label.
    fn coded_rows(&self) -> Vec<&[Option<String>]> {
        let mut rows: Vec<&[Option<String>]> = self
            .rows
            .iter()
            .map(Vec::as_slice)
            .filter(|row| Self::cell(row, 0).is_some())
            .collect();

        let code_label = self.header_text(0).to_lowercase();
        if rows
            .first()
            .and_then(|row| Self::cell(row, 0))
            .is_some_and(|code| code.to_lowercase() == code_label)
        {
            debug!("Sheet '{}': dropping repeated header row", self.name);
            rows.remove(0);
        }

        rows
    }
}

fn to_cells(record: &csv::StringRecord) -> Vec<Option<String>> {
    record
        .iter()
        .map(|field| {
            let trimmed = field.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Renames repeated labels "X", "X" to "X", "X.1", in column order, until
/// every label is unique.
fn unique_labels(labels: impl Iterator<Item = String>) -> Vec<String> {
    let labels: Vec<String> = labels.collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(labels.len());
    let mut unique = Vec::with_capacity(labels.len());

    for label in labels {
        let mut candidate = label.clone();
        let mut suffix = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}.{}", label, suffix);
            suffix += 1;
        }
        if candidate != label {
            warn!("Repeated column '{}' renamed to '{}'", label, candidate);
        }
        taken.insert(candidate.clone());
        unique.push(candidate);
    }

    unique
}

fn to_raw_value(cell: &str) -> RawValue {
    match cell.parse::<f64>() {
        Ok(number) => RawValue::Number(number),
        Err(_) => RawValue::Text(cell.to_string()),
    }
}

/// Classifies a sheet by its name. Returns the kind and the feed name
/// (the text in parentheses, or the whole trimmed name).
pub fn classify_sheet(sheet_name: &str, options: &ProcessingOptions) -> Option<(SheetKind, String)> {
    if sheet_name.starts_with("~$") {
        return None;
    }

    let lowered = sheet_name.to_lowercase();
    let kind = if lowered.starts_with(&options.data_sheet_prefix.to_lowercase()) {
        SheetKind::Data
    } else if lowered.starts_with(&options.plan_sheet_prefix.to_lowercase()) {
        SheetKind::Plan
    } else {
        return None;
    };

    let name = name_in_parentheses(sheet_name).unwrap_or_else(|| sheet_name.trim().to_string());
    Some((kind, name))
}

/// Column 0 = code, 1 = description, 2.. = periods.
pub fn data_sheet_to_feed(sheet: &Sheet) -> Option<DataSourceFeed> {
    if sheet.header.len() < 3 {
        warn!(
            "Data sheet '{}' does not have enough period columns. Ignoring it.",
            sheet.name
        );
        return None;
    }

    let periods = unique_labels((2..sheet.header.len()).map(|c| sheet.header_text(c)));

    let records: Vec<RawDataPoint> = sheet
        .coded_rows()
        .into_iter()
        .map(|row| RawDataPoint {
            code: Sheet::cell(row, 0).map(str::to_string),
            description: Sheet::cell(row, 1).map(str::to_string),
            values_by_period: periods
                .iter()
                .enumerate()
                .map(|(i, period)| (period.clone(), Sheet::cell(row, i + 2).map(to_raw_value)))
                .collect(),
        })
        .collect();

    if records.is_empty() {
        info!("No valid raw data rows found in sheet '{}'", sheet.name);
        return None;
    }

    Some(DataSourceFeed { periods, records })
}

/// Column 0 = code, 1 = description, 2 = type label, 3.. = link columns whose
/// header names a data source in parentheses.
pub fn plan_sheet_to_feed(sheet: &Sheet) -> Option<ChartFeed> {
    if sheet.header.len() < 3 {
        warn!(
            "Plan sheet '{}' does not have the code, description and type columns. Ignoring it.",
            sheet.name
        );
        return None;
    }

    let mut link_columns: Vec<(usize, String)> = Vec::new();
    for column in 3..sheet.header.len() {
        let header = sheet.header_text(column);
        match name_in_parentheses(&header) {
            Some(source) => link_columns.push((column, source)),
            None => warn!(
                "Column '{}' of plan sheet '{}' names no data source in parentheses. Ignoring it for links.",
                header, sheet.name
            ),
        }
    }

    let accounts: Vec<AccountRow> = sheet
        .coded_rows()
        .into_iter()
        .map(|row| {
            let mut data_source_links = IndexMap::new();
            for (column, source) in &link_columns {
                if let Some(link) = Sheet::cell(row, *column) {
                    data_source_links.insert(source.clone(), link.to_string());
                }
            }
            AccountRow {
                code: Sheet::cell(row, 0).map(str::to_string),
                description: Sheet::cell(row, 1).map(str::to_string),
                raw_type_label: Sheet::cell(row, 2).map(str::to_string),
                data_source_links,
            }
        })
        .collect();

    if accounts.is_empty() {
        info!("No valid accounts found in sheet '{}'", sheet.name);
        return None;
    }

    let mut data_sources: Vec<String> = Vec::new();
    for (_, source) in link_columns {
        if !data_sources.contains(&source) {
            data_sources.push(source);
        }
    }

    Some(ChartFeed {
        accounts,
        data_sources,
    })
}

/// Builds a workbook from sheets in order. Data sheets are read before plan
/// sheets; a repeated feed name replaces the earlier feed.
pub fn workbook_from_sheets(sheets: &[Sheet], options: &ProcessingOptions) -> Workbook {
    let mut workbook = Workbook::default();

    let classified: Vec<(&Sheet, SheetKind, String)> = sheets
        .iter()
        .filter_map(|sheet| {
            let (kind, name) = classify_sheet(&sheet.name, options)?;
            Some((sheet, kind, name))
        })
        .collect();

    for (sheet, _, name) in classified.iter().filter(|(_, k, _)| *k == SheetKind::Data) {
        debug!("Reading data sheet '{}' as '{}'", sheet.name, name);
        if let Some(feed) = data_sheet_to_feed(sheet) {
            info!(
                " - {} raw rows with {} periods read for '{}'",
                feed.records.len(),
                feed.periods.len(),
                name
            );
            workbook.data_sources.insert(name.clone(), feed);
        }
    }

    for (sheet, _, name) in classified.iter().filter(|(_, k, _)| *k == SheetKind::Plan) {
        debug!("Reading plan sheet '{}' as '{}'", sheet.name, name);
        if let Some(feed) = plan_sheet_to_feed(sheet) {
            info!(" - {} accounts read for chart '{}'", feed.accounts.len(), name);
            workbook.charts.insert(name.clone(), feed);
        }
    }

    workbook
}

/// Loads every `*.csv` file of a directory as a sheet named after the file
/// stem, in file-name order.
pub fn load_csv_workbook(dir: &Path, options: &ProcessingOptions) -> Result<Workbook> {
    let entries = fs::read_dir(dir).map_err(|e| AccountViewError::SourceUnavailable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            paths.push(path);
        }
    }
    paths.sort();

    let mut sheets = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let file = File::open(&path)?;
        match Sheet::from_csv_reader(name, file) {
            Ok(sheet) => sheets.push(sheet),
            Err(e) => warn!("Could not read sheet '{}': {}", path.display(), e),
        }
    }

    Ok(workbook_from_sheets(&sheets, options))
}

/// Loads a workbook serialized as JSON feeds.
pub fn load_json_workbook(path: &Path) -> Result<Workbook> {
    let raw = fs::read_to_string(path).map_err(|e| AccountViewError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| AccountViewError::InvalidFeed(e.to_string()))
}
