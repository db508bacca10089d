use crate::parser::RawTable;
use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

pub const DEFAULT_EMPTY_CELL: &str = "0";

/// A rectangular table: every row holds exactly one value per column and
/// column names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TabularRecord {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TabularRecord {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                bail!("duplicate column name {column:?}");
            }
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                bail!(
                    "row {index} has {} values for {} columns",
                    row.len(),
                    columns.len()
                );
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r[index].as_str())
    }

    pub fn row_map(&self, row: usize) -> Option<BTreeMap<&str, &str>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str))
                .collect(),
        )
    }

    /// Appends a column; `values` must have one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        self.check_height(name, &values)?;
        let name = unique_name(name, &self.columns);
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Replaces the values of column `name`, appending it when absent.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        let Some(index) = self.columns.iter().position(|c| c == name) else {
            return self.push_column(name, values);
        };
        self.check_height(name, &values)?;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
        Ok(())
    }

    fn check_height(&self, name: &str, values: &[String]) -> Result<()> {
        if values.len() != self.rows.len() {
            bail!(
                "column {name:?} has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        Ok(())
    }
}

/// Set when header and body widths disagreed and the headers were adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeMismatch {
    pub header_width: usize,
    pub row_width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: TabularRecord,
    pub mismatch: Option<ShapeMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Stands in for cells whose trimmed text is empty.
    pub empty_cell: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            empty_cell: DEFAULT_EMPTY_CELL.to_string(),
        }
    }
}

pub fn extract_table(table: &RawTable) -> Extraction {
    extract_table_with(table, &ExtractOptions::default())
}

/// Reshapes a parsed table into a [`TabularRecord`].
///
/// With two or more header rows the second one names the columns (the first
/// is a grouping row). The widest body row decides the width: longer headers
/// are cut down to it, shorter ones get positional names. Body values are
/// never dropped; short rows are padded with the empty-cell marker. Any width
/// disagreement is reported in [`Extraction::mismatch`] and logged, since
/// cutting headers can misalign names and values.
pub fn extract_table_with(table: &RawTable, options: &ExtractOptions) -> Extraction {
    let headers: Vec<String> = match table.header_rows.len() {
        0 => Vec::new(),
        1 => table.header_rows[0].clone(),
        _ => table.header_rows[1].clone(),
    };

    let mut rows: Vec<Vec<String>> = table
        .body_rows
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|cell| {
                    let text = cell.text.trim();
                    if text.is_empty() {
                        options.empty_cell.clone()
                    } else {
                        text.to_string()
                    }
                })
                .collect()
        })
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(headers.len());
    let ragged = rows.iter().any(|row| row.len() != width);

    let mismatch = (headers.len() != width || ragged).then(|| {
        let mismatch = ShapeMismatch {
            header_width: headers.len(),
            row_width: width,
        };
        warn!(
            caption = table.caption.as_deref().unwrap_or(""),
            header_width = mismatch.header_width,
            row_width = mismatch.row_width,
            ragged,
            "header and data widths differ; adjusting headers"
        );
        mismatch
    });

    let mut names: Vec<String> = headers.into_iter().take(width).collect();
    while names.len() < width {
        names.push(String::new());
    }

    let mut columns = Vec::with_capacity(width);
    for (index, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            index.to_string()
        } else {
            name
        };
        let unique = unique_name(&base, &columns);
        columns.push(unique);
    }

    for row in &mut rows {
        row.resize(width, options.empty_cell.clone());
    }

    Extraction {
        record: TabularRecord { columns, rows },
        mismatch,
    }
}

fn unique_name(base: &str, existing: &[String]) -> String {
    if !existing.iter().any(|c| c == base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}.{n}"))
        .find(|candidate| !existing.iter().any(|c| c == candidate))
        .unwrap_or_else(|| base.to_string())
}
