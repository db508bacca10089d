//! Persisting records as named sheets of a workbook.
//!
//! The bundled writer lays a workbook out as a directory holding one CSV file
//! per sheet.

use crate::extract::TabularRecord;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

pub const MAX_SHEET_NAME_CHARS: usize = 31;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDestination {
    pub workbook: PathBuf,
    pub sheet: String,
}

impl SheetDestination {
    pub fn new(workbook: impl Into<PathBuf>, sheet: &str) -> Self {
        Self {
            workbook: workbook.into(),
            sheet: sheet_name(sheet),
        }
    }
}

/// Spreadsheet-safe sheet name: forbidden characters replaced, at most 31
/// characters.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_end().to_string();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

/// Sheet name not yet in `taken`, suffixing " (2)", " (3)", ... within the
/// length limit.
pub fn unique_sheet_name(raw: &str, taken: &[String]) -> String {
    let base = sheet_name(raw);
    if !taken.contains(&base) {
        return base;
    }

    for n in 2.. {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME_CHARS.saturating_sub(suffix.chars().count());
        let head: String = base.chars().take(keep).collect();
        let candidate = format!("{}{suffix}", head.trim_end());
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    base
}

pub trait SheetWriter {
    /// Persists `record` and returns where it ended up.
    fn write_sheet(
        &mut self,
        destination: &SheetDestination,
        record: &TabularRecord,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWorkbookWriter;

impl CsvWorkbookWriter {
    pub fn sheet_path(destination: &SheetDestination) -> PathBuf {
        destination
            .workbook
            .join(format!("{}.csv", destination.sheet.replace(' ', "_")))
    }
}

impl SheetWriter for CsvWorkbookWriter {
    fn write_sheet(
        &mut self,
        destination: &SheetDestination,
        record: &TabularRecord,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&destination.workbook).with_context(|| {
            format!(
                "failed to create workbook directory {}",
                destination.workbook.display()
            )
        })?;

        let path = Self::sheet_path(destination);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create sheet {}", path.display()))?;
        write_record(&mut writer, record)
            .with_context(|| format!("failed to write sheet {}", path.display()))?;

        info!(
            workbook = %destination.workbook.display(),
            sheet = %destination.sheet,
            rows = record.row_count(),
            "sheet written"
        );
        Ok(path)
    }
}

/// Header line then one line per row. A record without columns leaves the
/// sheet empty.
pub fn write_record<W: Write>(
    writer: &mut csv::Writer<W>,
    record: &TabularRecord,
) -> Result<()> {
    if record.columns().is_empty() {
        writer.flush()?;
        return Ok(());
    }

    writer.write_record(record.columns())?;
    for row in record.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
