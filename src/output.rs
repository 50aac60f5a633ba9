//! Result types returned by the top-level entry points.

use crate::table::ExtractionMethod;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document-level information read without extracting tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// What ended up in one sheet of the workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetReport {
    /// Sheet name, `Table_<n>`.
    pub sheet: String,
    /// 1-indexed source page.
    pub page: usize,
    pub method: ExtractionMethod,
    /// True when the LLM-cleaned form was written, false when the
    /// extracted form was kept.
    pub normalized: bool,
    pub rows: usize,
    pub columns: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub output: PathBuf,
    /// Pages selected for scanning.
    pub pages_scanned: usize,
    /// Pages skipped because every extraction stage failed.
    pub pages_failed: usize,
    pub sheets: Vec<SheetReport>,
    pub extraction_duration_ms: u64,
    pub normalization_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub fn tables_written(&self) -> usize {
        self.sheets.len()
    }

    pub fn tables_normalized(&self) -> usize {
        self.sheets.iter().filter(|s| s.normalized).count()
    }
}
