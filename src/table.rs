//! Table data model shared by every pipeline stage.
//!
//! A [`Table`] is nothing more than an ordered grid of cell strings. Rows
//! may have different lengths: OCR and raw-line tables are tokenised line by
//! line and are ragged by nature, so raggedness is represented rather than
//! papered over with padding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Columns inferred from whitespace alignment of the text layer.
    Stream,
    /// Cells delimited by ruled lines drawn on the page.
    Lattice,
}

impl Strategy {
    /// Both strategies, in the order they are attempted on a page.
    pub const ALL: [Strategy; 2] = [Strategy::Stream, Strategy::Lattice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Stream => "stream",
            Strategy::Lattice => "lattice",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a table was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Stream or lattice detection over the PDF's text and ruled lines.
    Structured(Strategy),
    /// Tesseract text from the preprocessed page image, tokenised by line.
    Ocr,
    /// Embedded page text tokenised by line (last resort).
    RawLine,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Structured(s) => write!(f, "structured/{s}"),
            ExtractionMethod::Ocr => f.write_str("ocr"),
            ExtractionMethod::RawLine => f.write_str("raw-line"),
        }
    }
}

/// A grid of cell strings, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a table from anything that yields rows of string-ish cells.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of cells in the grid, counting ragged rows as they are.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// True when the grid holds no cell, or only blank cells.
    pub fn is_empty(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .all(|cell| cell.trim().is_empty())
    }

    /// True when every row has the same number of cells.
    pub fn is_rectangular(&self) -> bool {
        let width = self.column_count();
        self.rows.iter().all(|r| r.len() == width)
    }
}

/// A table as it came out of the extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// 1-indexed source page.
    pub page: usize,
    pub method: ExtractionMethod,
    pub table: Table,
}

impl ExtractedTable {
    pub fn new(page: usize, method: ExtractionMethod, table: Table) -> Self {
        Self {
            page,
            method,
            table,
        }
    }
}

/// A table reshaped by the LLM into a rectangular CSV grid.
///
/// The first row is the header the model kept (or invented); all rows have
/// the header's width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub table: Table,
}

impl NormalizedTable {
    pub fn header(&self) -> Option<&[String]> {
        self.table.rows().first().map(Vec::as_slice)
    }
}
