//! Structured table detection with pdfplumber.
//!
//! Both strategies run on every page and read the PDF directly:
//!
//! * **stream** infers rows and columns from how the words line up.
//! * **lattice** builds cells from the ruled lines and rectangles in the
//!   page's vector content.
//!
//! Neither strategy looks at a raster image, so the binarised page produced
//! for OCR never reaches this module.

use crate::config::TableSettings;
use crate::error::PageError;
use crate::table::{Strategy, Table};
use pdfplumber::{Page, Pdf};
use std::path::Path;
use tracing::{debug, warn};

/// Detect tables on one page with one strategy.
pub trait StructuredExtractor {
    /// `index` is the 0-based page index; errors carry the 1-based number.
    fn extract(&self, index: usize, strategy: Strategy) -> Result<Vec<Table>, PageError>;
}

/// [`StructuredExtractor`] over a document opened with pdfplumber.
pub struct PlumberExtractor {
    document: Result<Pdf, String>,
    settings: TableSettings,
}

impl PlumberExtractor {
    /// Open `pdf_path` for table finding.
    ///
    /// A document pdfplumber cannot parse (encrypted, damaged xref) is not
    /// fatal: every page then fails its structured stage and moves on to OCR.
    pub fn open(pdf_path: &Path, settings: TableSettings) -> Self {
        let document = Pdf::open_file(pdf_path, None).map_err(|e| e.to_string());
        if let Err(ref e) = document {
            warn!(
                "pdfplumber could not open {}: {}; structured detection disabled",
                pdf_path.display(),
                e
            );
        }
        Self { document, settings }
    }
}

impl StructuredExtractor for PlumberExtractor {
    fn extract(&self, index: usize, strategy: Strategy) -> Result<Vec<Table>, PageError> {
        let failed = |detail: String| PageError::StructuredFailed {
            page: index + 1,
            strategy: strategy.to_string(),
            detail,
        };
        let document = self.document.as_ref().map_err(|e| failed(e.clone()))?;
        let page = document.page(index).map_err(|e| failed(e.to_string()))?;
        let tables = find_tables(&page, strategy, &self.settings);
        debug!(
            "Page {}: pdfplumber {} found {} table(s)",
            index + 1,
            strategy,
            tables.len()
        );
        Ok(tables)
    }
}

/// Run the pdfplumber table finder on a loaded page.
pub fn find_tables(page: &Page, strategy: Strategy, settings: &TableSettings) -> Vec<Table> {
    page.extract_tables(&plumber_settings(strategy, settings))
        .into_iter()
        .map(to_table)
        .filter(|t| !t.is_empty())
        .collect()
}

fn plumber_settings(strategy: Strategy, settings: &TableSettings) -> pdfplumber::TableSettings {
    pdfplumber::TableSettings {
        strategy: match strategy {
            Strategy::Stream => pdfplumber::Strategy::Stream,
            Strategy::Lattice => pdfplumber::Strategy::Lattice,
        },
        min_words_vertical: settings.min_words_vertical,
        min_words_horizontal: settings.min_words_horizontal,
        min_accuracy: settings.min_accuracy,
        ..pdfplumber::TableSettings::default()
    }
}

/// pdfplumber grid → [`Table`]. Missing cells become empty strings.
pub fn to_table(rows: Vec<Vec<Option<String>>>) -> Table {
    Table::new(
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(|t| t.trim().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect(),
    )
}
