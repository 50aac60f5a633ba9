//! # edgequake-pdf2xlsx
//!
//! Extract tables from PDF documents into an Excel workbook, one sheet per
//! table, with optional LLM cleanup of each table.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    per page: structured (stream + lattice)
//!  │                  ↳ OCR on the binarised render
//!  │                  ↳ raw text lines
//!  ├─ 3. Normalize  one LLM call per table, answer read as CSV
//!  └─ 4. Export     Table_1 … Table_n in a single .xlsx
//! ```
//!
//! A page that cannot be processed is skipped; a table the LLM cannot clean
//! is written as extracted. The run fails only when the input is unusable,
//! no table was found at all, or the workbook cannot be written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2xlsx::{process_pdf_tables, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build()?;
//!     let summary = process_pdf_tables("report.pdf", "report.xlsx", &config).await?;
//!     eprintln!(
//!         "{} table(s), {} normalised",
//!         summary.tables_written(),
//!         summary.tables_normalized()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! * **pdfium** shared library, found next to the executable, on the system
//!   library path, or in `pdfium_library_dir`.
//! * **tesseract** on `PATH` for the OCR fallback. Without it, pages the
//!   table finder cannot read fall through to the raw-line stage.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2xlsx` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, OcrSettings, PageSelection, PreprocessSettings,
    TableSettings,
};
pub use convert::{
    inspect, process_pdf_tables, process_pdf_tables_from_bytes, process_pdf_tables_sync,
    run_pipeline,
};
pub use error::{NormalizeError, PageError, Pdf2XlsxError};
pub use output::{DocumentMetadata, RunSummary, SheetReport};
pub use pipeline::extract::{ExtractionReport, ExtractionStage, PdfiumTableSource, TableSource};
pub use pipeline::normalize::{LlmNormalizer, TableNormalizer};
pub use progress::{NoopReporter, ProgressReporter, ReportLevel};
pub use table::{ExtractedTable, ExtractionMethod, NormalizedTable, Strategy, Table};
