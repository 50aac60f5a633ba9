//! Reporter trait for per-page and per-table pipeline events.
//!
//! Inject an [`Arc<dyn ProgressReporter>`] via
//! [`crate::config::ExtractionConfigBuilder::reporter`] to observe the run:
//! which pages yielded tables, which stage produced them, which pages fell
//! back or failed, and which tables kept their extracted form because the
//! LLM cleanup failed.
//!
//! Events carry typed data rather than preformatted strings, so a test can
//! assert "page 3 fell back to OCR" without parsing log lines. Human-readable
//! logging still goes through `tracing`; the reporter is the structured
//! side channel.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2xlsx::{ExtractionConfig, ProgressReporter};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingReporter {
//!     fallbacks: AtomicUsize,
//! }
//!
//! impl ProgressReporter for CountingReporter {
//!     fn on_table_fallback(&self, _table: usize, _total: usize, _reason: &str) {
//!         self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let reporter = Arc::new(CountingReporter { fallbacks: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .reporter(reporter as Arc<dyn ProgressReporter>)
//!     .build()
//!     .unwrap();
//! ```

use crate::table::ExtractionMethod;
use std::sync::Arc;

/// Severity attached to [`ProgressReporter::on_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

/// Called by the pipeline as it walks pages and tables.
///
/// All methods default to no-ops so implementors only override what they
/// need. Implementations must be `Send + Sync`: extraction runs on a
/// blocking thread while normalisation runs on the async runtime.
pub trait ProgressReporter: Send + Sync {
    /// Free-form diagnostic, mirrored from the pipeline's log lines.
    fn on_message(&self, level: ReportLevel, message: &str) {
        let _ = (level, message);
    }

    /// Called once before the first page is rendered.
    ///
    /// * `total_pages` — number of selected pages that will be scanned
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is rasterised.
    ///
    /// * `page` — 1-indexed page number
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a stage of the fallback chain succeeded for a page.
    ///
    /// * `tables` — number of non-empty tables the stage produced (may be 0)
    fn on_page_tables(&self, page: usize, method: ExtractionMethod, tables: usize) {
        let _ = (page, method, tables);
    }

    /// Called when a stage failed and the page moves to the next stage.
    fn on_page_fallback(&self, page: usize, failed_stage: &str, error: &str) {
        let _ = (page, failed_stage, error);
    }

    /// Called when a page is skipped because it could not be processed.
    fn on_page_error(&self, page: usize, error: &str) {
        let _ = (page, error);
    }

    /// Called before the LLM cleanup of a table.
    ///
    /// * `table` — 1-indexed table ordinal (its future sheet number)
    fn on_table_start(&self, table: usize, total_tables: usize) {
        let _ = (table, total_tables);
    }

    /// Called when a table was replaced by its normalised form.
    fn on_table_normalized(&self, table: usize, total_tables: usize) {
        let _ = (table, total_tables);
    }

    /// Called when a table keeps its extracted form.
    fn on_table_fallback(&self, table: usize, total_tables: usize, reason: &str) {
        let _ = (table, total_tables, reason);
    }

    /// Called once after the workbook was written, or the run failed.
    fn on_run_complete(&self, tables_written: usize, success: bool) {
        let _ = (tables_written, success);
    }
}

/// A no-op reporter for callers that don't need events.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type Reporter = Arc<dyn ProgressReporter>;

/// Resolve the configured reporter, defaulting to [`NoopReporter`].
pub(crate) fn reporter_or_noop(reporter: Option<&Reporter>) -> Reporter {
    reporter
        .cloned()
        .unwrap_or_else(|| Arc::new(NoopReporter) as Reporter)
}
