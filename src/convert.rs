//! Top-level entry points: PDF in, workbook out.
//!
//! A run moves through four states:
//!
//! ```text
//! Extracting ──▶ Normalizing ──▶ Exporting ──▶ Done
//!     │
//!     └──▶ NoTablesFound (error, no file written)
//! ```
//!
//! Extraction and export are blocking (pdfium, Tesseract, file I/O) and run
//! under `spawn_blocking`; normalisation awaits one LLM call at a time.
//! Per-page and per-table failures are absorbed on the way; only input,
//! document-level and output failures end the run.

use crate::config::ExtractionConfig;
use crate::error::Pdf2XlsxError;
use crate::output::{DocumentMetadata, RunSummary, SheetReport};
use crate::pipeline::export::export_workbook;
use crate::pipeline::extract::{PdfiumTableSource, TableSource};
use crate::pipeline::normalize::{LlmNormalizer, TableNormalizer};
use crate::pipeline::{input, render};
use crate::progress::{reporter_or_noop, ReportLevel};
use crate::table::Table;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract every table from a PDF and write them to an `.xlsx` workbook.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to a PDF
/// * `output` — Path of the workbook to create or overwrite
/// * `config` — Extraction configuration
///
/// # Errors
/// Returns `Err(Pdf2XlsxError)` only for fatal errors:
/// - File not found / not a PDF / cannot be opened
/// - No LLM backend could be configured while `normalize` is on
/// - Not a single table was found ([`Pdf2XlsxError::NoTablesFound`])
/// - The workbook could not be written
pub async fn process_pdf_tables(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, Pdf2XlsxError> {
    let input_str = input_str.as_ref();
    info!("Starting table extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    let normalizer = if config.normalize {
        let n = LlmNormalizer::from_config(config)?;
        info!("Normalising tables with {}", n.backend_label());
        Some(n)
    } else {
        None
    };

    run_pipeline(
        resolved.path(),
        output_path.as_ref(),
        config,
        Arc::new(PdfiumTableSource),
        normalizer.as_ref().map(|n| n as &dyn TableNormalizer),
    )
    .await
}

/// Run the pipeline with explicit collaborators.
///
/// `normalizer = None` skips the normalising state.
pub async fn run_pipeline(
    pdf_path: &Path,
    output_path: &Path,
    config: &ExtractionConfig,
    source: Arc<dyn TableSource>,
    normalizer: Option<&dyn TableNormalizer>,
) -> Result<RunSummary, Pdf2XlsxError> {
    let total_start = Instant::now();
    let reporter = reporter_or_noop(config.reporter.as_ref());

    // ── Extracting ───────────────────────────────────────────────────────
    let extraction_start = Instant::now();
    let report = {
        let path = pdf_path.to_path_buf();
        let config = config.clone();
        tokio::task::spawn_blocking(move || source.extract(&path, &config))
            .await
            .map_err(|e| Pdf2XlsxError::Internal(format!("extraction task panicked: {e}")))??
    };
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} table(s) from {} page(s) in {}ms",
        report.tables.len(),
        report.pages_scanned,
        extraction_duration_ms
    );

    if report.tables.is_empty() {
        warn!("No tables found in the PDF");
        reporter.on_message(ReportLevel::Warning, "No tables found in the PDF");
        reporter.on_run_complete(0, false);
        return Err(Pdf2XlsxError::NoTablesFound {
            path: pdf_path.to_path_buf(),
            pages: report.pages_scanned,
        });
    }

    // ── Normalizing ──────────────────────────────────────────────────────
    let normalization_start = Instant::now();
    let total = report.tables.len();
    let mut tables: Vec<Table> = Vec::with_capacity(total);
    let mut sheets: Vec<SheetReport> = Vec::with_capacity(total);

    for (i, extracted) in report.tables.into_iter().enumerate() {
        let n = i + 1;
        let (table, normalized) = match normalizer {
            None => (extracted.table, false),
            Some(normalizer) => {
                reporter.on_table_start(n, total);
                match normalizer.normalize(&extracted).await {
                    Ok(clean) => {
                        debug!("Table {}: normalised", n);
                        reporter.on_table_normalized(n, total);
                        (clean.table, true)
                    }
                    Err(e) => {
                        warn!(
                            "Error normalizing table {} (page {}), keeping extracted form: {}",
                            n, extracted.page, e
                        );
                        reporter.on_table_fallback(n, total, &e.to_string());
                        (extracted.table, false)
                    }
                }
            }
        };
        sheets.push(SheetReport {
            sheet: String::new(),
            page: extracted.page,
            method: extracted.method,
            normalized,
            rows: table.row_count(),
            columns: table.column_count(),
        });
        tables.push(table);
    }
    let normalization_duration_ms = normalization_start.elapsed().as_millis() as u64;

    // ── Exporting ────────────────────────────────────────────────────────
    let names = {
        let path = output_path.to_path_buf();
        let infer_numbers = config.infer_numbers;
        tokio::task::spawn_blocking(move || export_workbook(&tables, &path, infer_numbers))
            .await
            .map_err(|e| Pdf2XlsxError::Internal(format!("export task panicked: {e}")))?
    };
    let names = match names {
        Ok(names) => names,
        Err(e) => {
            reporter.on_run_complete(0, false);
            return Err(e);
        }
    };
    for (sheet, name) in sheets.iter_mut().zip(names) {
        sheet.sheet = name;
    }

    // ── Done ─────────────────────────────────────────────────────────────
    let summary = RunSummary {
        output: output_path.to_path_buf(),
        pages_scanned: report.pages_scanned,
        pages_failed: report.page_errors.len(),
        sheets,
        extraction_duration_ms,
        normalization_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Wrote {} table(s) ({} normalised) to {} in {}ms",
        summary.tables_written(),
        summary.tables_normalized(),
        output_path.display(),
        summary.total_duration_ms
    );
    reporter.on_run_complete(summary.tables_written(), true);
    Ok(summary)
}

/// Synchronous wrapper around [`process_pdf_tables`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_pdf_tables_sync(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, Pdf2XlsxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2XlsxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_pdf_tables(input_str, output_path, config))
}

/// Extract tables from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when the
/// call returns.
pub async fn process_pdf_tables_from_bytes(
    bytes: &[u8],
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunSummary, Pdf2XlsxError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2XlsxError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2XlsxError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    process_pdf_tables(&path, output_path, config).await
}

/// Read PDF metadata without extracting tables.
///
/// Does not require an LLM backend.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, Pdf2XlsxError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let pdf_path: PathBuf = resolved.path().to_path_buf();
    let library_dir = config.pdfium_library_dir.clone();
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = render::bind_pdfium(library_dir.as_deref())?;
        render::extract_metadata_blocking(&pdfium, &pdf_path, password.as_deref())
    })
    .await
    .map_err(|e| Pdf2XlsxError::Internal(format!("inspect task panicked: {e}")))?
}
