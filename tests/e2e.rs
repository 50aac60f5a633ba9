//! End-to-end integration tests for edgequake-pdf2xlsx.
//!
//! These tests use real PDF files in `./test_cases/` and need the pdfium
//! shared library. Normalisation tests additionally make live LLM calls.
//! Everything is gated behind the `E2E_ENABLED` environment variable so
//! it does not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 LD_LIBRARY_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 LD_LIBRARY_PATH=. cargo test --test e2e inspect -- --nocapture

use calamine::{open_workbook, Reader, Xlsx};
use edgequake_pdf2xlsx::{
    inspect, process_pdf_tables, ExtractionConfig, ExtractionMethod, PageSelection, Pdf2XlsxError,
    RunSummary,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn has_llm_credentials() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok() || std::env::var("EDGEQUAKE_LLM_PROVIDER").is_ok()
}

/// The workbook matches the summary sheet for sheet.
fn assert_workbook_matches(path: &Path, summary: &RunSummary, context: &str) {
    let mut wb: Xlsx<_> = open_workbook(path)
        .unwrap_or_else(|e| panic!("[{context}] workbook should open: {e}"));
    let names = wb.sheet_names().to_vec();
    assert_eq!(
        names.len(),
        summary.tables_written(),
        "[{context}] one sheet per table"
    );

    for (i, (name, report)) in names.iter().zip(&summary.sheets).enumerate() {
        assert_eq!(name, &format!("Table_{}", i + 1), "[{context}] sheet order");
        assert_eq!(name, &report.sheet);
        let range = wb
            .worksheet_range(name)
            .unwrap_or_else(|| panic!("[{context}] {name} missing"))
            .unwrap_or_else(|e| panic!("[{context}] {name} unreadable: {e}"));
        assert!(!range.is_empty(), "[{context}] {name} is empty");
    }

    println!(
        "[{context}] ✓  {} sheet(s), {} normalised, {}ms",
        summary.tables_written(),
        summary.tables_normalized(),
        summary.total_duration_ms
    );
}

// ── Inspect tests (no LLM, instant) ──────────────────────────────────────────

#[tokio::test]
async fn inspect_reports_page_count() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));

    let config = ExtractionConfig::default();
    let meta = inspect(path.to_str().unwrap(), &config)
        .await
        .expect("inspect() should succeed");

    assert_eq!(meta.page_count, 2, "IRS form should have 2 pages");
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn inspect_nonexistent_file_fails() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let config = ExtractionConfig::default();
    let result = inspect("/definitely/not/a/real/file.pdf", &config).await;
    assert!(
        matches!(result, Err(Pdf2XlsxError::FileNotFound { .. })),
        "got: {result:?}"
    );
}

// ── Extraction tests (pdfium, no LLM) ────────────────────────────────────────

#[tokio::test]
async fn extract_ruled_tables_without_normalisation() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let out = output_dir().join("irs_form_1040_raw.xlsx");

    let config = ExtractionConfig::builder()
        .normalize(false)
        .build()
        .expect("valid config");

    let summary = process_pdf_tables(path.to_str().unwrap(), &out, &config)
        .await
        .expect("extraction should succeed");

    assert_eq!(summary.pages_scanned, 2);
    assert_eq!(summary.tables_normalized(), 0);
    assert!(
        summary
            .sheets
            .iter()
            .any(|s| matches!(s.method, ExtractionMethod::Structured(_))),
        "a form with a text layer should yield structured tables"
    );
    assert_workbook_matches(&out, &summary, "irs_raw");
}

#[tokio::test]
async fn page_selection_limits_scanned_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let out = output_dir().join("irs_form_1040_page2.xlsx");

    let config = ExtractionConfig::builder()
        .normalize(false)
        .pages(PageSelection::Single(2))
        .build()
        .expect("valid config");

    match process_pdf_tables(path.to_str().unwrap(), &out, &config).await {
        Ok(summary) => {
            assert_eq!(summary.pages_scanned, 1);
            assert!(summary.sheets.iter().all(|s| s.page == 2));
        }
        Err(Pdf2XlsxError::NoTablesFound { pages, .. }) => assert_eq!(pages, 1),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn out_of_range_pages_are_rejected() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let out = output_dir().join("never_written.xlsx");

    let config = ExtractionConfig::builder()
        .normalize(false)
        .pages(PageSelection::Single(99))
        .build()
        .expect("valid config");

    let err = process_pdf_tables(path.to_str().unwrap(), &out, &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Pdf2XlsxError::PageOutOfRange { .. }),
        "got: {err}"
    );
}

// ── Normalisation tests (need LLM API) ───────────────────────────────────────

#[tokio::test]
async fn normalise_tables_with_llm() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    if !has_llm_credentials() {
        println!("SKIP: no ANTHROPIC_API_KEY or EDGEQUAKE_LLM_PROVIDER");
        return;
    }
    let out = output_dir().join("irs_form_1040.xlsx");

    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(1))
        .build()
        .expect("valid config");

    let summary = process_pdf_tables(path.to_str().unwrap(), &out, &config)
        .await
        .expect("run should succeed");

    assert!(
        summary.tables_normalized() > 0,
        "at least one table should come back from the LLM"
    );
    assert_workbook_matches(&out, &summary, "irs_llm");
}
