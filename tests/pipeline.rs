//! Orchestration tests with in-process stand-ins for pdfium and the LLM.
//!
//! These run without pdfium, Tesseract or network access: extraction is
//! replaced by a canned [`TableSource`], normalisation by small
//! [`TableNormalizer`] / [`LlmBackend`] fakes. Workbooks are read back with
//! calamine.

use async_trait::async_trait;
use calamine::{open_workbook, DataType, Reader, Xlsx};
use edgequake_pdf2xlsx::pipeline::llm::LlmBackend;
use edgequake_pdf2xlsx::pipeline::normalize::{parse_csv, table_to_csv};
use edgequake_pdf2xlsx::{
    run_pipeline, ExtractedTable, ExtractionConfig, ExtractionMethod, ExtractionReport,
    LlmNormalizer, NormalizeError, NormalizedTable, PageError, Pdf2XlsxError, ProgressReporter,
    Strategy, Table, TableNormalizer, TableSource,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct CannedSource(ExtractionReport);

impl TableSource for CannedSource {
    fn extract(
        &self,
        _pdf: &Path,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionReport, Pdf2XlsxError> {
        Ok(self.0.clone())
    }
}

/// Upper-cases every cell, failing on the listed 1-indexed table ordinals.
struct Shouting {
    fail_on: Vec<usize>,
    seen: Mutex<usize>,
}

impl Shouting {
    fn failing_on(fail_on: &[usize]) -> Self {
        Self {
            fail_on: fail_on.to_vec(),
            seen: Mutex::new(0),
        }
    }
}

#[async_trait]
impl TableNormalizer for Shouting {
    async fn normalize(&self, table: &ExtractedTable) -> Result<NormalizedTable, NormalizeError> {
        let n = {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        if self.fail_on.contains(&n) {
            return Err(NormalizeError::RateLimited("slow down".into()));
        }
        let rows = table
            .table
            .rows()
            .iter()
            .map(|row| row.iter().map(|c| c.to_uppercase()).collect())
            .collect();
        Ok(NormalizedTable {
            table: Table::new(rows),
        })
    }
}

/// Backend that answers with the table it was shown, re-encoded as CSV.
struct EchoBackend;

#[async_trait]
impl LlmBackend for EchoBackend {
    fn label(&self) -> String {
        "echo".into()
    }

    async fn complete(&self, prompt: &str) -> Result<String, NormalizeError> {
        // The table follows the instruction: one row per line, columns
        // separated by runs of two or more spaces.
        let block = prompt.split_once("Table data:\n").map(|(_, t)| t).unwrap_or_default();
        let rows: Vec<Vec<String>> = block
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                l.split("  ")
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .collect();
        let csv = table_to_csv(&Table::new(rows)).map_err(|e| NormalizeError::Request(e.to_string()))?;
        Ok(format!("Here is the table:\n```csv\n{csv}```"))
    }
}

/// Echoes like [`EchoBackend`], except that the listed 1-indexed calls get
/// a CSV answer whose second row is wider than its header.
struct RaggedOn {
    calls: Vec<usize>,
    seen: Mutex<usize>,
}

#[async_trait]
impl LlmBackend for RaggedOn {
    fn label(&self) -> String {
        "ragged".into()
    }

    async fn complete(&self, prompt: &str) -> Result<String, NormalizeError> {
        let n = {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        if self.calls.contains(&n) {
            return Ok("a,b\n1,2,3".into());
        }
        EchoBackend.complete(prompt).await
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ProgressReporter for Recorder {
    fn on_table_start(&self, table: usize, total: usize) {
        self.0.lock().unwrap().push(format!("start {table}/{total}"));
    }
    fn on_table_normalized(&self, table: usize, _total: usize) {
        self.0.lock().unwrap().push(format!("ok {table}"));
    }
    fn on_table_fallback(&self, table: usize, _total: usize, _reason: &str) {
        self.0.lock().unwrap().push(format!("fallback {table}"));
    }
    fn on_run_complete(&self, tables_written: usize, success: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("done {tables_written} {success}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn three_tables() -> ExtractionReport {
    ExtractionReport {
        tables: vec![
            ExtractedTable::new(
                1,
                ExtractionMethod::Structured(Strategy::Stream),
                Table::from_rows([["item", "qty"], ["bolt", "12"]]),
            ),
            ExtractedTable::new(
                1,
                ExtractionMethod::Structured(Strategy::Lattice),
                Table::from_rows([["code", "name"], ["007", "agent"]]),
            ),
            ExtractedTable::new(
                3,
                ExtractionMethod::Ocr,
                Table::from_rows([vec!["total", "99.5"], vec!["note"]]),
            ),
        ],
        pages_scanned: 3,
        page_errors: vec![PageError::RenderFailed {
            page: 2,
            detail: "bitmap allocation failed".into(),
        }],
    }
}

fn config() -> ExtractionConfig {
    ExtractionConfig::builder().build().unwrap()
}

fn sheet(path: &Path, name: &str) -> calamine::Range<DataType> {
    let mut wb: Xlsx<_> = open_workbook(path).expect("workbook should open");
    wb.worksheet_range(name)
        .expect("sheet should exist")
        .expect("sheet should parse")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_sheet_per_extracted_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.xlsx");

    let summary = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(three_tables())),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_written(), 3);
    assert_eq!(summary.tables_normalized(), 0);
    assert_eq!(summary.pages_scanned, 3);
    assert_eq!(summary.pages_failed, 1);

    let wb: Xlsx<_> = open_workbook(&out).unwrap();
    assert_eq!(wb.sheet_names().to_vec(), vec!["Table_1", "Table_2", "Table_3"]);

    let names: Vec<&str> = summary.sheets.iter().map(|s| s.sheet.as_str()).collect();
    assert_eq!(names, vec!["Table_1", "Table_2", "Table_3"]);
    assert_eq!(summary.sheets[2].page, 3);
    assert_eq!(summary.sheets[2].method, ExtractionMethod::Ocr);
}

#[tokio::test]
async fn extracted_cells_land_unchanged_without_normalisation() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("raw.xlsx");

    run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(three_tables())),
        None,
    )
    .await
    .unwrap();

    let t1 = sheet(&out, "Table_1");
    assert_eq!(t1.get_value((0, 0)), Some(&DataType::String("item".into())));
    assert_eq!(t1.get_value((1, 1)), Some(&DataType::Float(12.0)));

    let t2 = sheet(&out, "Table_2");
    assert_eq!(t2.get_value((1, 0)), Some(&DataType::String("007".into())));

    let t3 = sheet(&out, "Table_3");
    assert_eq!(t3.get_value((1, 0)), Some(&DataType::String("note".into())));
    assert_eq!(t3.get_value((1, 1)), Some(&DataType::Empty));
}

#[tokio::test]
async fn failed_table_keeps_extracted_form() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("mixed.xlsx");
    let normalizer = Shouting::failing_on(&[2]);

    let summary = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(three_tables())),
        Some(&normalizer),
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_written(), 3);
    assert_eq!(summary.tables_normalized(), 2);
    let flags: Vec<bool> = summary.sheets.iter().map(|s| s.normalized).collect();
    assert_eq!(flags, vec![true, false, true]);

    assert_eq!(
        sheet(&out, "Table_1").get_value((0, 0)),
        Some(&DataType::String("ITEM".into()))
    );
    assert_eq!(
        sheet(&out, "Table_2").get_value((0, 0)),
        Some(&DataType::String("code".into()))
    );
    assert_eq!(
        sheet(&out, "Table_3").get_value((0, 0)),
        Some(&DataType::String("TOTAL".into()))
    );
}

#[tokio::test]
async fn every_table_failing_still_writes_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fallback.xlsx");
    let normalizer = Shouting::failing_on(&[1, 2, 3]);

    let summary = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(three_tables())),
        Some(&normalizer),
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_written(), 3);
    assert_eq!(summary.tables_normalized(), 0);
    assert!(out.exists());
}

#[tokio::test]
async fn no_tables_is_an_error_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("none.xlsx");
    let empty = ExtractionReport {
        pages_scanned: 5,
        ..ExtractionReport::default()
    };
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .reporter(recorder.clone())
        .build()
        .unwrap();

    let err = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config,
        Arc::new(CannedSource(empty)),
        None,
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Pdf2XlsxError::NoTablesFound { pages: 5, .. }),
        "got: {err}"
    );
    assert!(!out.exists());
    assert_eq!(recorder.events(), vec!["done 0 false"]);
}

#[tokio::test]
async fn reporter_sees_each_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("events.xlsx");
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .reporter(recorder.clone())
        .build()
        .unwrap();
    let normalizer = Shouting::failing_on(&[3]);

    run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config,
        Arc::new(CannedSource(three_tables())),
        Some(&normalizer),
    )
    .await
    .unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            "start 1/3",
            "ok 1",
            "start 2/3",
            "ok 2",
            "start 3/3",
            "fallback 3",
            "done 3 true",
        ]
    );
}

#[tokio::test]
async fn echoing_llm_reproduces_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("echo.xlsx");
    let report = ExtractionReport {
        tables: vec![ExtractedTable::new(
            1,
            ExtractionMethod::Structured(Strategy::Stream),
            Table::from_rows([["Region", "Q1", "Q2"], ["North", "10", "12.5"]]),
        )],
        pages_scanned: 1,
        page_errors: vec![],
    };
    let normalizer = LlmNormalizer::new(Arc::new(EchoBackend), None);

    let summary = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(report)),
        Some(&normalizer),
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_normalized(), 1);
    assert_eq!((summary.sheets[0].rows, summary.sheets[0].columns), (2, 3));

    let range = sheet(&out, "Table_1");
    assert_eq!(range.get_size(), (2, 3));
    let expected = [
        [
            DataType::String("Region".into()),
            DataType::String("Q1".into()),
            DataType::String("Q2".into()),
        ],
        [
            DataType::String("North".into()),
            DataType::Float(10.0),
            DataType::Float(12.5),
        ],
    ];
    for (r, row) in expected.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            assert_eq!(
                range.get_value((r as u32, c as u32)),
                Some(cell),
                "cell ({r}, {c})"
            );
        }
    }
}

#[tokio::test]
async fn unparsable_answer_keeps_only_that_table_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("ragged.xlsx");
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .reporter(recorder.clone())
        .build()
        .unwrap();
    let backend = RaggedOn {
        calls: vec![2],
        seen: Mutex::new(0),
    };
    let normalizer = LlmNormalizer::new(Arc::new(backend), None);

    let summary = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config,
        Arc::new(CannedSource(three_tables())),
        Some(&normalizer),
    )
    .await
    .unwrap();

    assert_eq!(summary.tables_written(), 3);
    let flags: Vec<bool> = summary.sheets.iter().map(|s| s.normalized).collect();
    assert_eq!(flags, vec![true, false, true]);
    assert!(recorder.events().contains(&"fallback 2".to_string()));

    let t2 = sheet(&out, "Table_2");
    assert_eq!(t2.get_size(), (2, 2));
    assert_eq!(t2.get_value((0, 0)), Some(&DataType::String("code".into())));
    assert_eq!(t2.get_value((1, 0)), Some(&DataType::String("007".into())));
    assert_eq!(t2.get_value((1, 1)), Some(&DataType::String("agent".into())));

    let t1 = sheet(&out, "Table_1");
    assert_eq!(t1.get_value((1, 0)), Some(&DataType::String("bolt".into())));
    assert_eq!(t1.get_value((1, 1)), Some(&DataType::Float(12.0)));
}

#[test]
fn csv_round_trip_preserves_quoted_cells() {
    let table = Table::from_rows([["name", "note"], ["Smith, J.", "said \"hi\""]]);
    let csv = table_to_csv(&table).unwrap();
    assert_eq!(parse_csv(&csv).unwrap(), table);
}

#[tokio::test]
async fn unwritable_output_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();
    let out = blocker.join("out.xlsx");

    let err = run_pipeline(
        Path::new("in.pdf"),
        &out,
        &config(),
        Arc::new(CannedSource(three_tables())),
        None,
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, Pdf2XlsxError::OutputWriteFailed { .. }),
        "got: {err}"
    );
}
