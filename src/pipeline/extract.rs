//! Page walk and per-page fallback chain.
//!
//! Every selected page is processed on its own: a failure on one page is
//! logged and reported, and the walk continues with the next page. Within a
//! page the stages of [`ExtractionStage::CHAIN`] are tried in order and the
//! first one that returns `Ok` wins, even with zero tables. A text-only page
//! is a valid answer, not an error.

use crate::config::{ExtractionConfig, PageSelection, PreprocessSettings};
use crate::error::{PageError, Pdf2XlsxError};
use crate::pipeline::ocr::{tokenize_lines, OcrEngine, TesseractEngine};
use crate::pipeline::preprocess::preprocess;
use crate::pipeline::render::{bind_pdfium, open_document, PageSource, PdfiumPages};
use crate::pipeline::structured::{PlumberExtractor, StructuredExtractor};
use crate::progress::{reporter_or_noop, ReportLevel, Reporter};
use crate::table::{ExtractedTable, ExtractionMethod, Strategy};
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// One step of the per-page fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    /// Stream and lattice detection with pdfplumber.
    Structured,
    /// Tesseract over the preprocessed render.
    Ocr,
    /// The embedded page text, tokenised by line.
    RawLine,
}

impl ExtractionStage {
    pub const CHAIN: [ExtractionStage; 3] = [
        ExtractionStage::Structured,
        ExtractionStage::Ocr,
        ExtractionStage::RawLine,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStage::Structured => "structured",
            ExtractionStage::Ocr => "ocr",
            ExtractionStage::RawLine => "raw-line",
        }
    }
}

/// Everything the page walk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    /// Tables in page order, then stage order within a page.
    pub tables: Vec<ExtractedTable>,
    pub pages_scanned: usize,
    /// Pages that were skipped.
    pub page_errors: Vec<PageError>,
}

/// Whole-document extraction, the seam the orchestrator depends on.
///
/// Implementations are blocking and are called from `spawn_blocking`.
pub trait TableSource: Send + Sync {
    fn extract(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
    ) -> Result<ExtractionReport, Pdf2XlsxError>;
}

/// [`TableSource`] over pdfium, the in-crate detectors and Tesseract.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumTableSource;

impl TableSource for PdfiumTableSource {
    fn extract(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
    ) -> Result<ExtractionReport, Pdf2XlsxError> {
        let pdfium = bind_pdfium(config.pdfium_library_dir.as_deref())?;
        let document = open_document(&pdfium, pdf_path, config.password.as_deref())?;
        let pages = PdfiumPages::new(document, config);

        let ocr = TesseractEngine::new(config.ocr.clone());
        if !ocr.is_available() {
            let msg = format!(
                "OCR command '{}' is not available; pages the table finder cannot read \
                 will fall back to their raw text",
                config.ocr.command
            );
            warn!("{}", msg);
            reporter_or_noop(config.reporter.as_ref()).on_message(ReportLevel::Warning, &msg);
        }

        let indices = select_pages(&config.pages, pages.page_count())?;
        let structured = PlumberExtractor::open(pdf_path, config.tables.clone());
        let report = TableExtractionPipeline::new(pages, structured, ocr, config).run(&indices)?;
        Ok(report)
    }
}

/// Resolve a page selection, failing when it matches nothing.
pub fn select_pages(selection: &PageSelection, total: usize) -> Result<Vec<usize>, Pdf2XlsxError> {
    let indices = selection.to_indices(total);
    if !indices.is_empty() || total == 0 {
        return Ok(indices);
    }
    let page = match selection {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
    };
    Err(Pdf2XlsxError::PageOutOfRange { page, total })
}

/// The per-page extraction loop, generic over its collaborators.
pub struct TableExtractionPipeline<P, S, O> {
    pages: P,
    structured: S,
    ocr: O,
    preprocess: PreprocessSettings,
    ocr_empty_pages: bool,
    reporter: Reporter,
}

impl<P, S, O> TableExtractionPipeline<P, S, O>
where
    P: PageSource,
    S: StructuredExtractor,
    O: OcrEngine,
{
    pub fn new(pages: P, structured: S, ocr: O, config: &ExtractionConfig) -> Self {
        Self {
            pages,
            structured,
            ocr,
            preprocess: config.preprocess.clone(),
            ocr_empty_pages: config.ocr_empty_pages,
            reporter: reporter_or_noop(config.reporter.as_ref()),
        }
    }

    /// Walk the given 0-based page indices in order.
    pub fn run(&self, indices: &[usize]) -> Result<ExtractionReport, Pdf2XlsxError> {
        let total = indices.len();
        self.reporter.on_extraction_start(total);
        info!("Scanning {} page(s) for tables", total);

        let mut report = ExtractionReport {
            pages_scanned: total,
            ..Default::default()
        };
        for (n, &index) in indices.iter().enumerate() {
            let page = index + 1;
            self.reporter.on_page_start(page, total);
            debug!("Page {} ({}/{})", page, n + 1, total);

            match self.extract_page(index) {
                Ok(tables) => {
                    info!("Page {}: {} table(s)", page, tables.len());
                    report.tables.extend(tables);
                }
                Err(e) => {
                    error!("Error processing page {}: {}", page, e);
                    self.reporter.on_page_error(page, &e.to_string());
                    report.page_errors.push(e);
                }
            }
        }
        Ok(report)
    }

    /// Run the fallback chain for one page.
    pub fn extract_page(&self, index: usize) -> Result<Vec<ExtractedTable>, PageError> {
        let page = index + 1;
        let render = self.pages.render(index)?;
        let cleaned = preprocess(&render, &self.preprocess);

        let mut last: Option<PageError> = None;
        for stage in ExtractionStage::CHAIN {
            let result = match stage {
                ExtractionStage::Structured => self.structured_stage(index),
                ExtractionStage::Ocr => self.ocr_stage(page, &cleaned),
                ExtractionStage::RawLine => self.raw_line_stage(index),
            };
            match result {
                Ok(tables) if stage == ExtractionStage::Structured && tables.is_empty() => {
                    return Ok(self.ocr_empty_page(page, &cleaned));
                }
                Ok(tables) => return Ok(tables),
                Err(e) => {
                    warn!("Page {}: {} stage failed: {}", page, stage.name(), e);
                    self.reporter
                        .on_page_fallback(page, stage.name(), &e.to_string());
                    last = Some(e);
                }
            }
        }

        Err(PageError::AllStagesFailed {
            page,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Both strategies, stream first. Any error fails the whole stage.
    fn structured_stage(&self, index: usize) -> Result<Vec<ExtractedTable>, PageError> {
        let page = index + 1;
        let mut tables = Vec::new();
        for strategy in Strategy::ALL {
            let found = self.structured.extract(index, strategy)?;
            let method = ExtractionMethod::Structured(strategy);
            self.reporter.on_page_tables(page, method, found.len());
            debug!("Page {}: {} found {} table(s)", page, strategy, found.len());
            tables.extend(
                found
                    .into_iter()
                    .filter(|t| !t.is_empty())
                    .map(|t| ExtractedTable::new(page, method, t)),
            );
        }
        Ok(tables)
    }

    fn ocr_stage(&self, page: usize, cleaned: &DynamicImage) -> Result<Vec<ExtractedTable>, PageError> {
        let text = self
            .ocr
            .recognize(cleaned)
            .map_err(|e| PageError::OcrFailed {
                page,
                detail: e.to_string(),
            })?;
        Ok(self.tokenized(page, ExtractionMethod::Ocr, &text))
    }

    fn raw_line_stage(&self, index: usize) -> Result<Vec<ExtractedTable>, PageError> {
        let text = self.pages.text(index)?;
        Ok(self.tokenized(index + 1, ExtractionMethod::RawLine, &text))
    }

    fn tokenized(&self, page: usize, method: ExtractionMethod, text: &str) -> Vec<ExtractedTable> {
        let table = tokenize_lines(text);
        let tables = if table.is_empty() {
            Vec::new()
        } else {
            vec![ExtractedTable::new(page, method, table)]
        };
        self.reporter.on_page_tables(page, method, tables.len());
        tables
    }

    /// Structured detection found nothing; optionally try OCR.
    fn ocr_empty_page(&self, page: usize, cleaned: &DynamicImage) -> Vec<ExtractedTable> {
        if !self.ocr_empty_pages {
            return Vec::new();
        }
        match self.ocr_stage(page, cleaned) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Page {}: OCR of table-less page failed: {}", page, e);
                Vec::new()
            }
        }
    }
}
