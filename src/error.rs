//! Error types for the edgequake-pdf2xlsx library.
//!
//! Three error types mirror the three blast radii of a failure:
//!
//! * [`Pdf2XlsxError`] — **Fatal**: the run cannot produce a workbook (bad
//!   input file, no tables at all, output path not writable). Returned as
//!   `Err(Pdf2XlsxError)` from the top-level `process_*` functions.
//!
//! * [`PageError`] — **Per page**: one page could not be rendered or none of
//!   its extraction stages worked. The page is skipped and the run moves on.
//!
//! * [`NormalizeError`] — **Per table**: the LLM cleanup of one table failed.
//!   The table is exported in its extracted form instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2xlsx library.
#[derive(Debug, Error)]
pub enum Pdf2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the executable, install it system-wide,\n\
or pass --pdfium-dir <DIR> pointing at the directory that contains it."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Every page was processed but not a single table came out.
    #[error("No tables extracted from '{path}' ({pages} pages scanned)")]
    NoTablesFound { path: PathBuf, pages: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create, write or rename the output workbook.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The spreadsheet writer rejected the workbook contents.
    #[error("Failed to build workbook for '{path}': {detail}")]
    Export { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stage errors (`StructuredFailed`, `OcrFailed`) trigger the next fallback
/// stage; `RenderFailed` and `AllStagesFailed` cause the page to be skipped.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page's text layer could not be loaded.
    #[error("Page {page}: text layer unavailable: {detail}")]
    TextLayerFailed { page: usize, detail: String },

    /// A structured extraction strategy raised.
    #[error("Page {page}: {strategy} extraction failed: {detail}")]
    StructuredFailed {
        page: usize,
        strategy: String,
        detail: String,
    },

    /// The OCR engine failed to run or returned garbage.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// Every stage of the fallback chain failed.
    #[error("Page {page}: all extraction stages failed; last error: {last}")]
    AllStagesFailed { page: usize, last: String },
}

impl PageError {
    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::TextLayerFailed { page, .. }
            | PageError::StructuredFailed { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::AllStagesFailed { page, .. } => *page,
        }
    }
}

/// A non-fatal error while normalising one table through the LLM.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("LLM request failed: {0}")]
    Request(String),

    /// The provider answered with an error other than auth or quota
    /// (bad request, unknown model, overloaded).
    #[error("LLM API error: {0}")]
    Api(String),

    /// The provider rejected the credential.
    #[error("LLM authentication failed: {0}")]
    Auth(String),

    /// Rate limit or quota exceeded.
    #[error("LLM rate limit or quota exceeded: {0}")]
    RateLimited(String),

    /// The model answered with no text at all.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The response text could not be read as CSV.
    #[error("LLM response is not valid CSV: {0}")]
    Unparsable(String),
}
