//! Configuration types for PDF-table extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The nested settings structs group the
//! knobs of one stage each.

use crate::error::Pdf2XlsxError;
use crate::progress::ProgressReporter;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used for normalisation when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Configuration for one PDF-to-workbook run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2xlsx::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("sk-ant-...")
///     .dpi(200)
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–400. Default: 200.
    ///
    /// The render feeds Tesseract and the ruling detector; both lose thin
    /// strokes below ~150 DPI.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Directory holding the pdfium shared library. If None, the current
    /// directory is tried first, then the system library path.
    pub pdfium_library_dir: Option<PathBuf>,

    /// Run the LLM normalisation stage. Default: true.
    pub normalize: bool,

    /// Anthropic API key. When set, normalisation uses an Anthropic
    /// provider built with this key instead of environment lookup.
    pub api_key: Option<String>,

    /// LLM model identifier. Default: [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name for edgequake-llm (e.g. "openai", "ollama").
    /// Ignored when `api_key` or `provider` is set.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the LLM may generate per table. Default: 2048.
    pub max_tokens: usize,

    /// Sampling temperature for the cleanup call. Default: 0.0.
    pub temperature: f32,

    /// Custom normalisation instruction. If None, uses the built-in one.
    pub prompt: Option<String>,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Also OCR pages whose structured stage found nothing. Default: false.
    ///
    /// Scanned PDFs have no text layer, so structured extraction returns
    /// zero tables without raising and OCR would otherwise never run.
    pub ocr_empty_pages: bool,

    /// Write numeric-looking cells as numbers in the workbook. Default: true.
    pub infer_numbers: bool,

    pub tables: TableSettings,
    pub preprocess: PreprocessSettings,
    pub ocr: OcrSettings,

    /// Receives per-page and per-table events. Default: None.
    pub reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 3000,
            password: None,
            pages: PageSelection::default(),
            pdfium_library_dir: None,
            normalize: true,
            api_key: None,
            model: None,
            provider_name: None,
            provider: None,
            max_tokens: 2048,
            temperature: 0.0,
            prompt: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            ocr_empty_pages: false,
            infer_numbers: true,
            tables: TableSettings::default(),
            preprocess: PreprocessSettings::default(),
            ocr: OcrSettings::default(),
            reporter: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("pdfium_library_dir", &self.pdfium_library_dir)
            .field("normalize", &self.normalize)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("ocr_empty_pages", &self.ocr_empty_pages)
            .field("infer_numbers", &self.infer_numbers)
            .field("tables", &self.tables)
            .field("preprocess", &self.preprocess)
            .field("ocr", &self.ocr)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn pdfium_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_dir = Some(dir.into());
        self
    }

    pub fn normalize(mut self, v: bool) -> Self {
        self.config.normalize = v;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn ocr_empty_pages(mut self, v: bool) -> Self {
        self.config.ocr_empty_pages = v;
        self
    }

    pub fn infer_numbers(mut self, v: bool) -> Self {
        self.config.infer_numbers = v;
        self
    }

    pub fn tables(mut self, settings: TableSettings) -> Self {
        self.config.tables = settings;
        self
    }

    pub fn preprocess(mut self, settings: PreprocessSettings) -> Self {
        self.config.preprocess = settings;
        self
    }

    pub fn ocr(mut self, settings: OcrSettings) -> Self {
        self.config.ocr = settings;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.config.reporter = Some(reporter);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2XlsxError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2XlsxError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.preprocess.block_size < 3 || c.preprocess.block_size % 2 == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(format!(
                "threshold block size must be odd and ≥ 3, got {}",
                c.preprocess.block_size
            )));
        }
        if c.tables.min_words_vertical == 0 || c.tables.min_words_horizontal == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "table word-alignment thresholds must be ≥ 1".into(),
            ));
        }
        if let Some(acc) = c.tables.min_accuracy {
            if !(0.0..=1.0).contains(&acc) {
                return Err(Pdf2XlsxError::InvalidConfig(format!(
                    "min_accuracy must be 0.0–1.0, got {acc}"
                )));
            }
        }
        if c.ocr.command.trim().is_empty() {
            return Err(Pdf2XlsxError::InvalidConfig(
                "OCR command must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Stage settings ───────────────────────────────────────────────────────

/// Tuning handed to the pdfplumber table finder for both strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Stream: words that must share a left, right or centre alignment
    /// before the alignment counts as a column edge.
    pub min_words_vertical: usize,
    /// Stream: words that must share a baseline before it counts as a row
    /// edge.
    pub min_words_horizontal: usize,
    /// Drop tables whose share of filled cells is below this (0.0 to 1.0).
    pub min_accuracy: Option<f64>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            min_words_vertical: 3,
            min_words_horizontal: 1,
            min_accuracy: None,
        }
    }
}

/// Image cleanup applied before OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// Side of the adaptive-threshold window in pixels (odd).
    pub block_size: u32,
    /// Constant subtracted from the local mean.
    pub offset: i16,
    /// Radius of the square opening kernel (1 ⇒ 3×3).
    pub kernel_radius: u8,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            block_size: 11,
            offset: 2,
            kernel_radius: 1,
        }
    }
}

/// How Tesseract is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Executable name or path. Default: "tesseract".
    pub command: String,
    /// Language pack(s), e.g. "eng" or "eng+deu".
    pub language: String,
    /// Page segmentation mode. 6 assumes a uniform block of text, which
    /// keeps table rows on one line each.
    pub psm: u8,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            psm: 6,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to scan for tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
