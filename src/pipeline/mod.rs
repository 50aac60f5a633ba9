//! Pipeline stages for PDF-to-workbook table extraction.
//!
//! Each submodule implements one step. Stages that touch pdfium, Tesseract
//! or the file system are blocking; only [`llm`] does network I/O.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ structured ───────────┬─▶ normalize ──▶ export
//!  (URL/path) (pdfplumber:         │    (LLM CSV)     (.xlsx)
//!              stream, lattice)    │
//!  render ──▶ preprocess ──▶ ocr ──┘
//!  (pdfium)   (binarise)   (tesseract)
//! ```
//!
//! 1. [`input`] — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`] — rasterise pages and read their embedded text
//! 3. [`preprocess`] — adaptive threshold + opening ahead of OCR
//! 4. [`structured`] — stream and lattice table detection with pdfplumber
//! 5. [`ocr`] — Tesseract fallback and line tokenisation
//! 6. [`extract`] — the per-page fallback chain tying 2–5 together
//! 7. [`normalize`] / [`llm`] / [`postprocess`] — LLM cleanup to CSV
//! 8. [`export`] — one sheet per table, atomic write

pub mod export;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod structured;
