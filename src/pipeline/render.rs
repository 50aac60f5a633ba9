//! PDF access via pdfium: page rasterisation, embedded text, and metadata.
//!
//! The extraction stage never talks to pdfium directly; it goes through the
//! [`PageSource`] trait so the fallback logic can be exercised against an
//! in-memory document in tests. [`PdfiumPages`] is the production
//! implementation.
//!
//! pdfium keeps thread-local state and its document handles are not `Send`,
//! so everything in this module is blocking and must run inside
//! `spawn_blocking`, created and dropped on the same thread.

use crate::config::ExtractionConfig;
use crate::error::{PageError, Pdf2XlsxError};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Rasteriser + embedded text for one open document.
///
/// Page indices are 0-based; errors carry 1-based page numbers.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Rasterise one page.
    fn render(&self, index: usize) -> Result<DynamicImage, PageError>;

    /// Plain page text in reading order, as the PDF stores it.
    fn text(&self, index: usize) -> Result<String, PageError>;
}

/// Bind to a pdfium shared library.
///
/// With `library_dir` set only that directory is tried; otherwise the
/// current directory, then the system library search path.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, Pdf2XlsxError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2XlsxError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Open a document, mapping pdfium's load errors onto fatal run errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2XlsxError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.to_lowercase().contains("password") {
            if password.is_some() {
                Pdf2XlsxError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2XlsxError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2XlsxError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail,
            }
        }
    })
}

/// [`PageSource`] over an open pdfium document.
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
    dpi: u32,
    max_pixels: u32,
}

impl<'a> PdfiumPages<'a> {
    pub fn new(document: PdfDocument<'a>, config: &ExtractionConfig) -> Self {
        let pages = document.pages().len();
        info!("PDF loaded: {} pages", pages);
        Self {
            document,
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, String> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| format!("{e:?}"))
    }
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render(&self, index: usize) -> Result<DynamicImage, PageError> {
        let failed = |detail: String| PageError::RenderFailed {
            page: index + 1,
            detail,
        };
        let page = self.page(index).map_err(failed)?;

        let width_px = target_width(page.width().value, self.dpi, self.max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px as i32)
            .set_maximum_height(self.max_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("{e:?}")))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn text(&self, index: usize) -> Result<String, PageError> {
        let failed = |detail: String| PageError::TextLayerFailed {
            page: index + 1,
            detail,
        };
        let page = self.page(index).map_err(failed)?;
        let text = page.text().map_err(|e| failed(format!("{e:?}")))?;
        Ok(text.all())
    }
}

/// Pixel width for a page `points` wide at `dpi`, capped at `max_pixels`.
pub(crate) fn target_width(points: f32, dpi: u32, max_pixels: u32) -> u32 {
    let px = (points / 72.0 * dpi as f32).round().max(1.0) as u32;
    px.min(max_pixels)
}

/// Extract document metadata without touching page content.
pub fn extract_metadata_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2XlsxError> {
    let document = open_document(pdfium, pdf_path, password)?;
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_width_follows_dpi() {
        // US Letter is 612pt wide: 8.5in × 200dpi = 1700px.
        assert_eq!(target_width(612.0, 200, 3000), 1700);
        assert_eq!(target_width(612.0, 72, 3000), 612);
    }

    #[test]
    fn target_width_is_capped() {
        assert_eq!(target_width(2384.0, 400, 3000), 3000);
    }
}
