//! OCR fallback: the Tesseract CLI over a preprocessed page image.
//!
//! The engine is invoked as a subprocess on a temporary PNG; recognised text
//! is read from stdout.

use crate::config::OcrSettings;
use crate::table::Table;
use image::{DynamicImage, ImageFormat};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary could not be started.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the temporary input image failed.
    #[error("failed to prepare OCR input: {0}")]
    Input(String),

    /// The engine ran and exited with an error.
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Text recognition over one page image.
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// [`OcrEngine`] that shells out to `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    settings: OcrSettings,
}

impl TesseractEngine {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// True when `<command> --version` runs successfully.
    pub fn is_available(&self) -> bool {
        Command::new(&self.settings.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(OcrSettings::default())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("pdf2xlsx-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Input(e.to_string()))?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::Input(e.to_string()))?;

        let command = &self.settings.command;
        let output = Command::new(command)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", self.settings.language.as_str()])
            .arg("--psm")
            .arg(self.settings.psm.to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| OcrError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                command: command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR recognised {} chars", text.len());
        Ok(text)
    }
}

/// Split text into lines and each line into whitespace-separated tokens.
///
/// Blank lines are dropped; the result is ragged.
pub fn tokenize_lines(text: &str) -> Table {
    Table::new(
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_yields_ragged_rows() {
        let table = tokenize_lines("Name  Qty\nWidget 3 blue\n\n  Gadget\r\n");
        assert_eq!(
            table.rows(),
            &[
                vec!["Name".to_string(), "Qty".to_string()],
                vec!["Widget".into(), "3".into(), "blue".into()],
                vec!["Gadget".into()],
            ]
        );
        assert!(!table.is_rectangular());
    }

    #[test]
    fn blank_text_yields_empty_table() {
        let table = tokenize_lines(" \n\t\n");
        assert_eq!(table.row_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let engine = TesseractEngine::new(OcrSettings {
            command: "pdf2xlsx-no-such-ocr-binary".into(),
            ..OcrSettings::default()
        });
        assert!(!engine.is_available());
        let err = engine
            .recognize(&DynamicImage::new_luma8(8, 8))
            .unwrap_err();
        assert!(matches!(err, OcrError::Spawn { .. }), "got: {err}");
    }
}
