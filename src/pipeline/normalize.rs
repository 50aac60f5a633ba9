//! LLM table cleanup.
//!
//! An extracted grid is rendered as aligned plain text, sent to the model
//! with the normalisation instruction, and the answer is read back as CSV.
//! The first CSV record fixes the table width: longer rows make the answer
//! unusable, shorter rows are padded with empty cells.

use crate::config::ExtractionConfig;
use crate::error::{NormalizeError, Pdf2XlsxError};
use crate::pipeline::llm::{resolve_backend, LlmBackend};
use crate::pipeline::postprocess::clean_csv_response;
use crate::prompts::normalize_prompt;
use crate::table::{ExtractedTable, NormalizedTable, Table};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Reshape one extracted table into a clean rectangular one.
#[async_trait]
pub trait TableNormalizer: Send + Sync {
    async fn normalize(&self, table: &ExtractedTable) -> Result<NormalizedTable, NormalizeError>;
}

/// [`TableNormalizer`] backed by an [`LlmBackend`].
pub struct LlmNormalizer {
    backend: Arc<dyn LlmBackend>,
    instruction: Option<String>,
}

impl LlmNormalizer {
    pub fn new(backend: Arc<dyn LlmBackend>, instruction: Option<String>) -> Self {
        Self {
            backend,
            instruction,
        }
    }

    /// Resolve the backend from the config (see [`resolve_backend`]).
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, Pdf2XlsxError> {
        let backend = resolve_backend(config)?;
        Ok(Self::new(backend, config.prompt.clone()))
    }

    pub fn backend_label(&self) -> String {
        self.backend.label()
    }
}

#[async_trait]
impl TableNormalizer for LlmNormalizer {
    async fn normalize(&self, table: &ExtractedTable) -> Result<NormalizedTable, NormalizeError> {
        let prompt = normalize_prompt(self.instruction.as_deref(), &table_to_text(&table.table));
        let answer = self.backend.complete(&prompt).await?;
        debug!(
            "Page {} ({}): {} chars back from {}",
            table.page,
            table.method,
            answer.len(),
            self.backend.label()
        );
        parse_csv(&answer).map(|table| NormalizedTable { table })
    }
}

/// Render a grid as whitespace-aligned text, one line per row.
pub fn table_to_text(table: &Table) -> String {
    let mut widths = vec![0usize; table.column_count()];
    for row in table.rows() {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a model answer as CSV.
pub fn parse_csv(answer: &str) -> Result<Table, NormalizeError> {
    let cleaned = clean_csv_response(answer);
    if cleaned.trim().is_empty() {
        return Err(NormalizeError::EmptyResponse);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(cleaned.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut width = 0;
    for record in reader.records() {
        let record = record.map_err(|e| NormalizeError::Unparsable(e.to_string()))?;
        let mut row: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        if rows.is_empty() {
            width = row.len();
        } else if row.len() > width {
            return Err(NormalizeError::Unparsable(format!(
                "row {} has {} fields, the header has {}",
                rows.len() + 1,
                row.len(),
                width
            )));
        }
        row.resize(width, String::new());
        rows.push(row);
    }

    let table = Table::new(rows);
    if table.is_empty() {
        return Err(NormalizeError::EmptyResponse);
    }
    Ok(table)
}

/// Serialise a grid as CSV.
pub fn table_to_csv(table: &Table) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in table.rows() {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
