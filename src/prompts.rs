//! Prompts for LLM-based table cleanup.
//!
//! Callers can override the instruction via
//! [`crate::config::ExtractionConfig::prompt`]; the table text is always
//! appended after it.

/// Default instruction sent ahead of each table.
pub const DEFAULT_NORMALIZE_PROMPT: &str = "Clean and structure this table data. Output as CSV format.
If there are headers, preserve them. Make best effort to maintain table structure.
Output ONLY the CSV rows: no commentary, no code fences.";

/// Build the user message for one table.
pub fn normalize_prompt(instruction: Option<&str>, table_text: &str) -> String {
    format!(
        "{}\nTable data:\n{}\n",
        instruction.unwrap_or(DEFAULT_NORMALIZE_PROMPT).trim_end(),
        table_text
    )
}
