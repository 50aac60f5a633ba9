//! Deterministic cleanup of LLM-generated CSV.
//!
//! Even when told to answer with CSV only, models wrap the rows in code
//! fences, prepend a sentence such as "Here is the cleaned table:", or leak
//! zero-width characters copied from the source text. These passes remove
//! such artefacts without touching cell content, so the CSV reader sees
//! nothing but records.
//!
//! Order matters: line endings are normalised first so the fence pattern
//! only has to match `\n`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup passes to a raw model answer.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Keep only the body of the first fenced block, if there is one
/// 4. Drop a leading prose line that introduces the table
/// 5. Trim trailing whitespace at the end of the answer
///
/// Lines inside the body are left alone: a quoted cell may span several
/// lines, blank ones included. The CSV reader skips empty records itself.
pub fn clean_csv_response(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = extract_fenced_block(&s);
    let s = drop_leading_prose(&s);
    s.trim_end().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Fenced block ─────────────────────────────────────────────────────

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n(.*?)\n?```").unwrap());

fn extract_fenced_block(input: &str) -> String {
    match RE_FENCED.captures(input) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 4: Leading prose ────────────────────────────────────────────────────

/// "Here is the cleaned table:" and friends. A real header row ending in a
/// colon would still contain a comma.
fn is_intro_line(line: &str) -> bool {
    let t = line.trim();
    t.ends_with(':') && !t.contains(',')
}

fn drop_leading_prose(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n');
    match trimmed.split_once('\n') {
        Some((first, rest)) if is_intro_line(first) => rest.to_string(),
        None if is_intro_line(trimmed) => String::new(),
        _ => trimmed.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
