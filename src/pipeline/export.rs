//! Workbook writer: one sheet per table.
//!
//! Sheets are named `Table_1`, `Table_2`, … in the order the tables were
//! extracted. The workbook is assembled in memory, written next to the
//! target as `<name>.xlsx.tmp`, then renamed over the target, so a failed
//! run never leaves a truncated `.xlsx` behind.

use crate::error::Pdf2XlsxError;
use crate::table::Table;
use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sheet name for the 1-indexed table ordinal `n`.
pub fn sheet_name(n: usize) -> String {
    format!("Table_{n}")
}

/// Write `tables` to `path`, returning the sheet names in order.
pub fn export_workbook(
    tables: &[Table],
    path: &Path,
    infer_numbers: bool,
) -> Result<Vec<String>, Pdf2XlsxError> {
    let export_err = |e: XlsxError| Pdf2XlsxError::Export {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };
    if tables.is_empty() {
        return Err(Pdf2XlsxError::Export {
            path: path.to_path_buf(),
            detail: "no tables to write".to_string(),
        });
    }

    let mut workbook = Workbook::new();
    let mut names = Vec::with_capacity(tables.len());
    for (i, table) in tables.iter().enumerate() {
        let name = sheet_name(i + 1);
        let sheet = workbook.add_worksheet();
        sheet.set_name(&name).map_err(export_err)?;

        for (r, row) in table.rows().iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let (r, c) = cell_position(r, c).ok_or_else(|| Pdf2XlsxError::Export {
                    path: path.to_path_buf(),
                    detail: format!("{name}: cell ({r}, {c}) is outside the sheet limits"),
                })?;
                match numeric_value(cell).filter(|_| infer_numbers) {
                    Some(n) => sheet.write_number(r, c, n),
                    None => sheet.write_string(r, c, cell),
                }
                .map_err(export_err)?;
            }
        }
        debug!(
            "{}: {} rows x {} columns",
            name,
            table.row_count(),
            table.column_count()
        );
        names.push(name);
    }

    let bytes = workbook.save_to_buffer().map_err(export_err)?;
    write_atomically(path, &bytes)?;
    info!("Wrote {} sheet(s) to {}", names.len(), path.display());
    Ok(names)
}

/// Excel row/column indices, if the cell fits on a sheet.
fn cell_position(row: usize, col: usize) -> Option<(u32, u16)> {
    const MAX_ROWS: usize = 1_048_576;
    const MAX_COLS: usize = 16_384;
    if row >= MAX_ROWS || col >= MAX_COLS {
        return None;
    }
    Some((row as u32, col as u16))
}

/// The cell as a number, when it is one.
///
/// Values with a leading zero such as `007` are identifiers, not numbers,
/// and stay text.
pub fn numeric_value(cell: &str) -> Option<f64> {
    let t = cell.trim();
    let digits = t.trim_start_matches(['-', '+']);
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Pdf2XlsxError> {
    let io_err = |source: std::io::Error| Pdf2XlsxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = temp_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        io_err(e)
    })
}
