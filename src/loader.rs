use crate::errors::ZoneError;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;

/// A loaded tabular file: named columns over rows of string cells.
///
/// Cells stay untyped at this stage; numeric coercion happens during
/// aggregation so that measure columns can be chosen at run time. Rows are
/// padded or truncated to the header width on load, so positional indexing
/// by a header's column index is always in bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(headers: Vec<String>) -> Self {
        DataTable {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Index of a column by exact header match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Lower-case and trim every header so later stages can match fields by
    /// a canonical name regardless of source capitalization or spacing.
    ///
    /// Two distinct source headers collapsing onto the same canonical name
    /// would silently shadow one another, so that case is rejected instead.
    /// On error the table is left untouched.
    pub fn normalize_headers(&mut self) -> Result<(), ZoneError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut normalized = Vec::with_capacity(self.headers.len());
        for h in &self.headers {
            let canon = h.trim().to_lowercase();
            if !seen.insert(canon.clone()) {
                return Err(ZoneError::HeaderCollision(canon));
            }
            normalized.push(canon);
        }
        self.headers = normalized;
        Ok(())
    }
}

/// Load a tabular file, picking the parser from the file extension:
/// `.csv`/`.txt` are read as delimited text, `.xlsx`/`.xlsm`/`.xls`/`.ods`
/// as a spreadsheet (first worksheet, first row as header).
///
/// Column presence is not checked here; a missing measure column surfaces
/// later, from whichever stage needs it.
pub fn load_table(path: &Path) -> Result<DataTable, ZoneError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => load_delimited(path),
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(path),
        _ => Err(ZoneError::Format {
            format: "tabular file",
            detail: format!("unsupported file extension '{}'", ext),
        }),
    }
}

fn load_delimited(path: &Path) -> Result<DataTable, ZoneError> {
    // Flexible mode tolerates ragged rows; `push_row` squares them off.
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = DataTable::new(headers);
    for result in rdr.records() {
        let record = result?;
        table.push_row(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(table)
}

fn load_spreadsheet(path: &Path) -> Result<DataTable, ZoneError> {
    let mut workbook = open_workbook_auto(path).map_err(sheet_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ZoneError::Format {
            format: "spreadsheet",
            detail: "workbook contains no sheets".to_string(),
        })?
        .map_err(sheet_error)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(r) => r.iter().map(cell_to_string).collect(),
        None => Vec::new(),
    };
    let mut table = DataTable::new(headers);
    for row in rows {
        table.push_row(row.iter().map(cell_to_string).collect());
    }
    Ok(table)
}

fn sheet_error(e: calamine::Error) -> ZoneError {
    match e {
        calamine::Error::Io(io) => ZoneError::Io(io),
        other => ZoneError::Format {
            format: "spreadsheet",
            detail: other.to_string(),
        },
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // String cells are kept verbatim; key columns must not be reshaped.
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
