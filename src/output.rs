use crate::errors::ZoneError;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Write rows as CSV. A run can legitimately produce zero rows (an empty
/// zone selection, an empty input), and serde only emits the header record
/// alongside data, so the header is written explicitly in that case.
pub fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), ZoneError> {
    let mut wtr = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        wtr.write_record(header)?;
    } else {
        for r in rows {
            wtr.serialize(r)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ZoneError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
