use crate::errors::ZoneError;
use crate::loader::DataTable;
use crate::types::DistrictAggregate;
use crate::util::parse_f64_safe;
use std::collections::HashMap;

pub const DISTRICT_COLUMN: &str = "District";
pub const UPDATE_COLUMN: &str = "Update_Count";
pub const ENROLL_COLUMN: &str = "New_Enrolment_Count";

/// Running totals for one district key plus the coercion counter shared by
/// a whole pass.
#[derive(Debug, Default)]
struct GroupedTotals {
    index: HashMap<String, usize>,
    order: Vec<String>,
    totals: Vec<Vec<f64>>,
    coerced_cells: usize,
}

impl GroupedTotals {
    fn new() -> Self {
        GroupedTotals::default()
    }

    fn slot(&mut self, district: &str, width: usize) -> usize {
        match self.index.get(district) {
            Some(&i) => i,
            None => {
                let i = self.order.len();
                self.index.insert(district.to_string(), i);
                self.order.push(district.to_string());
                self.totals.push(vec![0.0; width]);
                i
            }
        }
    }

    /// Coerce a cell to a number. Missing cells and failed coercions both
    /// contribute zero; only the failures are counted.
    fn coerce(&mut self, cell: &str) -> f64 {
        match parse_f64_safe(Some(cell)) {
            Some(v) => v,
            None => {
                if !cell.trim().is_empty() {
                    self.coerced_cells += 1;
                }
                0.0
            }
        }
    }
}

/// Group rows by the `District` column and sum the fixed measure columns
/// (`Update_Count`, `New_Enrolment_Count`) independently.
///
/// Every input row lands in exactly one aggregate; rows are never dropped
/// for bad measure values. Returns the aggregates in first-appearance order
/// of the district key, plus the count of cells that failed coercion.
pub fn aggregate_fixed(table: &DataTable) -> Result<(Vec<DistrictAggregate>, usize), ZoneError> {
    let district_col = require_column(table, DISTRICT_COLUMN)?;
    let update_col = require_column(table, UPDATE_COLUMN)?;
    let enroll_col = require_column(table, ENROLL_COLUMN)?;

    let mut grouped = GroupedTotals::new();
    for row in &table.rows {
        let slot = grouped.slot(&row[district_col], 2);
        let update = grouped.coerce(&row[update_col]);
        let enroll = grouped.coerce(&row[enroll_col]);
        grouped.totals[slot][0] += update;
        grouped.totals[slot][1] += enroll;
    }

    let aggregates = grouped
        .order
        .iter()
        .zip(&grouped.totals)
        .map(|(district, sums)| DistrictAggregate {
            district: district.clone(),
            update_total: sums[0],
            enroll_total: sums[1],
        })
        .collect();
    Ok((aggregates, grouped.coerced_cells))
}

/// Indices of every column whose (already normalized) header contains
/// `pattern`. Built once per load; the dynamic aggregation path iterates
/// this list instead of naming columns.
pub fn discover_measure_columns(table: &DataTable, pattern: &str) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains(pattern))
        .map(|(i, _)| i)
        .collect()
}

/// Group rows by `district_column` and sum a row-wise total of every
/// pattern-matched measure column.
///
/// Used by the age-profile ingestion, where the measure set varies by file
/// and is discovered from the headers at run time.
pub fn aggregate_dynamic(
    table: &DataTable,
    district_column: &str,
    pattern: &str,
) -> Result<(Vec<(String, f64)>, usize), ZoneError> {
    let district_col = require_column(table, district_column)?;
    let measure_cols = discover_measure_columns(table, pattern);

    let mut grouped = GroupedTotals::new();
    for row in &table.rows {
        let slot = grouped.slot(&row[district_col], 1);
        let mut row_total = 0.0;
        for &col in &measure_cols {
            row_total += grouped.coerce(&row[col]);
        }
        grouped.totals[slot][0] += row_total;
    }

    let totals = grouped
        .order
        .iter()
        .zip(&grouped.totals)
        .map(|(district, sums)| (district.clone(), sums[0]))
        .collect();
    Ok((totals, grouped.coerced_cells))
}

/// Outer-join several per-district total lists on the district key.
///
/// The result has one row per district seen in any input, in order of first
/// appearance across the inputs; a district absent from some input gets
/// zero for that input's column.
pub fn merge_district_totals(tables: &[Vec<(String, f64)>]) -> Vec<(String, Vec<f64>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<(String, Vec<f64>)> = Vec::new();
    for (t, totals) in tables.iter().enumerate() {
        for (district, total) in totals {
            let slot = match index.get(district) {
                Some(&i) => i,
                None => {
                    let i = merged.len();
                    index.insert(district.clone(), i);
                    merged.push((district.clone(), vec![0.0; tables.len()]));
                    i
                }
            };
            merged[slot].1[t] += *total;
        }
    }
    merged
}

fn require_column(table: &DataTable, name: &str) -> Result<usize, ZoneError> {
    table
        .column_index(name)
        .ok_or_else(|| ZoneError::MissingColumn(name.to_string()))
}
