use crate::aggregate::{aggregate_dynamic, aggregate_fixed, merge_district_totals};
use crate::classify::{classify_all, ActionCatalog, ZonePolicy};
use crate::errors::ZoneError;
use crate::loader::{load_table, DataTable};
use crate::output;
use crate::thresholds::ThresholdSet;
use crate::types::{
    AgeProfileRow, AnalysisReport, BatchSummary, ClassifiedDistrict, DistrictAggregate, Zone,
};
use chrono::Utc;
use std::collections::HashSet;
use std::io;
use std::path::Path;

pub const REPORT_HEADER: [&str; 5] = [
    "District",
    "Update_Count",
    "New_Enrolment_Count",
    "Zone",
    "Recommended_Action",
];

const AGE_PROFILE_HEADER: [&str; 6] = [
    "district",
    "total_enroll",
    "total_demo",
    "total_bio",
    "total_update",
    "zone",
];

// Fixed batch-mode file names; each run overwrites the previous output.
pub const ENROLLMENT_FILE: &str = "enrollment.csv";
pub const DEMOGRAPHIC_FILE: &str = "demographic_update.csv";
pub const BIOMETRIC_FILE: &str = "biometric_update.csv";
pub const BATCH_OUTPUT_FILE: &str = "final_output.csv";
pub const BATCH_SUMMARY_FILE: &str = "summary.json";

/// Header substring that selects the age-bucket measure columns.
pub const AGE_COLUMN_PATTERN: &str = "age";

/// Everything one pipeline run produces. Held in the session slot so the
/// report can be re-filtered and re-exported without re-aggregating.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub rows: Vec<ClassifiedDistrict>,
    pub thresholds: ThresholdSet,
    pub report: AnalysisReport,
}

impl AnalysisResult {
    pub fn zone_count(&self, zone: Zone) -> usize {
        self.rows.iter().filter(|r| r.zone == zone).count()
    }
}

/// One full pipeline pass over a loaded table: aggregate by district,
/// derive the threshold set, classify, and attach recommendations.
///
/// An empty table is not an error; it flows through as an empty report with
/// undefined thresholds.
pub fn run_analysis(
    table: &DataTable,
    policy: &ZonePolicy,
    actions: &ActionCatalog,
) -> Result<AnalysisResult, ZoneError> {
    let (aggregates, coerced_cells) = aggregate_fixed(table)?;
    let thresholds = ThresholdSet::compute(&aggregates);
    if coerced_cells > 0 {
        log::warn!(
            "{} cell(s) failed numeric coercion and counted as zero",
            coerced_cells
        );
    }
    if aggregates.is_empty() {
        log::warn!("input has no data rows; the report will be empty");
    }
    log::debug!(
        "aggregated {} input rows into {} districts",
        table.rows.len(),
        aggregates.len()
    );

    let rows = classify_all(&aggregates, policy, &thresholds, actions);
    Ok(AnalysisResult {
        report: AnalysisReport {
            input_rows: table.rows.len(),
            districts: rows.len(),
            coerced_cells,
            empty_input: table.rows.is_empty(),
        },
        rows,
        thresholds,
    })
}

/// Rows whose zone is in `selected`, in their original relative order.
/// An empty selection is a valid, empty result.
pub fn filter_by_zones(
    rows: &[ClassifiedDistrict],
    selected: &HashSet<Zone>,
) -> Vec<ClassifiedDistrict> {
    rows.iter()
        .filter(|r| selected.contains(&r.zone))
        .cloned()
        .collect()
}

pub fn export_report(path: &Path, rows: &[ClassifiedDistrict]) -> Result<(), ZoneError> {
    output::write_csv(path, &REPORT_HEADER, rows)
}

/// Render the report to an in-memory CSV string (UTF-8, header included
/// even with zero rows).
pub fn render_report(rows: &[ClassifiedDistrict]) -> Result<String, ZoneError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        wtr.write_record(REPORT_HEADER)?;
    } else {
        for r in rows {
            wtr.serialize(r)?;
        }
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ZoneError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| ZoneError::Format {
        format: "utf-8",
        detail: e.to_string(),
    })
}

/// Result of a batch age-profile run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub rows: Vec<AgeProfileRow>,
    pub thresholds: ThresholdSet,
    pub summary: BatchSummary,
    pub coerced_cells: usize,
}

/// Batch age-profile analysis over the three fixed-name input files in
/// `dir`: normalize headers, discover the age-bucket columns per file,
/// aggregate per district, outer-join the three totals with zero fill, and
/// classify on `enroll` vs `demo + bio`.
///
/// Writes `final_output.csv` and `summary.json` into `dir`, overwriting any
/// prior run's output.
pub fn run_batch(dir: &Path, policy: &ZonePolicy) -> Result<BatchOutcome, ZoneError> {
    let enroll_totals = load_age_totals(&dir.join(ENROLLMENT_FILE))?;
    let demo_totals = load_age_totals(&dir.join(DEMOGRAPHIC_FILE))?;
    let bio_totals = load_age_totals(&dir.join(BIOMETRIC_FILE))?;
    let coerced_cells = enroll_totals.1 + demo_totals.1 + bio_totals.1;
    if coerced_cells > 0 {
        log::warn!(
            "{} cell(s) failed numeric coercion and counted as zero",
            coerced_cells
        );
    }

    let merged = merge_district_totals(&[enroll_totals.0, demo_totals.0, bio_totals.0]);
    let aggregates: Vec<DistrictAggregate> = merged
        .iter()
        .map(|(district, totals)| DistrictAggregate {
            district: district.clone(),
            update_total: totals[1] + totals[2],
            enroll_total: totals[0],
        })
        .collect();
    let thresholds = ThresholdSet::compute(&aggregates);

    let rows: Vec<AgeProfileRow> = merged
        .iter()
        .zip(&aggregates)
        .map(|((district, totals), aggregate)| AgeProfileRow {
            district: district.clone(),
            total_enroll: totals[0],
            total_demo: totals[1],
            total_bio: totals[2],
            total_update: aggregate.update_total,
            zone: policy.classify(aggregate, &thresholds),
        })
        .collect();

    output::write_csv(&dir.join(BATCH_OUTPUT_FILE), &AGE_PROFILE_HEADER, &rows)?;
    let summary = BatchSummary {
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        districts: rows.len(),
        high_traffic: rows.iter().filter(|r| r.zone == Zone::HighTraffic).count(),
        ghost: rows.iter().filter(|r| r.zone == Zone::Ghost).count(),
        balanced: rows.iter().filter(|r| r.zone == Zone::Balanced).count(),
        total_enroll: rows.iter().map(|r| r.total_enroll).sum(),
        total_update: rows.iter().map(|r| r.total_update).sum(),
    };
    output::write_json(&dir.join(BATCH_SUMMARY_FILE), &summary)?;

    Ok(BatchOutcome {
        rows,
        thresholds,
        summary,
        coerced_cells,
    })
}

fn load_age_totals(path: &Path) -> Result<(Vec<(String, f64)>, usize), ZoneError> {
    let mut table = load_table(path)?;
    table.normalize_headers()?;
    aggregate_dynamic(&table, "district", AGE_COLUMN_PATTERN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{DISTRICT_COLUMN, ENROLL_COLUMN, UPDATE_COLUMN};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn fixed_table(rows: &[(&str, &str, &str)]) -> DataTable {
        let mut table = DataTable::new(vec![
            DISTRICT_COLUMN.to_string(),
            UPDATE_COLUMN.to_string(),
            ENROLL_COLUMN.to_string(),
        ]);
        for (d, u, e) in rows {
            table.push_row(vec![d.to_string(), u.to_string(), e.to_string()]);
        }
        table
    }

    fn reference_result() -> AnalysisResult {
        let table = fixed_table(&[
            ("A", "1000", "6000"),
            ("B", "200", "100"),
            ("C", "5000", "4500"),
        ]);
        run_analysis(
            &table,
            &ZonePolicy::fixed_cutoffs(),
            &ActionCatalog::default(),
        )
        .unwrap()
    }

    #[test]
    fn end_to_end_fixed_strategy() {
        let result = reference_result();
        let zones: Vec<(String, Zone)> = result
            .rows
            .iter()
            .map(|r| (r.district.clone(), r.zone))
            .collect();
        assert_eq!(
            zones,
            vec![
                ("A".to_string(), Zone::Balanced),
                ("B".to_string(), Zone::Ghost),
                ("C".to_string(), Zone::HighTraffic),
            ]
        );
        assert_eq!(
            result.rows[2].recommended_action,
            "Deploy Permanent Staff & Server Upgrade"
        );
        assert_eq!(result.report.districts, 3);
        assert!(!result.report.empty_input);
    }

    #[test]
    fn classification_survives_an_empty_table() {
        let table = fixed_table(&[]);
        let result = run_analysis(
            &table,
            &ZonePolicy::adaptive(),
            &ActionCatalog::default(),
        )
        .unwrap();
        assert!(result.rows.is_empty());
        assert!(result.report.empty_input);
        assert_eq!(result.thresholds, ThresholdSet::default());
    }

    #[test]
    fn input_order_does_not_change_classification() {
        let forward = fixed_table(&[
            ("A", "1000", "6000"),
            ("B", "200", "100"),
            ("C", "5000", "4500"),
        ]);
        let backward = fixed_table(&[
            ("C", "5000", "4500"),
            ("B", "200", "100"),
            ("A", "1000", "6000"),
        ]);
        let policy = ZonePolicy::adaptive_extended();
        let actions = ActionCatalog::default();
        let fwd = run_analysis(&forward, &policy, &actions).unwrap();
        let bwd = run_analysis(&backward, &policy, &actions).unwrap();
        assert_eq!(fwd.thresholds, bwd.thresholds);
        for row in &fwd.rows {
            let mirror = bwd.rows.iter().find(|r| r.district == row.district).unwrap();
            assert_eq!(mirror.zone, row.zone);
        }
    }

    #[test]
    fn filtering_is_a_subset_preserving_order() {
        let result = reference_result();
        let selected: HashSet<Zone> = [Zone::Ghost, Zone::HighTraffic].into_iter().collect();
        let filtered = filter_by_zones(&result.rows, &selected);
        assert!(filtered.iter().all(|r| selected.contains(&r.zone)));
        let names: Vec<&str> = filtered.iter().map(|r| r.district.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        // Every selected row appears exactly once.
        let expected: Vec<&str> = result
            .rows
            .iter()
            .filter(|r| selected.contains(&r.zone))
            .map(|r| r.district.as_str())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn empty_selection_renders_header_only() {
        let result = reference_result();
        let filtered = filter_by_zones(&result.rows, &HashSet::new());
        assert!(filtered.is_empty());
        let rendered = render_report(&filtered).unwrap();
        assert_eq!(
            rendered,
            "District,Update_Count,New_Enrolment_Count,Zone,Recommended_Action\n"
        );
    }

    #[test]
    fn rendered_report_uses_the_fixed_header_and_labels() {
        let result = reference_result();
        let rendered = render_report(&result.rows).unwrap();
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next(),
            Some("District,Update_Count,New_Enrolment_Count,Zone,Recommended_Action")
        );
        assert_eq!(
            lines.next(),
            Some("A,1000.0,6000.0,Balanced Zone,Standard Operations")
        );
    }

    #[test]
    fn export_writes_the_report_to_disk() {
        let result = reference_result();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        export_report(&path, &result.rows).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, render_report(&result.rows).unwrap());
    }

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn batch_run_merges_three_sources_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        // Headers vary in case and spacing; normalization squares them off.
        write_file(
            dir.path(),
            ENROLLMENT_FILE,
            "District, Age_0_5 ,AGE_5_18\nNorth,10,20\nSouth,5,5\n",
        );
        write_file(
            dir.path(),
            DEMOGRAPHIC_FILE,
            "district,age_18_60\nNorth,40\nEast,8\n",
        );
        write_file(
            dir.path(),
            BIOMETRIC_FILE,
            "district,age_60_plus\nSouth,3\n",
        );

        let outcome = run_batch(dir.path(), &ZonePolicy::adaptive()).unwrap();
        assert_eq!(outcome.rows.len(), 3);

        let north = outcome.rows.iter().find(|r| r.district == "North").unwrap();
        assert_eq!(north.total_enroll, 30.0);
        assert_eq!(north.total_demo, 40.0);
        assert_eq!(north.total_bio, 0.0);
        assert_eq!(north.total_update, 40.0);

        // A district missing from a source contributes zero there.
        let east = outcome.rows.iter().find(|r| r.district == "East").unwrap();
        assert_eq!(east.total_enroll, 0.0);
        assert_eq!(east.total_update, 8.0);

        let output = std::fs::read_to_string(dir.path().join(BATCH_OUTPUT_FILE)).unwrap();
        assert!(output.starts_with("district,total_enroll,total_demo,total_bio,total_update,zone"));
        let summary = std::fs::read_to_string(dir.path().join(BATCH_SUMMARY_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["districts"], 3);
        assert_eq!(
            parsed["high_traffic"].as_u64().unwrap()
                + parsed["ghost"].as_u64().unwrap()
                + parsed["balanced"].as_u64().unwrap(),
            3
        );
    }

    #[test]
    fn batch_run_fails_cleanly_when_an_input_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), ENROLLMENT_FILE, "district,age_0_5\nA,1\n");
        let err = run_batch(dir.path(), &ZonePolicy::adaptive()).unwrap_err();
        assert!(matches!(err, ZoneError::Io(_)));
    }
}
