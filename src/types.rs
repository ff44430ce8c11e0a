use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Operational zone labels describing a district's service-load profile.
///
/// The serde names double as the strings written to exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    #[serde(rename = "High Traffic Zone")]
    HighTraffic,
    #[serde(rename = "Ghost Zone")]
    Ghost,
    #[serde(rename = "Balanced Zone")]
    Balanced,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::HighTraffic, Zone::Ghost, Zone::Balanced];

    pub fn label(self) -> &'static str {
        match self {
            Zone::HighTraffic => "High Traffic Zone",
            Zone::Ghost => "Ghost Zone",
            Zone::Balanced => "Balanced Zone",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-district measure totals, one row per distinct district key.
///
/// District keys are compared by exact string equality; two spellings that
/// differ only in case or spacing are two districts.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictAggregate {
    pub district: String,
    pub update_total: f64,
    pub enroll_total: f64,
}

/// A classified district as it appears in the exported allocation report.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ClassifiedDistrict {
    #[serde(rename = "District")]
    #[tabled(rename = "District")]
    pub district: String,
    #[serde(rename = "Update_Count")]
    #[tabled(rename = "Update_Count")]
    pub update_total: f64,
    #[serde(rename = "New_Enrolment_Count")]
    #[tabled(rename = "New_Enrolment_Count")]
    pub enroll_total: f64,
    #[serde(rename = "Zone")]
    #[tabled(rename = "Zone")]
    pub zone: Zone,
    #[serde(rename = "Recommended_Action")]
    #[tabled(rename = "Recommended_Action")]
    pub recommended_action: String,
}

/// One merged row of the batch age-profile output, with the per-source
/// totals kept alongside the combined update total.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AgeProfileRow {
    #[serde(rename = "district")]
    #[tabled(rename = "district")]
    pub district: String,
    #[serde(rename = "total_enroll")]
    #[tabled(rename = "total_enroll")]
    pub total_enroll: f64,
    #[serde(rename = "total_demo")]
    #[tabled(rename = "total_demo")]
    pub total_demo: f64,
    #[serde(rename = "total_bio")]
    #[tabled(rename = "total_bio")]
    pub total_bio: f64,
    #[serde(rename = "total_update")]
    #[tabled(rename = "total_update")]
    pub total_update: f64,
    #[serde(rename = "zone")]
    #[tabled(rename = "zone")]
    pub zone: Zone,
}

/// Diagnostics for one completed pipeline run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub input_rows: usize,
    pub districts: usize,
    /// Non-empty cells that failed numeric coercion and counted as zero.
    pub coerced_cells: usize,
    pub empty_input: bool,
}

/// Totals written to `summary.json` after a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub generated_at: String,
    pub districts: usize,
    pub high_traffic: usize,
    pub ghost: usize,
    pub balanced: usize,
    pub total_enroll: f64,
    pub total_update: f64,
}
