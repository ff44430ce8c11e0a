use crate::types::DistrictAggregate;
use crate::util::quantile;
use serde::{Deserialize, Serialize};

/// Quantile marking the "high traffic" cut for both measures.
pub const HIGH_QUANTILE: f64 = 0.75;

/// Quantile marking the "ghost" cut for the update total.
pub const LOW_QUANTILE: f64 = 0.25;

/// Cut-points derived from the aggregate distribution of a single run.
///
/// Computed once after aggregation and immutable for the rest of the run;
/// every new run recomputes from scratch. `None` means the run had no
/// districts; classification treats an undefined cut-point as one that no
/// value ever reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub update_high: Option<f64>,
    pub enroll_high: Option<f64>,
    pub update_low: Option<f64>,
}

/// Names a cut-point so classification rules can reference thresholds as
/// configuration data rather than captured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdKey {
    UpdateHigh,
    EnrollHigh,
    UpdateLow,
}

impl ThresholdSet {
    pub fn compute(aggregates: &[DistrictAggregate]) -> Self {
        let updates: Vec<f64> = aggregates.iter().map(|a| a.update_total).collect();
        let enrolls: Vec<f64> = aggregates.iter().map(|a| a.enroll_total).collect();
        ThresholdSet {
            update_high: quantile(&updates, HIGH_QUANTILE),
            enroll_high: quantile(&enrolls, HIGH_QUANTILE),
            update_low: quantile(&updates, LOW_QUANTILE),
        }
    }

    pub fn get(&self, key: ThresholdKey) -> Option<f64> {
        match key {
            ThresholdKey::UpdateHigh => self.update_high,
            ThresholdKey::EnrollHigh => self.enroll_high,
            ThresholdKey::UpdateLow => self.update_low,
        }
    }
}
