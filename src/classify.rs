use crate::errors::ZoneError;
use crate::thresholds::{ThresholdKey, ThresholdSet};
use crate::types::{ClassifiedDistrict, DistrictAggregate, Zone};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Update total above which a district is high traffic under the fixed
/// cut-off policy.
pub const FIXED_UPDATE_CUTOFF: f64 = 4000.0;

/// Enrollment total below which a district is a ghost zone under the fixed
/// cut-off policy.
pub const FIXED_ENROLL_FLOOR: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    UpdateTotal,
    EnrollTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Above,
    AtLeast,
    Below,
}

/// Right-hand side of a comparison: a literal, or a cut-point looked up in
/// the run's `ThresholdSet`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    Value(f64),
    Threshold(ThresholdKey),
}

/// Predicate over one district aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Cmp {
        measure: Measure,
        op: Op,
        bound: Bound,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    fn cmp(measure: Measure, op: Op, bound: Bound) -> Condition {
        Condition::Cmp { measure, op, bound }
    }

    pub fn holds(&self, row: &DistrictAggregate, thresholds: &ThresholdSet) -> bool {
        match self {
            Condition::Cmp { measure, op, bound } => {
                let lhs = match measure {
                    Measure::UpdateTotal => row.update_total,
                    Measure::EnrollTotal => row.enroll_total,
                };
                let rhs = match bound {
                    Bound::Value(v) => Some(*v),
                    Bound::Threshold(key) => thresholds.get(*key),
                };
                // An undefined cut-point is one no value ever reaches.
                match rhs {
                    Some(rhs) => match op {
                        Op::Above => lhs > rhs,
                        Op::AtLeast => lhs >= rhs,
                        Op::Below => lhs < rhs,
                    },
                    None => false,
                }
            }
            Condition::All(inner) => inner.iter().all(|c| c.holds(row, thresholds)),
            Condition::Any(inner) => inner.iter().any(|c| c.holds(row, thresholds)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRule {
    pub when: Condition,
    pub zone: Zone,
}

/// An ordered rule list evaluated first-match-wins, with a fallback zone
/// when no rule fires. Policies are plain data so rule-set variants can be
/// selected (or shipped) without touching the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePolicy {
    pub name: String,
    pub rules: Vec<ZoneRule>,
    pub fallback: Zone,
}

impl ZonePolicy {
    /// Exactly one label per aggregate row: the zone of the first rule
    /// whose predicate holds, or the fallback.
    pub fn classify(&self, row: &DistrictAggregate, thresholds: &ThresholdSet) -> Zone {
        self.rules
            .iter()
            .find(|rule| rule.when.holds(row, thresholds))
            .map(|rule| rule.zone)
            .unwrap_or(self.fallback)
    }

    /// Constant cut-offs: `update > 4000` is high traffic, otherwise
    /// `enroll < 500` is a ghost zone, otherwise balanced.
    pub fn fixed_cutoffs() -> Self {
        ZonePolicy {
            name: "fixed cut-offs".to_string(),
            rules: vec![
                ZoneRule {
                    when: Condition::cmp(
                        Measure::UpdateTotal,
                        Op::Above,
                        Bound::Value(FIXED_UPDATE_CUTOFF),
                    ),
                    zone: Zone::HighTraffic,
                },
                ZoneRule {
                    when: Condition::cmp(
                        Measure::EnrollTotal,
                        Op::Below,
                        Bound::Value(FIXED_ENROLL_FLOOR),
                    ),
                    zone: Zone::Ghost,
                },
            ],
            fallback: Zone::Balanced,
        }
    }

    /// Percentile cut-points: at or above both highs is high traffic,
    /// otherwise below the update low is a ghost zone.
    pub fn adaptive() -> Self {
        ZonePolicy {
            name: "adaptive percentiles".to_string(),
            rules: vec![
                ZoneRule {
                    when: both_highs_at_least(),
                    zone: Zone::HighTraffic,
                },
                ZoneRule {
                    when: below_update_low(),
                    zone: Zone::Ghost,
                },
            ],
            fallback: Zone::Balanced,
        }
    }

    /// Like `adaptive`, but strictly exceeding either high also counts as
    /// high traffic; the ghost check runs only when both high rules fail.
    pub fn adaptive_extended() -> Self {
        ZonePolicy {
            name: "adaptive percentiles (extended)".to_string(),
            rules: vec![
                ZoneRule {
                    when: both_highs_at_least(),
                    zone: Zone::HighTraffic,
                },
                ZoneRule {
                    when: Condition::Any(vec![
                        Condition::cmp(
                            Measure::UpdateTotal,
                            Op::Above,
                            Bound::Threshold(ThresholdKey::UpdateHigh),
                        ),
                        Condition::cmp(
                            Measure::EnrollTotal,
                            Op::Above,
                            Bound::Threshold(ThresholdKey::EnrollHigh),
                        ),
                    ]),
                    zone: Zone::HighTraffic,
                },
                ZoneRule {
                    when: below_update_low(),
                    zone: Zone::Ghost,
                },
            ],
            fallback: Zone::Balanced,
        }
    }
}

fn both_highs_at_least() -> Condition {
    Condition::All(vec![
        Condition::cmp(
            Measure::UpdateTotal,
            Op::AtLeast,
            Bound::Threshold(ThresholdKey::UpdateHigh),
        ),
        Condition::cmp(
            Measure::EnrollTotal,
            Op::AtLeast,
            Bound::Threshold(ThresholdKey::EnrollHigh),
        ),
    ])
}

fn below_update_low() -> Condition {
    Condition::cmp(
        Measure::UpdateTotal,
        Op::Below,
        Bound::Threshold(ThresholdKey::UpdateLow),
    )
}

/// Maps each zone to its recommended staffing action.
///
/// Kept as configuration data rather than a hardcoded switch so deployments
/// can reword actions; totality comes from having one field per zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCatalog {
    pub high_traffic: String,
    pub ghost: String,
    pub balanced: String,
}

impl Default for ActionCatalog {
    fn default() -> Self {
        ActionCatalog {
            high_traffic: "Deploy Permanent Staff & Server Upgrade".to_string(),
            ghost: "Deploy Mobile Aadhaar Vans".to_string(),
            balanced: "Standard Operations".to_string(),
        }
    }
}

impl ActionCatalog {
    /// Shorter wording used by some deployments.
    pub fn concise() -> Self {
        ActionCatalog {
            high_traffic: "Deploy Permanent Staff".to_string(),
            ..ActionCatalog::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ZoneError> {
        let contents = fs::read_to_string(path)?;
        let catalog = serde_json::from_str(&contents)?;
        Ok(catalog)
    }

    pub fn action_for(&self, zone: Zone) -> &str {
        match zone {
            Zone::HighTraffic => &self.high_traffic,
            Zone::Ghost => &self.ghost,
            Zone::Balanced => &self.balanced,
        }
    }
}

/// Label every aggregate and attach its recommended action. The output is
/// never mutated afterwards; filtering works on copies.
pub fn classify_all(
    aggregates: &[DistrictAggregate],
    policy: &ZonePolicy,
    thresholds: &ThresholdSet,
    actions: &ActionCatalog,
) -> Vec<ClassifiedDistrict> {
    aggregates
        .iter()
        .map(|row| {
            let zone = policy.classify(row, thresholds);
            ClassifiedDistrict {
                district: row.district.clone(),
                update_total: row.update_total,
                enroll_total: row.enroll_total,
                zone,
                recommended_action: actions.action_for(zone).to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aggregate(district: &str, update: f64, enroll: f64) -> DistrictAggregate {
        DistrictAggregate {
            district: district.to_string(),
            update_total: update,
            enroll_total: enroll,
        }
    }

    #[test]
    fn fixed_cutoffs_classify_the_reference_rows() {
        let policy = ZonePolicy::fixed_cutoffs();
        let thresholds = ThresholdSet::default();
        // (update, enroll) per district.
        let a = aggregate("A", 1000.0, 6000.0);
        let b = aggregate("B", 200.0, 100.0);
        let c = aggregate("C", 5000.0, 4500.0);
        assert_eq!(policy.classify(&a, &thresholds), Zone::Balanced);
        assert_eq!(policy.classify(&b, &thresholds), Zone::Ghost);
        assert_eq!(policy.classify(&c, &thresholds), Zone::HighTraffic);
    }

    #[test]
    fn first_matching_rule_wins() {
        // Both the high-traffic and ghost predicates hold; the high-traffic
        // rule is checked first and must win.
        let thresholds = ThresholdSet {
            update_high: Some(4000.0),
            enroll_high: Some(8000.0),
            update_low: Some(6000.0),
        };
        let row = aggregate("D", 5000.0, 10000.0);
        assert_eq!(
            ZonePolicy::adaptive().classify(&row, &thresholds),
            Zone::HighTraffic
        );
        assert_eq!(
            ZonePolicy::adaptive_extended().classify(&row, &thresholds),
            Zone::HighTraffic
        );
    }

    #[test]
    fn adaptive_requires_both_highs() {
        let thresholds = ThresholdSet {
            update_high: Some(1000.0),
            enroll_high: Some(500.0),
            update_low: Some(100.0),
        };
        // High updates but ordinary enrollment: not high traffic under the
        // conjunctive rule.
        let row = aggregate("E", 2000.0, 400.0);
        assert_eq!(
            ZonePolicy::adaptive().classify(&row, &thresholds),
            Zone::Balanced
        );
        // The extended policy admits it through the disjunctive rule.
        assert_eq!(
            ZonePolicy::adaptive_extended().classify(&row, &thresholds),
            Zone::HighTraffic
        );
    }

    #[test]
    fn ghost_when_updates_fall_below_the_low_cut() {
        let thresholds = ThresholdSet {
            update_high: Some(1000.0),
            enroll_high: Some(500.0),
            update_low: Some(100.0),
        };
        let row = aggregate("F", 50.0, 200.0);
        assert_eq!(
            ZonePolicy::adaptive().classify(&row, &thresholds),
            Zone::Ghost
        );
        assert_eq!(
            ZonePolicy::adaptive_extended().classify(&row, &thresholds),
            Zone::Ghost
        );
    }

    #[test]
    fn sole_district_sits_at_its_own_percentiles() {
        let row = aggregate("G", 700.0, 90.0);
        let thresholds = ThresholdSet::compute(std::slice::from_ref(&row));
        // Equality satisfies the conjunctive at-least rule, so the sole
        // district lands in the high-traffic zone under both adaptive
        // policies; nothing panics on the way there.
        assert_eq!(
            ZonePolicy::adaptive().classify(&row, &thresholds),
            Zone::HighTraffic
        );
        assert_eq!(
            ZonePolicy::adaptive_extended().classify(&row, &thresholds),
            Zone::HighTraffic
        );
    }

    #[test]
    fn undefined_thresholds_are_never_reached() {
        let thresholds = ThresholdSet::default();
        let row = aggregate("H", 1_000_000.0, 1_000_000.0);
        // With no cut-points, no adaptive rule can fire.
        assert_eq!(
            ZonePolicy::adaptive().classify(&row, &thresholds),
            Zone::Balanced
        );
        assert_eq!(
            ZonePolicy::adaptive_extended().classify(&row, &thresholds),
            Zone::Balanced
        );
    }

    #[test]
    fn classification_is_total() {
        let aggregates = vec![
            aggregate("A", 0.0, 0.0),
            aggregate("B", f64::MAX, 0.0),
            aggregate("C", -10.0, -10.0),
        ];
        let thresholds = ThresholdSet::compute(&aggregates);
        let classified = classify_all(
            &aggregates,
            &ZonePolicy::adaptive_extended(),
            &thresholds,
            &ActionCatalog::default(),
        );
        assert_eq!(classified.len(), aggregates.len());
        for row in &classified {
            assert!(Zone::ALL.contains(&row.zone));
            assert!(!row.recommended_action.is_empty());
        }
    }

    #[test]
    fn actions_follow_the_catalog() {
        let catalog = ActionCatalog::default();
        assert_eq!(
            catalog.action_for(Zone::HighTraffic),
            "Deploy Permanent Staff & Server Upgrade"
        );
        assert_eq!(catalog.action_for(Zone::Ghost), "Deploy Mobile Aadhaar Vans");
        assert_eq!(catalog.action_for(Zone::Balanced), "Standard Operations");
        assert_eq!(
            ActionCatalog::concise().action_for(Zone::HighTraffic),
            "Deploy Permanent Staff"
        );
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let catalog = ActionCatalog {
            high_traffic: "Add a second counter".to_string(),
            ghost: "Send the van".to_string(),
            balanced: "No change".to_string(),
        };
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed: ActionCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn policies_serialize_as_configuration() {
        let policy = ZonePolicy::adaptive_extended();
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: ZonePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
    }
}
