//! Dosage engine: rule selection, safe-range computation and dose checks.

use thiserror::Error;

use crate::catalog::CatalogSnapshot;
use crate::models::{
    DataGap, DoseDirection, DoseLimit, DosageFinding, DosageRule, Dose, Finding, FrequencyFinding,
    InsufficientDataFinding, PatientProfile, SafeRange,
};
use crate::normalizer::Normalizer;

/// Dosage evaluation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DosageError {
    #[error("no dosage rule for '{drug_id}' matches the patient")]
    RuleNotFound { drug_id: String },

    #[error("invalid patient data for '{drug_id}': {reason}")]
    InvalidPatientData { drug_id: String, reason: String },

    #[error("'{drug_id}' prescribed in '{prescribed}', rule is in '{expected}'")]
    UnitMismatch {
        drug_id: String,
        prescribed: String,
        expected: String,
    },
}

pub type DosageResult<T> = Result<T, DosageError>;

impl DosageError {
    /// Data gap reported for errors that do not abort the request.
    pub fn data_gap(&self) -> Option<DataGap> {
        match self {
            DosageError::RuleNotFound { .. } => Some(DataGap::NoDosageRule),
            DosageError::UnitMismatch {
                prescribed, expected, ..
            } => Some(DataGap::UnitMismatch {
                prescribed: prescribed.clone(),
                expected: expected.clone(),
            }),
            DosageError::InvalidPatientData { .. } => None,
        }
    }
}

/// Pick the most specific rule matching the patient.
///
/// Rules are stored most specific first, so the first match wins.
pub fn select_rule<'s>(
    snapshot: &'s CatalogSnapshot,
    drug_id: &str,
    patient: &PatientProfile,
) -> DosageResult<&'s DosageRule> {
    snapshot
        .dosage_rules(drug_id)
        .iter()
        .find(|rule| rule.predicate.matches(patient))
        .ok_or_else(|| DosageError::RuleNotFound {
            drug_id: drug_id.to_string(),
        })
}

/// Concrete safe range of `rule` for `patient`.
pub fn safe_range(rule: &DosageRule, patient: &PatientProfile) -> DosageResult<SafeRange> {
    match rule.limit {
        DoseLimit::Fixed { min, max } => Ok(SafeRange { min, max }),
        DoseLimit::PerKg {
            min_per_kg,
            max_per_kg,
            absolute_max,
        } => {
            let weight = match patient.weight_kg {
                Some(w) if w.is_finite() && w > 0.0 => w,
                Some(w) => {
                    return Err(DosageError::InvalidPatientData {
                        drug_id: rule.drug_id.clone(),
                        reason: format!("weight must be positive, got {}", w),
                    })
                }
                None => {
                    return Err(DosageError::InvalidPatientData {
                        drug_id: rule.drug_id.clone(),
                        reason: "weight is required for weight-based dosing".to_string(),
                    })
                }
            };

            let mut max = max_per_kg * weight;
            if let Some(cap) = absolute_max {
                max = max.min(cap);
            }
            Ok(SafeRange {
                min: (min_per_kg * weight).min(max),
                max,
            })
        }
    }
}

/// Evaluates prescribed doses against catalog rules.
pub struct DosageEngine {
    normalizer: Normalizer,
}

impl Default for DosageEngine {
    fn default() -> Self {
        Self::new(Normalizer::new())
    }
}

impl DosageEngine {
    /// Create a new engine using `normalizer` for unit conversion.
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Check a single prescribed dose.
    ///
    /// `Ok(None)` means the dose is within the safe range.
    pub fn evaluate(
        &self,
        snapshot: &CatalogSnapshot,
        drug_id: &str,
        patient: &PatientProfile,
        dose: &Dose,
    ) -> DosageResult<Option<DosageFinding>> {
        let rule = select_rule(snapshot, drug_id, patient)?;
        self.evaluate_rule(rule, patient, dose)
    }

    /// Check a dose against an already selected rule.
    pub fn evaluate_rule(
        &self,
        rule: &DosageRule,
        patient: &PatientProfile,
        dose: &Dose,
    ) -> DosageResult<Option<DosageFinding>> {
        let range = safe_range(rule, patient)?;
        let amount = self
            .normalizer
            .convert_dose(dose, &rule.unit)
            .ok_or_else(|| DosageError::UnitMismatch {
                drug_id: rule.drug_id.clone(),
                prescribed: dose.unit.clone(),
                expected: rule.unit.clone(),
            })?;

        let direction = if amount < range.min {
            Some(DoseDirection::Under)
        } else if amount > range.max {
            Some(DoseDirection::Over)
        } else {
            None
        };

        Ok(direction.map(|d| DosageFinding::new(&rule.drug_id, amount, &rule.unit, range, d)))
    }

    /// Check the prescribed frequency against the rule's daily cap.
    ///
    /// Returns a frequency finding when over the cap, an insufficient-data
    /// finding when the text cannot be read, and nothing when the rule has no
    /// cap or no frequency was given.
    pub fn check_frequency(&self, rule: &DosageRule, frequency: Option<&str>) -> Option<Finding> {
        let cap = rule.max_daily_frequency?;
        let text = frequency?;

        match self.normalizer.doses_per_day(text) {
            Some(per_day) if per_day > cap => Some(Finding::Frequency(FrequencyFinding::new(
                &rule.drug_id,
                per_day,
                cap,
            ))),
            Some(_) => None,
            None => Some(Finding::InsufficientData(InsufficientDataFinding::new(
                &rule.drug_id,
                DataGap::UnreadableFrequency {
                    text: text.to_string(),
                },
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, DosageRuleRecord, DrugRecord};
    use crate::models::Band;

    fn snapshot() -> CatalogSnapshot {
        let mut renal = DosageRuleRecord::fixed("metformin", 250.0, 500.0, "mg");
        renal.flags = vec!["renal-impaired".into()];

        let mut capped = DosageRuleRecord::fixed("ibuprofen", 200.0, 800.0, "mg").for_ages(12.0, 130.0);
        capped.max_daily_frequency = Some(3.0);

        let mut paed = DosageRuleRecord::per_kg("ibuprofen", 5.0, 10.0, "mg").for_ages(0.5, 12.0);
        paed.absolute_max = Some(400.0);

        let source = CatalogSource {
            drugs: vec![
                DrugRecord::new("ibuprofen", "Ibuprofen", "nsaid"),
                DrugRecord::new("metformin", "Metformin", "biguanide"),
                DrugRecord::new("amoxicillin", "Amoxicillin", "penicillin"),
            ],
            interactions: vec![],
            dosage_rules: vec![
                capped,
                paed,
                DosageRuleRecord::fixed("metformin", 500.0, 1000.0, "mg"),
                renal,
                DosageRuleRecord::per_kg("amoxicillin", 0.0, 10.0, "mg"),
            ],
        };
        CatalogSnapshot::load(&source).unwrap()
    }

    #[test]
    fn test_fixed_range_within() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let adult = PatientProfile::new(40.0).with_weight(70.0);

        let result = engine
            .evaluate(&snapshot, "ibuprofen", &adult, &Dose::new(400.0, "mg"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_fixed_range_over_after_unit_conversion() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let adult = PatientProfile::new(40.0);

        let finding = engine
            .evaluate(&snapshot, "ibuprofen", &adult, &Dose::new(1.2, "g"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.direction, DoseDirection::Over);
        assert!((finding.prescribed - 1200.0).abs() < 1e-9);
        assert_eq!(finding.safe_range.max, 800.0);
    }

    #[test]
    fn test_under_dose() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();

        let finding = engine
            .evaluate(&snapshot, "ibuprofen", &PatientProfile::new(30.0), &Dose::new(100.0, "mg"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.direction, DoseDirection::Under);
    }

    #[test]
    fn test_per_kg_with_absolute_cap() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let child = PatientProfile::new(8.0).with_weight(50.0);

        // 10 mg/kg * 50 kg = 500 mg, capped at 400 mg
        let finding = engine
            .evaluate(&snapshot, "ibuprofen", &child, &Dose::new(450.0, "mg"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.direction, DoseDirection::Over);
        assert_eq!(finding.safe_range.max, 400.0);
    }

    #[test]
    fn test_per_kg_requires_weight() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let child = PatientProfile::new(8.0);

        let err = engine
            .evaluate(&snapshot, "ibuprofen", &child, &Dose::new(100.0, "mg"))
            .unwrap_err();
        assert!(matches!(err, DosageError::InvalidPatientData { .. }));
        assert!(err.data_gap().is_none());
    }

    #[test]
    fn test_rule_not_found_outside_bands() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();

        let err = engine
            .evaluate(&snapshot, "ibuprofen", &PatientProfile::new(200.0), &Dose::new(100.0, "mg"))
            .unwrap_err();
        assert_eq!(
            err,
            DosageError::RuleNotFound {
                drug_id: "ibuprofen".into()
            }
        );
        assert_eq!(err.data_gap(), Some(DataGap::NoDosageRule));
    }

    fn banded_snapshot(rules: Vec<DosageRuleRecord>) -> CatalogSnapshot {
        let source = CatalogSource {
            drugs: vec![
                DrugRecord::new("digoxin", "Digoxin", "cardiac-glycoside"),
                DrugRecord::new("gentamicin", "Gentamicin", "aminoglycoside"),
            ],
            interactions: vec![],
            dosage_rules: rules,
        };
        CatalogSnapshot::load(&source).unwrap()
    }

    #[test]
    fn test_one_sided_age_band_selected() {
        let mut geriatric = DosageRuleRecord::fixed("digoxin", 0.0625, 0.125, "mg");
        geriatric.age_min = Some(65.0);
        let snapshot = banded_snapshot(vec![
            DosageRuleRecord::fixed("digoxin", 0.125, 0.5, "mg"),
            geriatric,
        ]);

        let rule = select_rule(&snapshot, "digoxin", &PatientProfile::new(80.0)).unwrap();
        assert_eq!(rule.predicate.age, Some(Band::new(65.0, f64::INFINITY)));

        let rule = select_rule(&snapshot, "digoxin", &PatientProfile::new(40.0)).unwrap();
        assert_eq!(rule.predicate.age, None);

        // 0.25 mg is fine for an adult but over the geriatric limit
        let finding = DosageEngine::default()
            .evaluate(&snapshot, "digoxin", &PatientProfile::new(80.0), &Dose::new(0.25, "mg"))
            .unwrap()
            .unwrap();
        assert_eq!(finding.direction, DoseDirection::Over);
        assert_eq!(finding.safe_range.max, 0.125);
    }

    #[test]
    fn test_one_sided_weight_band_selected() {
        let mut heavy = DosageRuleRecord::fixed("gentamicin", 100.0, 200.0, "mg");
        heavy.weight_min = Some(120.0);
        let snapshot = banded_snapshot(vec![
            DosageRuleRecord::fixed("gentamicin", 100.0, 400.0, "mg"),
            heavy,
        ]);

        let patient = PatientProfile::new(50.0).with_weight(140.0);
        let rule = select_rule(&snapshot, "gentamicin", &patient).unwrap();
        assert_eq!(rule.predicate.weight, Some(Band::new(120.0, f64::INFINITY)));
    }

    #[test]
    fn test_age_band_outranks_flags() {
        let mut renal = DosageRuleRecord::fixed("gentamicin", 10.0, 50.0, "mg");
        renal.flags = vec!["renal-impaired".into()];
        let snapshot = banded_snapshot(vec![
            renal,
            DosageRuleRecord::fixed("gentamicin", 20.0, 40.0, "mg").for_ages(5.0, 6.0),
        ]);

        let child = PatientProfile::new(5.5).with_contraindication("renal-impaired");
        let rule = select_rule(&snapshot, "gentamicin", &child).unwrap();
        assert_eq!(rule.predicate.age, Some(Band::new(5.0, 6.0)));
        assert!(rule.predicate.flags.is_empty());

        let adult = PatientProfile::new(40.0).with_contraindication("renal-impaired");
        let rule = select_rule(&snapshot, "gentamicin", &adult).unwrap();
        assert_eq!(rule.predicate.flags, vec!["renal-impaired".to_string()]);
    }

    #[test]
    fn test_flags_break_ties_between_unbanded_rules() {
        let snapshot = snapshot();
        let renal = PatientProfile::new(60.0).with_contraindication("renal-impaired");
        let plain = PatientProfile::new(60.0);

        let rule = select_rule(&snapshot, "metformin", &renal).unwrap();
        assert_eq!(rule.predicate.flags, vec!["renal-impaired".to_string()]);

        let rule = select_rule(&snapshot, "metformin", &plain).unwrap();
        assert!(rule.predicate.flags.is_empty());
    }

    #[test]
    fn test_unit_mismatch() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();

        let err = engine
            .evaluate(&snapshot, "metformin", &PatientProfile::new(50.0), &Dose::new(5.0, "mL"))
            .unwrap_err();
        assert!(matches!(err, DosageError::UnitMismatch { .. }));
        assert!(matches!(err.data_gap(), Some(DataGap::UnitMismatch { .. })));
    }

    #[test]
    fn test_frequency_cap() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let rule = select_rule(&snapshot, "ibuprofen", &PatientProfile::new(30.0)).unwrap();

        assert!(engine.check_frequency(rule, Some("tid")).is_none());
        assert!(engine.check_frequency(rule, None).is_none());
        assert!(matches!(
            engine.check_frequency(rule, Some("every 4 hours")),
            Some(Finding::Frequency(_))
        ));
        assert!(matches!(
            engine.check_frequency(rule, Some("as the moon rises")),
            Some(Finding::InsufficientData(_))
        ));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let snapshot = snapshot();
        let engine = DosageEngine::default();
        let patient = PatientProfile::new(5.0).with_weight(18.0);
        let dose = Dose::new(250.0, "mg");

        let first = engine.evaluate(&snapshot, "amoxicillin", &patient, &dose);
        let second = engine.evaluate(&snapshot, "amoxicillin", &patient, &dose);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().unwrap().safe_range.max, 180.0);
    }
}
