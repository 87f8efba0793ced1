//! Dosage rule models.
//!
//! A rule's predicate is a fixed set of tagged clauses (age band, weight band,
//! required flags). When several rules match a patient, the most specific one
//! wins; see [`Specificity`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::PatientProfile;

/// Half-open numeric band `[min, max)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// A band must be finite on the lower end and non-empty.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && !self.max.is_nan() && self.min < self.max
    }
}

/// Patient-class predicate of a dosage rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientPredicate {
    /// Age band in years
    pub age: Option<Band>,
    /// Weight band in kg
    pub weight: Option<Band>,
    /// Tags that must all be present among the patient's contraindication tags
    /// (e.g. "renal-impaired", "hepatic-impaired")
    pub flags: Vec<String>,
}

impl PatientPredicate {
    /// Predicate that matches every patient.
    pub fn any() -> Self {
        Self::default()
    }

    /// Evaluate the predicate against a patient.
    ///
    /// A weight band never matches a patient without a recorded weight.
    pub fn matches(&self, patient: &PatientProfile) -> bool {
        if let Some(age) = &self.age {
            if !age.contains(patient.age_years) {
                return false;
            }
        }

        if let Some(weight) = &self.weight {
            match patient.weight_kg {
                Some(w) if weight.contains(w) => {}
                _ => return false,
            }
        }

        self.flags
            .iter()
            .all(|flag| patient.contraindications.contains(flag))
    }

    /// Specificity key of this predicate.
    pub fn specificity(&self) -> Specificity {
        Specificity {
            age_span: self.age.map(|b| b.width()),
            weight_span: self.weight.map(|b| b.width()),
            flag_count: self.flags.len(),
        }
    }
}

/// How narrowly a predicate targets a patient class.
///
/// Ordered so that the *most specific* predicate sorts first: any age band
/// before none, then the narrower age band, then the same for weight, then
/// more required flags. A one-sided band is still a band even though its
/// width is infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Specificity {
    pub age_span: Option<f64>,
    pub weight_span: Option<f64>,
    pub flag_count: usize,
}

impl Specificity {
    /// Compare two keys, most specific first.
    pub fn most_specific_first(&self, other: &Self) -> Ordering {
        narrower_first(self.age_span, other.age_span)
            .then_with(|| narrower_first(self.weight_span, other.weight_span))
            .then_with(|| other.flag_count.cmp(&self.flag_count))
    }
}

fn narrower_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Safe dose limits of a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DoseLimit {
    /// Absolute single-dose range
    Fixed { min: f64, max: f64 },
    /// Weight-based single-dose range, optionally capped
    PerKg {
        min_per_kg: f64,
        max_per_kg: f64,
        absolute_max: Option<f64>,
    },
}

impl DoseLimit {
    /// Check the limit's internal consistency.
    pub fn is_valid(&self) -> bool {
        match *self {
            DoseLimit::Fixed { min, max } => min.is_finite() && max.is_finite() && 0.0 <= min && min <= max,
            DoseLimit::PerKg {
                min_per_kg,
                max_per_kg,
                absolute_max,
            } => {
                min_per_kg.is_finite()
                    && max_per_kg.is_finite()
                    && 0.0 <= min_per_kg
                    && min_per_kg <= max_per_kg
                    && absolute_max.map_or(true, |cap| cap.is_finite() && cap > 0.0)
            }
        }
    }
}

/// Catalog dosing rule for one drug and one patient class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRule {
    pub drug_id: String,
    pub predicate: PatientPredicate,
    pub limit: DoseLimit,
    /// Canonical unit of the limit (e.g. "mg", "mL")
    pub unit: String,
    /// Maximum administrations per day
    pub max_daily_frequency: Option<f64>,
}

/// Concrete safe range for one patient, in the rule's unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SafeRange {
    pub min: f64,
    pub max: f64,
}

impl SafeRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}
