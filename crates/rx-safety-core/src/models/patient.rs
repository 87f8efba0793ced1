//! Patient profile supplied per request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Patient attributes relevant to prescription safety.
///
/// Request-scoped: the engine never stores a profile beyond one analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientProfile {
    /// Age in years
    pub age_years: f64,
    /// Weight in kg (required by weight-based dosing rules)
    pub weight_kg: Option<f64>,
    /// Allergy tags (e.g. "penicillin"), lower-case
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    /// Contraindication tags (e.g. "pregnant", "renal-impaired"), lower-case
    #[serde(default)]
    pub contraindications: BTreeSet<String>,
}

impl PatientProfile {
    /// Create a profile with only an age.
    pub fn new(age_years: f64) -> Self {
        Self {
            age_years,
            ..Default::default()
        }
    }

    /// Builder-style weight setter.
    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    /// Builder-style allergy setter.
    pub fn with_allergy(mut self, tag: &str) -> Self {
        self.allergies.insert(tag.trim().to_lowercase());
        self
    }

    /// Builder-style contraindication setter.
    pub fn with_contraindication(mut self, tag: &str) -> Self {
        self.contraindications.insert(tag.trim().to_lowercase());
        self
    }

    /// Copy of this profile with all tags trimmed and lower-cased.
    pub fn canonical(&self) -> Self {
        Self {
            age_years: self.age_years,
            weight_kg: self.weight_kg,
            allergies: self
                .allergies
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            contraindications: self
                .contraindications
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Check required fields; returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !self.age_years.is_finite() || self.age_years < 0.0 {
            return Err(format!("age must be a non-negative number, got {}", self.age_years));
        }
        if let Some(w) = self.weight_kg {
            if !w.is_finite() || w <= 0.0 {
                return Err(format!("weight must be a positive number of kg, got {}", w));
            }
        }
        Ok(())
    }
}
