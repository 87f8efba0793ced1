//! Prescription request models.

use serde::{Deserialize, Serialize};

use super::PatientProfile;

/// A prescribed amount with its unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    pub amount: f64,
    pub unit: String,
}

impl Dose {
    pub fn new(amount: f64, unit: &str) -> Self {
        Self {
            amount,
            unit: unit.to_string(),
        }
    }
}

/// One drug line of a prescription, already structured by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionEntry {
    /// Catalog drug id (a synonym is accepted and resolved)
    pub drug_id: String,
    /// Prescribed single dose
    pub dose: Dose,
    /// Prescribed frequency as written (e.g. "bid", "every 8 hours")
    pub frequency: Option<String>,
    /// Route of administration, informational
    #[serde(default)]
    pub route: Option<String>,
}

impl PrescriptionEntry {
    pub fn new(drug_id: &str, amount: f64, unit: &str) -> Self {
        Self {
            drug_id: drug_id.to_string(),
            dose: Dose::new(amount, unit),
            frequency: None,
            route: None,
        }
    }

    /// Builder-style frequency setter.
    pub fn with_frequency(mut self, frequency: &str) -> Self {
        self.frequency = Some(frequency.to_string());
        self
    }
}

/// A complete analysis request: ordered entries plus one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionRequest {
    pub entries: Vec<PrescriptionEntry>,
    pub patient: PatientProfile,
}
