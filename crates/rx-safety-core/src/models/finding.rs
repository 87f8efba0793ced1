//! Safety findings produced by the engine.
//!
//! `Finding` is a closed union: the aggregator matches on it exhaustively, so a
//! new finding kind cannot be added without deciding its priority.

use serde::{Deserialize, Serialize};

use super::{DrugPair, InteractionEdge, SafeRange, Severity};

/// Whether a prescribed dose is below or above the safe range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoseDirection {
    Under,
    Over,
}

/// Two prescribed drugs interact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionFinding {
    pub pair: DrugPair,
    pub severity: Severity,
    pub mechanism: String,
    pub source: Option<String>,
    pub explanation: String,
}

impl InteractionFinding {
    pub fn from_edge(edge: &InteractionEdge) -> Self {
        let explanation = format!(
            "{} interaction between {} and {}: {}",
            edge.severity,
            edge.pair.first(),
            edge.pair.second(),
            edge.mechanism
        );
        Self {
            pair: edge.pair.clone(),
            severity: edge.severity,
            mechanism: edge.mechanism.clone(),
            source: edge.source.clone(),
            explanation,
        }
    }
}

/// A prescribed dose falls outside the patient's safe range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageFinding {
    pub drug_id: String,
    /// Prescribed dose converted to the rule's unit
    pub prescribed: f64,
    pub unit: String,
    pub safe_range: SafeRange,
    pub direction: DoseDirection,
    pub explanation: String,
}

impl DosageFinding {
    pub fn new(drug_id: &str, prescribed: f64, unit: &str, safe_range: SafeRange, direction: DoseDirection) -> Self {
        let explanation = match direction {
            DoseDirection::Over => format!(
                "{} dose of {}{} exceeds the safe maximum of {}{}",
                drug_id, prescribed, unit, safe_range.max, unit
            ),
            DoseDirection::Under => format!(
                "{} dose of {}{} is below the effective minimum of {}{}",
                drug_id, prescribed, unit, safe_range.min, unit
            ),
        };
        Self {
            drug_id: drug_id.to_string(),
            prescribed,
            unit: unit.to_string(),
            safe_range,
            direction,
            explanation,
        }
    }
}

/// A prescribed frequency exceeds the rule's daily cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyFinding {
    pub drug_id: String,
    pub prescribed_per_day: f64,
    pub max_per_day: f64,
    pub explanation: String,
}

impl FrequencyFinding {
    pub fn new(drug_id: &str, prescribed_per_day: f64, max_per_day: f64) -> Self {
        Self {
            drug_id: drug_id.to_string(),
            prescribed_per_day,
            max_per_day,
            explanation: format!(
                "{} is prescribed {} times per day; the maximum is {}",
                drug_id, prescribed_per_day, max_per_day
            ),
        }
    }
}

/// A drug is contraindicated by a patient condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContraindicationFinding {
    pub drug_id: String,
    pub tag: String,
    pub blocking: bool,
    pub explanation: String,
}

impl ContraindicationFinding {
    pub fn new(drug_id: &str, tag: &str, blocking: bool, note: Option<&str>) -> Self {
        let mut explanation = format!("{} is contraindicated for patients tagged '{}'", drug_id, tag);
        if let Some(note) = note {
            explanation.push_str(": ");
            explanation.push_str(note);
        }
        Self {
            drug_id: drug_id.to_string(),
            tag: tag.to_string(),
            blocking,
            explanation,
        }
    }
}

/// A drug belongs to an allergy group recorded for the patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyFinding {
    pub drug_id: String,
    pub tag: String,
    pub explanation: String,
}

impl AllergyFinding {
    pub fn new(drug_id: &str, tag: &str) -> Self {
        Self {
            drug_id: drug_id.to_string(),
            tag: tag.to_string(),
            explanation: format!("patient is allergic to '{}', which covers {}", tag, drug_id),
        }
    }
}

/// Why the engine could not judge a drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataGap {
    /// No dosage rule matches the patient
    NoDosageRule,
    /// Prescribed unit cannot be converted to the rule's unit
    UnitMismatch { prescribed: String, expected: String },
    /// Frequency text could not be read while the rule caps frequency
    UnreadableFrequency { text: String },
}

/// The engine lacks data to evaluate a drug for this patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsufficientDataFinding {
    pub drug_id: String,
    pub gap: DataGap,
    pub explanation: String,
}

impl InsufficientDataFinding {
    pub fn new(drug_id: &str, gap: DataGap) -> Self {
        let explanation = match &gap {
            DataGap::NoDosageRule => format!(
                "insufficient data: no dosing rule for {} covers this patient",
                drug_id
            ),
            DataGap::UnitMismatch { prescribed, expected } => format!(
                "insufficient data: {} is prescribed in '{}' but dosed in '{}'",
                drug_id, prescribed, expected
            ),
            DataGap::UnreadableFrequency { text } => format!(
                "insufficient data: cannot read frequency '{}' for {}",
                text, drug_id
            ),
        };
        Self {
            drug_id: drug_id.to_string(),
            gap,
            explanation,
        }
    }
}

/// An entry names a drug that the catalog does not know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnknownDrugFinding {
    /// Position of the entry in the request
    pub entry_index: usize,
    pub requested: String,
    pub explanation: String,
}

impl UnknownDrugFinding {
    pub fn new(entry_index: usize, requested: &str) -> Self {
        Self {
            entry_index,
            requested: requested.to_string(),
            explanation: format!("'{}' is not in the medication catalog", requested),
        }
    }
}

/// Closed union of every finding kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Interaction(InteractionFinding),
    Dosage(DosageFinding),
    Frequency(FrequencyFinding),
    Contraindication(ContraindicationFinding),
    Allergy(AllergyFinding),
    InsufficientData(InsufficientDataFinding),
    UnknownDrug(UnknownDrugFinding),
}

/// Machine-readable finding kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Interaction,
    Dosage,
    Frequency,
    Contraindication,
    Allergy,
    InsufficientData,
    UnknownDrug,
}

/// Ranking tier of a finding, most urgent first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Blocking,
    High,
    Moderate,
    Informational,
    DataQuality,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Interaction => "interaction",
            FindingKind::Dosage => "dosage",
            FindingKind::Frequency => "frequency",
            FindingKind::Contraindication => "contraindication",
            FindingKind::Allergy => "allergy",
            FindingKind::InsufficientData => "insufficient_data",
            FindingKind::UnknownDrug => "unknown_drug",
        }
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Blocking => "blocking",
            Priority::High => "high",
            Priority::Moderate => "moderate",
            Priority::Informational => "informational",
            Priority::DataQuality => "data_quality",
        }
    }
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Finding::Interaction(_) => FindingKind::Interaction,
            Finding::Dosage(_) => FindingKind::Dosage,
            Finding::Frequency(_) => FindingKind::Frequency,
            Finding::Contraindication(_) => FindingKind::Contraindication,
            Finding::Allergy(_) => FindingKind::Allergy,
            Finding::InsufficientData(_) => FindingKind::InsufficientData,
            Finding::UnknownDrug(_) => FindingKind::UnknownDrug,
        }
    }

    /// Ranking tier.
    ///
    /// Severe interactions, allergies and blocking contraindications block;
    /// moderate interactions and overdoses are high; mild interactions and
    /// underdoses are moderate; other contraindications are informational.
    pub fn priority(&self) -> Priority {
        match self {
            Finding::Interaction(f) => match f.severity {
                Severity::Severe => Priority::Blocking,
                Severity::Moderate => Priority::High,
                Severity::Mild | Severity::None => Priority::Moderate,
            },
            Finding::Allergy(_) => Priority::Blocking,
            Finding::Dosage(f) => match f.direction {
                DoseDirection::Over => Priority::High,
                DoseDirection::Under => Priority::Moderate,
            },
            Finding::Frequency(_) => Priority::High,
            Finding::Contraindication(f) if f.blocking => Priority::Blocking,
            Finding::Contraindication(_) => Priority::Informational,
            Finding::InsufficientData(_) | Finding::UnknownDrug(_) => Priority::DataQuality,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Finding::Interaction(f) => &f.explanation,
            Finding::Dosage(f) => &f.explanation,
            Finding::Frequency(f) => &f.explanation,
            Finding::Contraindication(f) => &f.explanation,
            Finding::Allergy(f) => &f.explanation,
            Finding::InsufficientData(f) => &f.explanation,
            Finding::UnknownDrug(f) => &f.explanation,
        }
    }

    /// Catalog drug ids this finding refers to.
    pub fn drug_ids(&self) -> Vec<&str> {
        match self {
            Finding::Interaction(f) => vec![f.pair.first(), f.pair.second()],
            Finding::Dosage(f) => vec![f.drug_id.as_str()],
            Finding::Frequency(f) => vec![f.drug_id.as_str()],
            Finding::Contraindication(f) => vec![f.drug_id.as_str()],
            Finding::Allergy(f) => vec![f.drug_id.as_str()],
            Finding::InsufficientData(f) => vec![f.drug_id.as_str()],
            Finding::UnknownDrug(_) => Vec::new(),
        }
    }
}

/// A finding with its assigned tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFinding {
    pub priority: Priority,
    #[serde(flatten)]
    pub finding: Finding,
}
