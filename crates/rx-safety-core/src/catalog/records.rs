//! Raw catalog source records.
//!
//! Records come from heterogeneous sources, so required fields are optional
//! here and checked by the loader, which reports the record and field at fault.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A complete catalog source: drugs, interaction edges and dosing rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CatalogSource {
    #[serde(default)]
    pub drugs: Vec<DrugRecord>,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
    #[serde(default)]
    pub dosage_rules: Vec<DosageRuleRecord>,
}

impl CatalogSource {
    /// Parse a JSON catalog document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// SHA-256 (hex) of the serialized source.
    ///
    /// Record order matters; two sources differing only in order have
    /// different fingerprints.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let serialized = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// A drug record as supplied by a catalog source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DrugRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "class")]
    pub therapeutic_class: Option<String>,
    #[serde(default)]
    pub sub_class: Option<String>,
    #[serde(default, alias = "aliases")]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub allergy_tags: Vec<String>,
    #[serde(default)]
    pub contraindications: Vec<ContraindicationRecord>,
    #[serde(default)]
    pub preference: Option<u32>,
}

impl DrugRecord {
    /// Record with the three required fields set.
    pub fn new(id: &str, name: &str, therapeutic_class: &str) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            therapeutic_class: Some(therapeutic_class.into()),
            ..Default::default()
        }
    }
}

/// A contraindication, either a bare tag or a detailed object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContraindicationRecord {
    Tag(String),
    Detailed {
        tag: String,
        #[serde(default)]
        blocking: bool,
        #[serde(default)]
        note: Option<String>,
    },
}

impl ContraindicationRecord {
    pub fn tag(&self) -> &str {
        match self {
            ContraindicationRecord::Tag(tag) => tag,
            ContraindicationRecord::Detailed { tag, .. } => tag,
        }
    }
}

/// An interaction record; drugs may be named by id or synonym.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InteractionRecord {
    #[serde(alias = "a")]
    pub drug_a: Option<String>,
    #[serde(alias = "b")]
    pub drug_b: Option<String>,
    pub severity: Option<String>,
    #[serde(default)]
    pub mechanism: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl InteractionRecord {
    pub fn new(drug_a: &str, drug_b: &str, severity: &str, mechanism: &str) -> Self {
        Self {
            drug_a: Some(drug_a.into()),
            drug_b: Some(drug_b.into()),
            severity: Some(severity.into()),
            mechanism: Some(mechanism.into()),
            source: None,
        }
    }
}

/// A dosing rule record. Absent band ends are open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DosageRuleRecord {
    #[serde(alias = "drug")]
    pub drug_id: Option<String>,
    #[serde(default)]
    pub age_min: Option<f64>,
    #[serde(default)]
    pub age_max: Option<f64>,
    #[serde(default)]
    pub weight_min: Option<f64>,
    #[serde(default)]
    pub weight_max: Option<f64>,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Minimum dose (per kg when `per_kg`); defaults to zero
    #[serde(default)]
    pub min_dose: Option<f64>,
    /// Maximum dose (per kg when `per_kg`)
    pub max_dose: Option<f64>,
    #[serde(default)]
    pub per_kg: bool,
    /// Ceiling applied to weight-based maxima
    #[serde(default)]
    pub absolute_max: Option<f64>,
    pub unit: Option<String>,
    #[serde(default)]
    pub max_daily_frequency: Option<f64>,
}

impl DosageRuleRecord {
    /// Fixed-range rule applying to every patient.
    pub fn fixed(drug_id: &str, min_dose: f64, max_dose: f64, unit: &str) -> Self {
        Self {
            drug_id: Some(drug_id.into()),
            min_dose: Some(min_dose),
            max_dose: Some(max_dose),
            unit: Some(unit.into()),
            ..Default::default()
        }
    }

    /// Weight-based rule applying to every patient.
    pub fn per_kg(drug_id: &str, min_per_kg: f64, max_per_kg: f64, unit: &str) -> Self {
        Self {
            per_kg: true,
            ..Self::fixed(drug_id, min_per_kg, max_per_kg, unit)
        }
    }

    /// Builder-style age band.
    pub fn for_ages(mut self, min: f64, max: f64) -> Self {
        self.age_min = Some(min);
        self.age_max = Some(max);
        self
    }

    /// Builder-style weight band.
    pub fn for_weights(mut self, min: f64, max: f64) -> Self {
        self.weight_min = Some(min);
        self.weight_max = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heterogeneous_records() {
        let json = r#"{
            "drugs": [
                {"id": "ibuprofen", "name": "Ibuprofen", "class": "nsaid",
                 "aliases": ["advil", "brufen"],
                 "contraindications": ["asthma", {"tag": "pregnant", "blocking": true}]}
            ],
            "interactions": [{"a": "ibuprofen", "b": "warfarin", "severity": "major"}],
            "dosage_rules": [{"drug": "ibuprofen", "max_dose": 800, "unit": "mg"}]
        }"#;

        let source = CatalogSource::from_json(json).unwrap();
        let drug = &source.drugs[0];
        assert_eq!(drug.therapeutic_class.as_deref(), Some("nsaid"));
        assert_eq!(drug.synonyms, vec!["advil", "brufen"]);
        assert_eq!(drug.contraindications[0].tag(), "asthma");
        assert!(matches!(
            drug.contraindications[1],
            ContraindicationRecord::Detailed { blocking: true, .. }
        ));
        assert_eq!(source.interactions[0].severity.as_deref(), Some("major"));
        assert_eq!(source.dosage_rules[0].max_dose, Some(800.0));
        assert!(source.dosage_rules[0].min_dose.is_none());
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let source = CatalogSource::from_json(r#"{"drugs": []}"#).unwrap();
        assert!(source.interactions.is_empty());
        assert!(source.dosage_rules.is_empty());
    }
}
