//! Drug identity and interaction models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical identity of a drug in a catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugIdentity {
    /// Canonical id (lower-case)
    pub id: String,
    /// Display name as supplied by the catalog
    pub name: String,
    /// Therapeutic class used for substitution (lower-case)
    pub therapeutic_class: String,
    /// Optional finer grouping inside the class (e.g. "cox-2 selective")
    pub sub_class: Option<String>,
    /// Alternative names (brand names, spellings), lower-case
    pub synonyms: Vec<String>,
    /// Allergy groups this drug belongs to (e.g. "penicillin", "nsaid")
    pub allergy_tags: Vec<String>,
    /// Patient conditions that make this drug inappropriate
    pub contraindications: Vec<Contraindication>,
    /// Catalog preference among substitutes (lower is preferred)
    pub preference: Option<u32>,
}

/// A patient condition that rules a drug out or warrants review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contraindication {
    /// Condition tag (e.g. "pregnant", "renal-impaired")
    pub tag: String,
    /// Blocking contraindications rank with allergies
    pub blocking: bool,
    /// Optional catalog note
    pub note: Option<String>,
}

impl DrugIdentity {
    /// Create an identity with required fields only.
    pub fn new(id: &str, name: &str, therapeutic_class: &str) -> Self {
        Self {
            id: id.trim().to_lowercase(),
            name: name.trim().to_string(),
            therapeutic_class: therapeutic_class.trim().to_lowercase(),
            sub_class: None,
            synonyms: Vec::new(),
            allergy_tags: Vec::new(),
            contraindications: Vec::new(),
            preference: None,
        }
    }

    /// Allergy tags of this drug that appear in `patient_allergies`.
    ///
    /// The drug's own id and synonyms count as tags, so an allergy recorded
    /// against the drug itself, or one of its brand names, is caught too.
    pub fn matching_allergies<'a, I>(&self, patient_allergies: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        patient_allergies
            .into_iter()
            .filter(|tag| {
                *tag == &self.id
                    || self.synonyms.iter().any(|s| s == *tag)
                    || self.allergy_tags.iter().any(|t| t == *tag)
            })
            .cloned()
            .collect()
    }

    /// Contraindications of this drug triggered by the patient's tags.
    pub fn matching_contraindications<'a, I>(&self, patient_tags: I) -> Vec<&Contraindication>
    where
        I: IntoIterator<Item = &'a String> + Clone,
    {
        self.contraindications
            .iter()
            .filter(|c| patient_tags.clone().into_iter().any(|t| t == &c.tag))
            .collect()
    }
}

/// Interaction severity, ordered `None < Mild < Moderate < Severe`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Parse the severity vocabularies used by heterogeneous catalog sources.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" => Some(Severity::None),
            "mild" | "minor" | "low" => Some(Severity::Mild),
            "moderate" | "medium" => Some(Severity::Moderate),
            "severe" | "major" | "high" | "contraindicated" => Some(Severity::Severe),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "NONE",
            Severity::Mild => "MILD",
            Severity::Moderate => "MODERATE",
            Severity::Severe => "SEVERE",
        };
        f.write_str(s)
    }
}

/// Unordered pair of drug ids, stored with the smaller id first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrugPair {
    first: String,
    second: String,
}

impl DrugPair {
    /// Build a pair; argument order does not matter.
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                first: a.to_string(),
                second: b.to_string(),
            }
        } else {
            Self {
                first: b.to_string(),
                second: a.to_string(),
            }
        }
    }

    /// Lexicographically smaller id.
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Lexicographically larger id.
    pub fn second(&self) -> &str {
        &self.second
    }

    /// Whether the pair references `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.first == id || self.second == id
    }

    /// The other member of the pair, if `id` is a member.
    pub fn partner_of(&self, id: &str) -> Option<&str> {
        if self.first == id {
            Some(&self.second)
        } else if self.second == id {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for DrugPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.first, self.second)
    }
}

/// A recorded interaction between two drugs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionEdge {
    pub pair: DrugPair,
    pub severity: Severity,
    /// Mechanism description (e.g. "additive bleeding risk")
    pub mechanism: String,
    /// Source citation
    pub source: Option<String>,
}
