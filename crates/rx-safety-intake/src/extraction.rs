//! Extractor output parsing and catalog mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rx_safety_core::models::{Dose, PrescriptionEntry};
use rx_safety_core::{CatalogSnapshot, Normalizer};

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid extractor output: {0}")]
    InvalidFormat(String),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Structured output of the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractorOutput {
    #[serde(alias = "drugs", alias = "mentions")]
    pub entries: Vec<ExtractedDrug>,
}

/// One drug mention as extracted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedDrug {
    #[serde(alias = "drug_name")]
    pub name: String,
    #[serde(default)]
    pub dose: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Combined strength such as "500 mg", used when dose/unit are absent
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
}

impl ExtractedDrug {
    /// Dose and unit, falling back to the strength text.
    pub fn dose(&self) -> Option<(f64, String)> {
        match (self.dose, self.unit.as_deref()) {
            (Some(amount), Some(unit)) if !unit.trim().is_empty() => {
                Some((amount, unit.trim().to_string()))
            }
            _ => self.strength.as_deref().and_then(split_strength),
        }
    }
}

/// Parse extractor output, tolerating prose around the JSON object.
pub fn parse_extractor_output(text: &str) -> ExtractionResult<ExtractorOutput> {
    let start = text
        .find('{')
        .ok_or_else(|| ExtractionError::InvalidFormat("No JSON object found in output".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| ExtractionError::InvalidFormat("No closing brace found in output".into()))?;
    if end < start {
        return Err(ExtractionError::InvalidFormat("Unbalanced braces in output".into()));
    }

    let output: ExtractorOutput = serde_json::from_str(&text[start..=end])?;
    Ok(output)
}

/// A mention that could not become a prescription entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnmatchedMention {
    pub mention: ExtractedDrug,
    pub reason: String,
}

/// A name resolved by fuzzy matching; worth showing to a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FuzzyMatch {
    pub requested: String,
    pub drug_id: String,
    pub matched_name: String,
    pub similarity: f64,
}

/// Result of mapping extractor output onto the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeBatch {
    pub entries: Vec<PrescriptionEntry>,
    pub unmatched: Vec<UnmatchedMention>,
    pub fuzzy_matches: Vec<FuzzyMatch>,
}

/// Map extracted mentions to prescription entries keyed by catalog id.
///
/// Names are looked up exactly first, then fuzzily at `threshold`. Doses are
/// expressed in canonical units and routes in their standard abbreviation.
/// Mentions without a readable dose or without a catalog match are returned
/// in `unmatched`.
pub fn to_prescription_entries(
    output: &ExtractorOutput,
    snapshot: &CatalogSnapshot,
    normalizer: &Normalizer,
    threshold: f64,
) -> IntakeBatch {
    let mut batch = IntakeBatch::default();

    for mention in &output.entries {
        let Some((amount, unit)) = mention.dose() else {
            batch.unmatched.push(UnmatchedMention {
                mention: mention.clone(),
                reason: "missing dose".to_string(),
            });
            continue;
        };

        let Some(hit) = snapshot.lookup_fuzzy(&mention.name, threshold) else {
            tracing::debug!(name = %mention.name, "Extracted drug not in catalog");
            batch.unmatched.push(UnmatchedMention {
                mention: mention.clone(),
                reason: "not in catalog".to_string(),
            });
            continue;
        };

        if hit.similarity < 1.0 {
            batch.fuzzy_matches.push(FuzzyMatch {
                requested: mention.name.clone(),
                drug_id: hit.drug.id.clone(),
                matched_name: hit.matched_name.to_string(),
                similarity: hit.similarity,
            });
        }

        let normalized = normalizer.normalize(&PrescriptionEntry {
            drug_id: hit.drug.id.clone(),
            dose: Dose::new(amount, &unit),
            frequency: mention.frequency.clone(),
            route: mention.route.clone(),
        });
        if normalized.frequency_text.is_some() && normalized.doses_per_day.is_none() {
            tracing::debug!(name = %mention.name, "Extracted frequency not readable");
        }

        batch.entries.push(PrescriptionEntry {
            drug_id: hit.drug.id.clone(),
            dose: Dose::new(normalized.amount, &normalized.unit),
            frequency: normalized.frequency_text,
            route: normalized.route,
        });
    }

    tracing::info!(
        entries = batch.entries.len(),
        unmatched = batch.unmatched.len(),
        fuzzy = batch.fuzzy_matches.len(),
        "Extractor output mapped"
    );

    batch
}

/// Split "500mg" or "0.5 mL" into amount and unit.
fn split_strength(text: &str) -> Option<(f64, String)> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)?;

    let amount: f64 = text[..split].parse().ok()?;
    let unit = text[split..].trim();
    if unit.is_empty() || !amount.is_finite() {
        return None;
    }
    Some((amount, unit.to_string()))
}
