//! Decision engine.
//!
//! Pipeline per request: resolve names → interactions and dosage (independent)
//! → screening → aggregation → substitution search. Every stage reads one
//! snapshot handle and writes only request-local data, so a request can be
//! dropped between any two stages.

mod aggregator;
mod dosage;
mod interaction;
mod recommender;
mod screening;

pub use aggregator::*;
pub use dosage::*;
pub use interaction::*;
pub use recommender::*;
pub use screening::*;

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CatalogSnapshot;
use crate::config::EngineConfig;
use crate::models::{
    Finding, InsufficientDataFinding, PatientProfile, PrescriptionEntry, Recommendation, Severity,
    UnknownDrugFinding,
};
use crate::normalizer::Normalizer;

/// Errors that abort a single analysis request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid patient data: {0}")]
    InvalidPatientData(String),

    #[error("Invalid entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

pub type EngineResult<T> = Result<T, AnalysisError>;

/// Complete output of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub analyzed_at: String,
    pub snapshot_version: u64,
    pub snapshot_fingerprint: String,
    pub findings: RankedFindingList,
    /// Substitutes per flagged drug id; an empty list means none qualified
    pub recommendations: BTreeMap<String, Vec<Recommendation>>,
}

impl AnalysisResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A request entry resolved against the catalog.
struct ResolvedEntry<'a> {
    entry: &'a PrescriptionEntry,
    drug_id: String,
}

/// Coordinates the engine stages for one configuration.
pub struct SafetyEngine {
    dosage: DosageEngine,
    config: EngineConfig,
}

impl SafetyEngine {
    /// Create a new engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            dosage: DosageEngine::new(Normalizer::new()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze one prescription against `snapshot`.
    pub fn analyze(
        &self,
        entries: &[PrescriptionEntry],
        patient: &PatientProfile,
        snapshot: &CatalogSnapshot,
    ) -> EngineResult<AnalysisResult> {
        let started = Instant::now();

        patient.validate().map_err(AnalysisError::InvalidPatientData)?;
        let patient = patient.canonical();
        validate_entries(entries)?;

        // Resolve names; unknown drugs are reported and skipped.
        let mut resolved = Vec::with_capacity(entries.len());
        let mut gaps: Vec<Finding> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match snapshot.lookup(&entry.drug_id) {
                Some(drug) => resolved.push(ResolvedEntry {
                    entry,
                    drug_id: drug.id.clone(),
                }),
                None => {
                    tracing::debug!(index, requested = %entry.drug_id, "Unknown drug in request");
                    gaps.push(Finding::UnknownDrug(UnknownDrugFinding::new(index, &entry.drug_id)));
                }
            }
        }

        let mut known_ids: Vec<&str> = Vec::new();
        for r in &resolved {
            if !known_ids.contains(&r.drug_id.as_str()) {
                known_ids.push(&r.drug_id);
            }
        }

        let interactions = resolve(snapshot, known_ids.iter().copied());

        let mut dosage_findings: Vec<Finding> = Vec::new();
        for r in &resolved {
            self.check_dosage(snapshot, r, &patient, &mut dosage_findings, &mut gaps)?;
        }

        let mut contraindications = Vec::new();
        let mut allergies = Vec::new();
        for id in &known_ids {
            if let Some(drug) = snapshot.drug(id) {
                contraindications.extend(screen_contraindications(drug, &patient));
                allergies.extend(screen_allergies(drug, &patient));
            }
        }

        // Drugs that need a substitute, in request order.
        let mut flagged: HashSet<&str> = HashSet::new();
        for f in &interactions {
            if f.severity >= self.config.substitution_severity && f.severity > Severity::None {
                flagged.insert(f.pair.first());
                flagged.insert(f.pair.second());
            }
        }
        for f in &allergies {
            flagged.insert(f.drug_id.as_str());
        }
        for f in &contraindications {
            flagged.insert(f.drug_id.as_str());
        }

        let mut recommendations = BTreeMap::new();
        for id in known_ids.iter().copied().filter(|id| flagged.contains(id)) {
            let remaining: Vec<&str> = known_ids.iter().copied().filter(|other| *other != id).collect();
            let recs = recommend(
                snapshot,
                id,
                &remaining,
                &patient,
                self.config.max_recommendations_per_drug,
            );
            recommendations.insert(id.to_string(), recs);
        }

        let findings = aggregate(interactions, dosage_findings, contraindications, allergies, gaps);

        tracing::info!(
            snapshot_version = snapshot.version(),
            entries = entries.len(),
            findings = findings.len(),
            blocking = findings.has_blocking(),
            flagged = recommendations.len(),
            recommendations = recommendations.values().map(Vec::len).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prescription analyzed"
        );

        Ok(AnalysisResult {
            analysis_id: Uuid::new_v4().to_string(),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
            snapshot_version: snapshot.version(),
            snapshot_fingerprint: snapshot.fingerprint().to_string(),
            findings,
            recommendations,
        })
    }

    /// Dose and frequency checks for one entry.
    ///
    /// Missing rules and unit mismatches become data-gap findings; invalid
    /// patient data aborts the request.
    fn check_dosage(
        &self,
        snapshot: &CatalogSnapshot,
        resolved: &ResolvedEntry<'_>,
        patient: &PatientProfile,
        findings: &mut Vec<Finding>,
        gaps: &mut Vec<Finding>,
    ) -> EngineResult<()> {
        let drug_id = resolved.drug_id.as_str();
        let entry = resolved.entry;

        let outcome = select_rule(snapshot, drug_id, patient).and_then(|rule| {
            let finding = self.dosage.evaluate_rule(rule, patient, &entry.dose)?;
            Ok((rule, finding))
        });

        match outcome {
            Ok((rule, finding)) => {
                findings.extend(finding.map(Finding::Dosage));
                match self.dosage.check_frequency(rule, entry.frequency.as_deref()) {
                    Some(f @ Finding::InsufficientData(_)) => gaps.push(f),
                    Some(f) => findings.push(f),
                    None => {}
                }
                Ok(())
            }
            Err(DosageError::InvalidPatientData { drug_id, reason }) => Err(
                AnalysisError::InvalidPatientData(format!("{}: {}", drug_id, reason)),
            ),
            Err(e) => {
                tracing::debug!(drug_id, error = %e, "Dosage not evaluated");
                if let Some(gap) = e.data_gap() {
                    gaps.push(Finding::InsufficientData(InsufficientDataFinding::new(drug_id, gap)));
                }
                Ok(())
            }
        }
    }
}

fn validate_entries(entries: &[PrescriptionEntry]) -> EngineResult<()> {
    for (index, entry) in entries.iter().enumerate() {
        if entry.drug_id.trim().is_empty() {
            return Err(AnalysisError::InvalidEntry {
                index,
                reason: "drug name is empty".to_string(),
            });
        }
        if !entry.dose.amount.is_finite() || entry.dose.amount <= 0.0 {
            return Err(AnalysisError::InvalidEntry {
                index,
                reason: format!("dose must be a positive number, got {}", entry.dose.amount),
            });
        }
    }
    Ok(())
}

/// Analyze a prescription with a one-off engine.
pub fn analyze_prescription(
    entries: &[PrescriptionEntry],
    patient: &PatientProfile,
    snapshot: &CatalogSnapshot,
    config: &EngineConfig,
) -> EngineResult<AnalysisResult> {
    SafetyEngine::new(config.clone()).analyze(entries, patient, snapshot)
}
