//! Rx-Safety Core Library
//!
//! Deterministic drug interaction, dosage and substitution decision engine.
//!
//! # Architecture
//!
//! ```text
//! Catalog source (JSON / SQLite / static)
//!          │
//!          ▼
//!   CatalogSnapshot::load ──► CatalogStore (atomic swap on reload)
//!          │
//!          ▼  Arc<CatalogSnapshot> per request
//!   ┌──────┴───────────────┐
//!   ▼                      ▼
//! Interaction         Dosage engine
//! resolver            (+ frequency cap)
//!   │                      │
//!   └──────┬───────────────┘
//!          ▼
//!   Allergy / contraindication screening
//!          ▼
//!   Safety aggregator (ranked findings)
//!          ▼
//!   Alternative recommender
//!          ▼
//!    AnalysisResult
//! ```
//!
//! The engine never diagnoses and never replaces clinical judgment; it is a
//! decision procedure over whatever catalog data it is given.
//!
//! # Modules
//!
//! - [`catalog`]: Source records, validated snapshots, providers, hot-swap store
//! - [`db`]: SQLite catalog storage
//! - [`engine`]: Interaction, dosage, screening, aggregation, recommendation
//! - [`models`]: Domain types (DrugIdentity, Finding, Recommendation, etc.)
//! - [`normalizer`]: Unit, frequency and route normalization
//! - [`config`]: Engine configuration

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod normalizer;

// Re-export commonly used types
pub use catalog::{CatalogLoadError, CatalogProvider, CatalogSnapshot, CatalogSource, CatalogStore};
pub use config::EngineConfig;
pub use db::Database;
pub use engine::{analyze_prescription, AnalysisError, AnalysisResult, RankedFindingList, SafetyEngine};
pub use models::{
    Dose, DrugIdentity, Finding, PatientProfile, PrescriptionEntry, PrescriptionRequest, Priority,
    Recommendation, Severity,
};
pub use normalizer::Normalizer;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use catalog::{JsonFileProvider, SqliteProvider};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RxSafetyError {
    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<CatalogLoadError> for RxSafetyError {
    fn from(e: CatalogLoadError) -> Self {
        RxSafetyError::CatalogError(e.to_string())
    }
}

impl From<db::DbError> for RxSafetyError {
    fn from(e: db::DbError) -> Self {
        RxSafetyError::DatabaseError(e.to_string())
    }
}

impl From<AnalysisError> for RxSafetyError {
    fn from(e: AnalysisError) -> Self {
        RxSafetyError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for RxSafetyError {
    fn from(e: serde_json::Error) -> Self {
        RxSafetyError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for RxSafetyError {
    fn from(e: config::ConfigError) -> Self {
        RxSafetyError::ConfigError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

fn parse_config(config_json: Option<String>) -> Result<EngineConfig, RxSafetyError> {
    match config_json {
        Some(json) => Ok(EngineConfig::from_json_str(&json)?),
        None => Ok(EngineConfig::default()),
    }
}

fn open_with(
    provider: Arc<dyn CatalogProvider>,
    config: EngineConfig,
) -> Result<Arc<RxSafetyCore>, RxSafetyError> {
    let source = catalog::fetch_with_timeout(provider, config.catalog_fetch_timeout())?;
    let snapshot = CatalogSnapshot::load(&source)?;
    tracing::info!(
        fingerprint = %snapshot.fingerprint(),
        drugs = snapshot.drug_count(),
        edges = snapshot.edge_count(),
        rules = snapshot.rule_count(),
        "Catalog loaded"
    );
    Ok(Arc::new(RxSafetyCore {
        store: CatalogStore::new(snapshot),
        engine: SafetyEngine::new(config),
    }))
}

/// Load a JSON catalog file.
#[uniffi::export]
pub fn open_catalog_json(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<RxSafetyCore>, RxSafetyError> {
    open_with(Arc::new(JsonFileProvider::new(path)), parse_config(config_json)?)
}

/// Load the catalog tables of a SQLite database.
#[uniffi::export]
pub fn open_catalog_sqlite(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<RxSafetyCore>, RxSafetyError> {
    open_with(Arc::new(SqliteProvider::new(path)), parse_config(config_json)?)
}

/// Load a catalog from an in-memory JSON document.
#[uniffi::export]
pub fn open_catalog_str(
    catalog_json: String,
    config_json: Option<String>,
) -> Result<Arc<RxSafetyCore>, RxSafetyError> {
    let config = parse_config(config_json)?;
    let snapshot = CatalogSnapshot::from_json(&catalog_json)?;
    Ok(Arc::new(RxSafetyCore {
        store: CatalogStore::new(snapshot),
        engine: SafetyEngine::new(config),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine handle for FFI.
#[derive(uniffi::Object)]
pub struct RxSafetyCore {
    store: CatalogStore,
    engine: SafetyEngine,
}

impl RxSafetyCore {
    /// The catalog store behind this handle.
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }
}

#[uniffi::export]
impl RxSafetyCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Reload from a JSON catalog file; the current catalog stays on failure.
    pub fn reload_json(&self, path: String) -> Result<FfiCatalogInfo, RxSafetyError> {
        let snapshot = self.store.reload(
            Arc::new(JsonFileProvider::new(path)),
            self.engine.config().catalog_fetch_timeout(),
        )?;
        Ok(FfiCatalogInfo::from(snapshot.as_ref()))
    }

    /// Reload from a SQLite database; the current catalog stays on failure.
    pub fn reload_sqlite(&self, path: String) -> Result<FfiCatalogInfo, RxSafetyError> {
        let snapshot = self.store.reload(
            Arc::new(SqliteProvider::new(path)),
            self.engine.config().catalog_fetch_timeout(),
        )?;
        Ok(FfiCatalogInfo::from(snapshot.as_ref()))
    }

    /// Identity and size of the active catalog.
    pub fn catalog_info(&self) -> FfiCatalogInfo {
        FfiCatalogInfo::from(self.store.snapshot().as_ref())
    }

    /// Look up a drug by id, name or synonym, with fuzzy fallback.
    pub fn lookup_drug(&self, name: String) -> Option<FfiDrug> {
        let snapshot = self.store.snapshot();
        snapshot
            .lookup_fuzzy(&name, self.engine.config().fuzzy_match_threshold)
            .map(|hit| FfiDrug::from(hit.drug))
    }

    // =========================================================================
    // Analysis Operations
    // =========================================================================

    /// Analyze a JSON `{entries, patient}` request; returns the JSON result.
    pub fn analyze_json(&self, request_json: String) -> Result<String, RxSafetyError> {
        let request: PrescriptionRequest = serde_json::from_str(&request_json)?;
        let snapshot = self.store.snapshot();
        let result = self.engine.analyze(&request.entries, &request.patient, &snapshot)?;
        Ok(result.to_json()?)
    }

    /// Analyze a prescription given as FFI records.
    pub fn analyze(
        &self,
        entries: Vec<FfiPrescriptionEntry>,
        patient: FfiPatientProfile,
    ) -> Result<FfiAnalysisSummary, RxSafetyError> {
        let entries: Vec<PrescriptionEntry> = entries.into_iter().map(|e| e.into()).collect();
        let patient: PatientProfile = patient.into();
        let snapshot = self.store.snapshot();
        let result = self.engine.analyze(&entries, &patient, &snapshot)?;
        Ok(result.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe catalog identity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogInfo {
    pub version: u64,
    pub fingerprint: String,
    pub loaded_at: String,
    pub drug_count: u32,
    pub interaction_count: u32,
    pub rule_count: u32,
}

impl From<&CatalogSnapshot> for FfiCatalogInfo {
    fn from(snapshot: &CatalogSnapshot) -> Self {
        Self {
            version: snapshot.version(),
            fingerprint: snapshot.fingerprint().to_string(),
            loaded_at: snapshot.loaded_at().to_string(),
            drug_count: snapshot.drug_count() as u32,
            interaction_count: snapshot.edge_count() as u32,
            rule_count: snapshot.rule_count() as u32,
        }
    }
}

/// FFI-safe drug identity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrug {
    pub id: String,
    pub name: String,
    pub therapeutic_class: String,
    pub sub_class: Option<String>,
    pub synonyms: Vec<String>,
}

impl From<&DrugIdentity> for FfiDrug {
    fn from(drug: &DrugIdentity) -> Self {
        Self {
            id: drug.id.clone(),
            name: drug.name.clone(),
            therapeutic_class: drug.therapeutic_class.clone(),
            sub_class: drug.sub_class.clone(),
            synonyms: drug.synonyms.clone(),
        }
    }
}

/// FFI-safe prescription entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescriptionEntry {
    pub drug: String,
    pub amount: f64,
    pub unit: String,
    pub frequency: Option<String>,
    pub route: Option<String>,
}

impl From<FfiPrescriptionEntry> for PrescriptionEntry {
    fn from(entry: FfiPrescriptionEntry) -> Self {
        PrescriptionEntry {
            drug_id: entry.drug,
            dose: Dose::new(entry.amount, &entry.unit),
            frequency: entry.frequency,
            route: entry.route,
        }
    }
}

/// FFI-safe patient profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientProfile {
    pub age_years: f64,
    pub weight_kg: Option<f64>,
    pub allergies: Vec<String>,
    pub contraindications: Vec<String>,
}

impl From<FfiPatientProfile> for PatientProfile {
    fn from(patient: FfiPatientProfile) -> Self {
        PatientProfile {
            age_years: patient.age_years,
            weight_kg: patient.weight_kg,
            allergies: patient.allergies.into_iter().collect(),
            contraindications: patient.contraindications.into_iter().collect(),
        }
    }
}

/// FFI-safe ranked finding.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFinding {
    pub kind: String,
    pub priority: String,
    pub drug_ids: Vec<String>,
    pub explanation: String,
}

/// FFI-safe recommendation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecommendation {
    pub source_drug_id: String,
    pub substitute_id: String,
    pub substitute_name: String,
    pub rationale: String,
    pub confidence: f64,
}

impl From<Recommendation> for FfiRecommendation {
    fn from(rec: Recommendation) -> Self {
        Self {
            source_drug_id: rec.source_drug_id,
            substitute_id: rec.substitute_id,
            substitute_name: rec.substitute_name,
            rationale: rec.rationale,
            confidence: rec.confidence,
        }
    }
}

/// FFI-safe analysis summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnalysisSummary {
    pub analysis_id: String,
    pub snapshot_version: u64,
    pub has_blocking: bool,
    pub findings: Vec<FfiFinding>,
    pub recommendations: Vec<FfiRecommendation>,
}

impl From<AnalysisResult> for FfiAnalysisSummary {
    fn from(result: AnalysisResult) -> Self {
        let has_blocking = result.findings.has_blocking();
        let findings = result
            .findings
            .iter()
            .map(|ranked| FfiFinding {
                kind: ranked.finding.kind().as_str().to_string(),
                priority: ranked.priority.as_str().to_string(),
                drug_ids: ranked.finding.drug_ids().into_iter().map(String::from).collect(),
                explanation: ranked.finding.explanation().to_string(),
            })
            .collect();
        let recommendations = result
            .recommendations
            .into_values()
            .flatten()
            .map(FfiRecommendation::from)
            .collect();

        Self {
            analysis_id: result.analysis_id,
            snapshot_version: result.snapshot_version,
            has_blocking,
            findings,
            recommendations,
        }
    }
}
