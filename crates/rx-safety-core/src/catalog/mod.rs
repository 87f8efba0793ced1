//! Drug catalog: raw source records, validated snapshots, providers and the
//! hot-swappable store.

mod provider;
mod records;
mod snapshot;
mod store;

pub use provider::*;
pub use records::*;
pub use snapshot::*;
pub use store::*;

use thiserror::Error;

use crate::db::DbError;
use crate::models::{DrugPair, Severity};

/// Catalog load and validation errors.
///
/// A failed load never replaces the active snapshot.
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("{record}: missing required field '{field}'")]
    MissingField { record: String, field: &'static str },

    #[error("drug '{id}' listed with conflicting classes '{first}' and '{second}'")]
    ConflictingClass {
        id: String,
        first: String,
        second: String,
    },

    #[error("interaction {pair} listed with conflicting severities {first} and {second}")]
    ConflictingInteraction {
        pair: DrugPair,
        first: Severity,
        second: Severity,
    },

    #[error("name '{name}' claimed by both '{first}' and '{second}'")]
    ConflictingSynonym {
        name: String,
        first: String,
        second: String,
    },

    #[error("{record}: unknown drug '{id}'")]
    UnknownDrugReference { record: String, id: String },

    #[error("interaction of drug '{id}' with itself")]
    SelfInteraction { id: String },

    #[error("{record}: invalid severity '{value}'")]
    InvalidSeverity { record: String, value: String },

    #[error("invalid dosage rule for '{drug_id}': {reason}")]
    InvalidDosageRule { drug_id: String, reason: String },

    #[error("two dosage rules for '{drug_id}' share the same patient predicate")]
    AmbiguousDosageRule { drug_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("provider '{provider}' timed out after {timeout_ms} ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("provider '{provider}' unavailable: {reason}")]
    Unavailable { provider: String, reason: String },
}

pub type CatalogResult<T> = Result<T, CatalogLoadError>;
