//! Substitute recommendations.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::Severity;

/// The issue a substitute resolves for its source drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ResolvedIssue {
    Interaction { with: String, severity: Severity },
    Allergy { tag: String },
    Contraindication { tag: String },
}

impl ResolvedIssue {
    pub fn describe(&self) -> String {
        match self {
            ResolvedIssue::Interaction { with, severity } => {
                format!("avoids the {} interaction with {}", severity, with)
            }
            ResolvedIssue::Allergy { tag } => format!("is not in the '{}' allergy group", tag),
            ResolvedIssue::Contraindication { tag } => format!("is not contraindicated for '{}'", tag),
        }
    }
}

/// How close a substitute's sub-class is to the flagged drug's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubClassMatch {
    Same,
    Unspecified,
    Different,
}

impl SubClassMatch {
    pub fn between(flagged: Option<&str>, candidate: Option<&str>) -> Self {
        match (flagged, candidate) {
            (Some(a), Some(b)) if a == b => SubClassMatch::Same,
            (Some(_), Some(_)) => SubClassMatch::Different,
            _ => SubClassMatch::Unspecified,
        }
    }
}

/// Ranking key of a substitute; `Ordering::Less` means better.
///
/// Criteria in order: fewer remaining interactions, closer sub-class, catalog
/// preference (missing last), display name, id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankingKey {
    pub remaining_interactions: usize,
    pub sub_class: SubClassMatch,
    pub preference: Option<u32>,
    pub name: String,
    pub id: String,
}

impl Ord for RankingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.remaining_interactions
            .cmp(&other.remaining_interactions)
            .then_with(|| self.sub_class.cmp(&other.sub_class))
            .then_with(|| {
                self.preference
                    .unwrap_or(u32::MAX)
                    .cmp(&other.preference.unwrap_or(u32::MAX))
            })
            .then_with(|| self.name.to_lowercase().cmp(&other.name.to_lowercase()))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for RankingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A safe substitute for a flagged drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub source_drug_id: String,
    pub substitute_id: String,
    pub substitute_name: String,
    pub resolves: Vec<ResolvedIssue>,
    pub rationale: String,
    pub ranking: RankingKey,
    /// Display score in [0, 1], non-increasing along the returned list
    pub confidence: f64,
}
