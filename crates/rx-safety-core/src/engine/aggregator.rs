//! Safety aggregator: merges sub-resolver output into one ranked list.

use serde::{Deserialize, Serialize};

use crate::models::{
    AllergyFinding, ContraindicationFinding, Finding, InteractionFinding, Priority, RankedFinding,
};

/// Findings of one request, most urgent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RankedFindingList {
    items: Vec<RankedFinding>,
}

impl RankedFindingList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedFinding> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&RankedFinding> {
        self.items.first()
    }

    pub fn has_blocking(&self) -> bool {
        self.items.iter().any(|f| f.priority == Priority::Blocking)
    }
}

impl<'a> IntoIterator for &'a RankedFindingList {
    type Item = &'a RankedFinding;
    type IntoIter = std::slice::Iter<'a, RankedFinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Merge and rank.
///
/// Inputs are concatenated in argument order and stably sorted by tier, so
/// equal-tier findings keep the order their resolver produced them in. Every
/// input finding appears exactly once in the output. `dosage` carries dosage
/// and frequency findings; `gaps` carries insufficient-data and unknown-drug
/// findings.
pub fn aggregate(
    interactions: Vec<InteractionFinding>,
    dosage: Vec<Finding>,
    contraindications: Vec<ContraindicationFinding>,
    allergies: Vec<AllergyFinding>,
    gaps: Vec<Finding>,
) -> RankedFindingList {
    let mut items: Vec<RankedFinding> = interactions
        .into_iter()
        .map(Finding::Interaction)
        .chain(dosage)
        .chain(contraindications.into_iter().map(Finding::Contraindication))
        .chain(allergies.into_iter().map(Finding::Allergy))
        .chain(gaps)
        .map(|finding| RankedFinding {
            priority: finding.priority(),
            finding,
        })
        .collect();

    items.sort_by_key(|f| f.priority);
    RankedFindingList { items }
}
