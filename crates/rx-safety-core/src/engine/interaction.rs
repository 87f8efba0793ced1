//! Interaction resolver.
//!
//! Pairwise only: a set of k drugs is checked as its k(k-1)/2 unordered pairs.
//! Synergy between three or more drugs is not modelled beyond that
//! composition.

use std::collections::BTreeSet;

use crate::catalog::CatalogSnapshot;
use crate::models::{InteractionFinding, Severity};

/// Find every interaction among `drug_ids`.
///
/// Duplicate ids are collapsed. Output is sorted by severity (most severe
/// first), then by pair.
pub fn resolve<'a, I>(snapshot: &CatalogSnapshot, drug_ids: I) -> Vec<InteractionFinding>
where
    I: IntoIterator<Item = &'a str>,
{
    let ids: Vec<&str> = drug_ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

    let mut findings = Vec::new();
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            if let Some(edge) = snapshot.interaction(a, b) {
                if edge.severity > Severity::None {
                    findings.push(InteractionFinding::from_edge(edge));
                }
            }
        }
    }

    findings.sort_by(|x, y| y.severity.cmp(&x.severity).then_with(|| x.pair.cmp(&y.pair)));
    findings
}

/// Number of interactions above `NONE` between `drug_id` and `others`.
pub fn count_interactions<'a, I>(snapshot: &CatalogSnapshot, drug_id: &str, others: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    others
        .into_iter()
        .filter(|other| *other != drug_id)
        .filter(|other| snapshot.severity(drug_id, other) > Severity::None)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, DrugRecord, InteractionRecord};
    use crate::models::DrugPair;

    fn snapshot() -> CatalogSnapshot {
        let source = CatalogSource {
            drugs: vec![
                DrugRecord::new("warfarin", "Warfarin", "anticoagulant"),
                DrugRecord::new("aspirin", "Aspirin", "nsaid"),
                DrugRecord::new("omeprazole", "Omeprazole", "ppi"),
                DrugRecord::new("clopidogrel", "Clopidogrel", "antiplatelet"),
                DrugRecord::new("paracetamol", "Paracetamol", "analgesic"),
            ],
            interactions: vec![
                InteractionRecord::new("warfarin", "aspirin", "severe", "bleeding"),
                InteractionRecord::new("omeprazole", "clopidogrel", "moderate", "CYP2C19 inhibition"),
                InteractionRecord::new("aspirin", "clopidogrel", "mild", "additive antiplatelet"),
                InteractionRecord::new("paracetamol", "omeprazole", "none", "no effect"),
            ],
            dosage_rules: vec![],
        };
        CatalogSnapshot::load(&source).unwrap()
    }

    #[test]
    fn test_resolve_pair() {
        let snapshot = snapshot();
        let findings = resolve(&snapshot, ["warfarin", "aspirin"]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Severe);
        assert_eq!(findings[0].pair, DrugPair::new("aspirin", "warfarin"));
    }

    #[test]
    fn test_resolve_orders_by_severity_then_pair() {
        let snapshot = snapshot();
        let findings = resolve(
            &snapshot,
            ["clopidogrel", "omeprazole", "aspirin", "warfarin", "paracetamol"],
        );

        let severities: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::Severe, Severity::Moderate, Severity::Mild]);
    }

    #[test]
    fn test_none_severity_not_reported() {
        let snapshot = snapshot();
        assert!(resolve(&snapshot, ["paracetamol", "omeprazole"]).is_empty());
    }

    #[test]
    fn test_duplicates_collapsed() {
        let snapshot = snapshot();
        let findings = resolve(&snapshot, ["warfarin", "aspirin", "warfarin"]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_count_interactions() {
        let snapshot = snapshot();
        assert_eq!(
            count_interactions(&snapshot, "aspirin", ["warfarin", "clopidogrel", "paracetamol"]),
            2
        );
        assert_eq!(count_interactions(&snapshot, "paracetamol", ["omeprazole"]), 0);
    }
}
