//! Alternative recommender.
//!
//! Exhaustive search over the flagged drug's therapeutic class. Classes are
//! small, so every member is checked against every exclusion rule.

use crate::catalog::CatalogSnapshot;
use crate::models::{
    DrugIdentity, PatientProfile, RankingKey, Recommendation, ResolvedIssue, Severity,
    SubClassMatch,
};

use super::dosage::select_rule;
use super::interaction::count_interactions;
use super::screening::conflicts_with_patient;

/// Substitutes for `flagged_id`, best first; empty when none qualifies.
///
/// A candidate shares the flagged drug's class and is rejected when it:
/// - is the flagged drug or already among `remaining`,
/// - hits a patient allergy or contraindication,
/// - has a MODERATE or SEVERE interaction with any drug in `remaining`,
/// - has no dosage rule matching the patient.
pub fn recommend(
    snapshot: &CatalogSnapshot,
    flagged_id: &str,
    remaining: &[&str],
    patient: &PatientProfile,
    limit: usize,
) -> Vec<Recommendation> {
    let Some(flagged) = snapshot.drug(flagged_id) else {
        return Vec::new();
    };

    let mut ranked: Vec<(RankingKey, &DrugIdentity)> = snapshot
        .class_members(&flagged.therapeutic_class)
        .filter(|candidate| candidate.id != flagged.id && !remaining.contains(&candidate.id.as_str()))
        .filter(|candidate| !conflicts_with_patient(candidate, patient))
        .filter(|candidate| {
            remaining
                .iter()
                .all(|other| snapshot.severity(&candidate.id, other) < Severity::Moderate)
        })
        .filter(|candidate| select_rule(snapshot, &candidate.id, patient).is_ok())
        .map(|candidate| {
            let key = RankingKey {
                remaining_interactions: count_interactions(
                    snapshot,
                    &candidate.id,
                    remaining.iter().copied(),
                ),
                sub_class: SubClassMatch::between(
                    flagged.sub_class.as_deref(),
                    candidate.sub_class.as_deref(),
                ),
                preference: candidate.preference,
                name: candidate.name.clone(),
                id: candidate.id.clone(),
            };
            (key, candidate)
        })
        .collect();

    ranked.sort_by(|a, b| a.0.cmp(&b.0));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, (key, candidate))| {
            let resolves = resolved_issues(snapshot, flagged, candidate, remaining, patient);
            let rationale = rationale(flagged, candidate, &resolves);
            let confidence = 0.9_f64.powi(rank as i32) / (1 + key.remaining_interactions) as f64;
            Recommendation {
                source_drug_id: flagged.id.clone(),
                substitute_id: candidate.id.clone(),
                substitute_name: candidate.name.clone(),
                resolves,
                rationale,
                ranking: key,
                confidence,
            }
        })
        .collect()
}

/// Issues of the flagged drug that the candidate does not share.
fn resolved_issues(
    snapshot: &CatalogSnapshot,
    flagged: &DrugIdentity,
    candidate: &DrugIdentity,
    remaining: &[&str],
    patient: &PatientProfile,
) -> Vec<ResolvedIssue> {
    let mut issues = Vec::new();

    for other in remaining {
        let before = snapshot.severity(&flagged.id, other);
        if before > Severity::None && snapshot.severity(&candidate.id, other) < before {
            issues.push(ResolvedIssue::Interaction {
                with: other.to_string(),
                severity: before,
            });
        }
    }
    for tag in flagged.matching_allergies(&patient.allergies) {
        issues.push(ResolvedIssue::Allergy { tag });
    }
    for c in flagged.matching_contraindications(&patient.contraindications) {
        issues.push(ResolvedIssue::Contraindication { tag: c.tag.clone() });
    }

    issues
}

fn rationale(flagged: &DrugIdentity, candidate: &DrugIdentity, resolves: &[ResolvedIssue]) -> String {
    let mut text = format!(
        "{} is a {} alternative to {}",
        candidate.name, candidate.therapeutic_class, flagged.name
    );
    if !resolves.is_empty() {
        let reasons: Vec<String> = resolves.iter().map(ResolvedIssue::describe).collect();
        text.push_str(" that ");
        text.push_str(&reasons.join(" and "));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, DosageRuleRecord, DrugRecord, InteractionRecord};

    fn nsaid(id: &str, sub_class: Option<&str>, preference: Option<u32>) -> DrugRecord {
        let mut record = DrugRecord::new(id, &capitalize(id), "nsaid");
        record.sub_class = sub_class.map(str::to_string);
        record.preference = preference;
        record.allergy_tags = vec!["nsaid".into()];
        record
    }

    fn capitalize(id: &str) -> String {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn snapshot() -> CatalogSnapshot {
        let mut celecoxib = nsaid("celecoxib", Some("cox-2"), Some(3));
        celecoxib.allergy_tags = vec!["sulfonamide".into()];

        let source = CatalogSource {
            drugs: vec![
                DrugRecord::new("warfarin", "Warfarin", "anticoagulant"),
                nsaid("ibuprofen", Some("propionic"), Some(2)),
                nsaid("naproxen", Some("propionic"), Some(1)),
                nsaid("diclofenac", Some("acetic"), None),
                celecoxib,
                nsaid("ketorolac", Some("acetic"), Some(4)),
            ],
            interactions: vec![
                InteractionRecord::new("warfarin", "ibuprofen", "severe", "bleeding"),
                InteractionRecord::new("warfarin", "diclofenac", "mild", "bleeding"),
                InteractionRecord::new("warfarin", "ketorolac", "severe", "bleeding"),
            ],
            dosage_rules: vec![
                DosageRuleRecord::fixed("ibuprofen", 200.0, 800.0, "mg"),
                DosageRuleRecord::fixed("naproxen", 250.0, 500.0, "mg"),
                DosageRuleRecord::fixed("diclofenac", 25.0, 75.0, "mg"),
                DosageRuleRecord::fixed("celecoxib", 100.0, 200.0, "mg"),
                DosageRuleRecord::fixed("ketorolac", 10.0, 30.0, "mg").for_ages(17.0, 65.0),
            ],
        };
        CatalogSnapshot::load(&source).unwrap()
    }

    #[test]
    fn test_ranking_order() {
        let snapshot = snapshot();
        let recs = recommend(&snapshot, "ibuprofen", &["warfarin"], &PatientProfile::new(40.0), 10);

        let ids: Vec<&str> = recs.iter().map(|r| r.substitute_id.as_str()).collect();
        // ketorolac is excluded by its severe edge with warfarin
        assert_eq!(ids, vec!["naproxen", "celecoxib", "diclofenac"]);
        assert_eq!(recs[2].ranking.remaining_interactions, 1);
        assert!(recs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(
            recs[0].resolves,
            vec![ResolvedIssue::Interaction {
                with: "warfarin".into(),
                severity: Severity::Severe
            }]
        );
        assert!(recs[0].rationale.contains("Naproxen"));
    }

    #[test]
    fn test_excludes_allergy_and_missing_rule() {
        let snapshot = snapshot();
        let patient = PatientProfile::new(70.0).with_allergy("sulfonamide");
        let recs = recommend(&snapshot, "ibuprofen", &["warfarin"], &patient, 10);

        let ids: Vec<&str> = recs.iter().map(|r| r.substitute_id.as_str()).collect();
        assert_eq!(ids, vec!["naproxen", "diclofenac"]);
    }

    #[test]
    fn test_empty_when_every_substitute_is_allergenic() {
        let snapshot = snapshot();
        let patient = PatientProfile::new(40.0)
            .with_allergy("nsaid")
            .with_allergy("sulfonamide");

        assert!(recommend(&snapshot, "ibuprofen", &[], &patient, 10).is_empty());
    }

    #[test]
    fn test_excludes_drugs_already_prescribed_and_truncates() {
        let snapshot = snapshot();
        let recs = recommend(
            &snapshot,
            "ibuprofen",
            &["naproxen"],
            &PatientProfile::new(40.0),
            1,
        );
        assert_eq!(recs.len(), 1);
        assert_ne!(recs[0].substitute_id, "naproxen");
    }

    #[test]
    fn test_unknown_flagged_drug() {
        let snapshot = snapshot();
        assert!(recommend(&snapshot, "unobtainium", &[], &PatientProfile::new(40.0), 5).is_empty());
    }
}
