//! End-to-end scenarios for the decision engine.

use rx_safety_core::catalog::{CatalogSource, DosageRuleRecord, DrugRecord, InteractionRecord};
use rx_safety_core::engine::{recommend, DosageEngine, DosageError};
use rx_safety_core::models::{DataGap, DoseDirection, FindingKind};
use rx_safety_core::{
    analyze_prescription, CatalogSnapshot, Dose, EngineConfig, Finding, PatientProfile,
    PrescriptionEntry, Priority, Severity,
};

fn catalog() -> CatalogSnapshot {
    let mut amoxicillin = DrugRecord::new("amoxicillin", "Amoxicillin", "antibiotic");
    amoxicillin.allergy_tags = vec!["penicillin".into()];
    let mut ampicillin = DrugRecord::new("ampicillin", "Ampicillin", "antibiotic");
    ampicillin.allergy_tags = vec!["penicillin".into()];
    let mut penicillin_v = DrugRecord::new("penicillin-v", "Penicillin V", "antibiotic");
    penicillin_v.allergy_tags = vec!["penicillin".into()];

    let source = CatalogSource {
        drugs: vec![
            DrugRecord::new("warfarin", "Warfarin", "anticoagulant"),
            DrugRecord::new("aspirin", "Aspirin", "antiplatelet"),
            DrugRecord::new("paracetamol", "Paracetamol", "analgesic"),
            DrugRecord::new("drug-y", "Drug Y", "analgesic"),
            amoxicillin,
            ampicillin,
            penicillin_v,
        ],
        interactions: vec![InteractionRecord::new("warfarin", "aspirin", "severe", "additive bleeding risk")],
        dosage_rules: vec![
            DosageRuleRecord::fixed("warfarin", 1.0, 10.0, "mg"),
            DosageRuleRecord::fixed("aspirin", 75.0, 325.0, "mg"),
            DosageRuleRecord::per_kg("paracetamol", 0.0, 10.0, "mg").for_ages(0.0, 12.0),
            DosageRuleRecord::fixed("drug-y", 10.0, 20.0, "mg").for_ages(0.0, 18.0),
            DosageRuleRecord::fixed("drug-y", 10.0, 40.0, "mg").for_ages(18.0, 120.0),
            DosageRuleRecord::fixed("amoxicillin", 250.0, 1000.0, "mg"),
            DosageRuleRecord::fixed("ampicillin", 250.0, 1000.0, "mg"),
            DosageRuleRecord::fixed("penicillin-v", 250.0, 500.0, "mg"),
        ],
    };
    CatalogSnapshot::load(&source).unwrap()
}

#[test]
fn test_severe_interaction_ranked_first() {
    let snapshot = catalog();
    let entries = vec![
        PrescriptionEntry::new("Warfarin", 5.0, "mg").with_frequency("once daily"),
        PrescriptionEntry::new("Aspirin", 75.0, "mg").with_frequency("od"),
    ];

    let result = analyze_prescription(
        &entries,
        &PatientProfile::new(67.0).with_weight(72.0),
        &snapshot,
        &EngineConfig::default(),
    )
    .unwrap();

    let interactions: Vec<&Finding> = result
        .findings
        .iter()
        .map(|f| &f.finding)
        .filter(|f| f.kind() == FindingKind::Interaction)
        .collect();
    assert_eq!(interactions.len(), 1);

    let first = result.findings.first().unwrap();
    assert_eq!(first.priority, Priority::Blocking);
    match &first.finding {
        Finding::Interaction(f) => {
            assert_eq!(f.severity, Severity::Severe);
            assert_eq!(f.pair.first(), "aspirin");
            assert_eq!(f.pair.second(), "warfarin");
        }
        other => panic!("expected interaction first, got {:?}", other),
    }
}

#[test]
fn test_weight_based_overdose() {
    let snapshot = catalog();
    let engine = DosageEngine::default();
    let child = PatientProfile::new(5.0).with_weight(18.0);

    let finding = engine
        .evaluate(&snapshot, "paracetamol", &child, &Dose::new(250.0, "mg"))
        .unwrap()
        .unwrap();

    assert_eq!(finding.direction, DoseDirection::Over);
    assert_eq!(finding.safe_range.max, 180.0);
    assert_eq!(finding.prescribed, 250.0);
}

#[test]
fn test_no_matching_rule_is_insufficient_data() {
    let snapshot = catalog();
    let engine = DosageEngine::default();
    let patient = PatientProfile::new(200.0);

    let err = engine
        .evaluate(&snapshot, "drug-y", &patient, &Dose::new(15.0, "mg"))
        .unwrap_err();
    assert!(matches!(err, DosageError::RuleNotFound { .. }));

    let result = analyze_prescription(
        &[PrescriptionEntry::new("drug-y", 15.0, "mg")],
        &patient,
        &snapshot,
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(result.findings.len(), 1);
    match &result.findings.first().unwrap().finding {
        Finding::InsufficientData(f) => {
            assert_eq!(f.gap, DataGap::NoDosageRule);
            assert!(f.explanation.starts_with("insufficient data"));
        }
        other => panic!("expected insufficient data, got {:?}", other),
    }
}

#[test]
fn test_no_substitute_when_all_share_allergy() {
    let snapshot = catalog();
    let patient = PatientProfile::new(30.0).with_allergy("penicillin");

    let recs = recommend(&snapshot, "amoxicillin", &[], &patient, 5);
    assert!(recs.is_empty());

    let result = analyze_prescription(
        &[PrescriptionEntry::new("amoxicillin", 500.0, "mg")],
        &patient,
        &snapshot,
        &EngineConfig::default(),
    )
    .unwrap();

    assert!(result.findings.has_blocking());
    assert_eq!(result.recommendations.get("amoxicillin"), Some(&Vec::new()));
}

#[test]
fn test_mixed_request_keeps_every_finding() {
    let snapshot = catalog();
    let entries = vec![
        PrescriptionEntry::new("warfarin", 15.0, "mg"),
        PrescriptionEntry::new("aspirin", 100.0, "mg"),
        PrescriptionEntry::new("mystery pill", 1.0, "tab"),
        PrescriptionEntry::new("amoxicillin", 500.0, "mg"),
    ];
    let patient = PatientProfile::new(45.0).with_allergy("penicillin");

    let result = analyze_prescription(&entries, &patient, &snapshot, &EngineConfig::default()).unwrap();

    let kinds: Vec<(Priority, FindingKind)> = result
        .findings
        .iter()
        .map(|f| (f.priority, f.finding.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (Priority::Blocking, FindingKind::Interaction),
            (Priority::Blocking, FindingKind::Allergy),
            (Priority::High, FindingKind::Dosage),
            (Priority::DataQuality, FindingKind::UnknownDrug),
        ]
    );
}
