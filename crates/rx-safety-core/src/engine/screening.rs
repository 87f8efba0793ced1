//! Allergy and contraindication screening.

use crate::models::{AllergyFinding, ContraindicationFinding, DrugIdentity, PatientProfile};

/// Allergy findings for one drug, one per matching patient tag.
pub fn screen_allergies(drug: &DrugIdentity, patient: &PatientProfile) -> Vec<AllergyFinding> {
    drug.matching_allergies(&patient.allergies)
        .iter()
        .map(|tag| AllergyFinding::new(&drug.id, tag))
        .collect()
}

/// Contraindication findings for one drug, in catalog order.
pub fn screen_contraindications(
    drug: &DrugIdentity,
    patient: &PatientProfile,
) -> Vec<ContraindicationFinding> {
    drug.matching_contraindications(&patient.contraindications)
        .into_iter()
        .map(|c| ContraindicationFinding::new(&drug.id, &c.tag, c.blocking, c.note.as_deref()))
        .collect()
}

/// Whether the patient is allergic to, or contraindicated for, `drug`.
pub fn conflicts_with_patient(drug: &DrugIdentity, patient: &PatientProfile) -> bool {
    !drug.matching_allergies(&patient.allergies).is_empty()
        || !drug.matching_contraindications(&patient.contraindications).is_empty()
}
