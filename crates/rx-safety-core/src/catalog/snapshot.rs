//! Immutable, indexed catalog snapshot and its loader.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::{
    Band, Contraindication, DoseLimit, DosageRule, DrugIdentity, DrugPair, InteractionEdge,
    PatientPredicate, Severity,
};

use super::records::{CatalogSource, ContraindicationRecord, DosageRuleRecord, DrugRecord, InteractionRecord};
use super::{CatalogLoadError, CatalogResult};

/// Best fuzzy match for a drug name.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyHit<'a> {
    pub drug: &'a DrugIdentity,
    /// Indexed name (id, display name or synonym) that matched
    pub matched_name: &'a str,
    /// Similarity in [0, 1]
    pub similarity: f64,
}

/// Read-only catalog view shared by all in-flight requests.
#[derive(Debug)]
pub struct CatalogSnapshot {
    version: u64,
    fingerprint: String,
    loaded_at: String,
    drugs: HashMap<String, Arc<DrugIdentity>>,
    /// id / lower-cased display name / synonym → id
    names: HashMap<String, String>,
    edges: HashMap<DrugPair, InteractionEdge>,
    /// Rules per drug, most specific first
    rules: HashMap<String, Vec<DosageRule>>,
    /// Class members in catalog preference order
    classes: HashMap<String, Vec<String>>,
}

impl CatalogSnapshot {
    /// Validate and index a catalog source (version 0).
    pub fn load(source: &CatalogSource) -> CatalogResult<Self> {
        Self::load_versioned(source, 0)
    }

    /// Validate and index a catalog source with an explicit version.
    pub fn load_versioned(source: &CatalogSource, version: u64) -> CatalogResult<Self> {
        let fingerprint = source.fingerprint()?;

        let ordered = collect_drugs(&source.drugs)?;
        let names = index_names(&ordered)?;
        let edges = index_edges(&source.interactions, &names)?;
        let rules = index_rules(&source.dosage_rules, &names)?;

        let mut classes: HashMap<String, Vec<String>> = HashMap::new();
        for drug in &ordered {
            classes
                .entry(drug.therapeutic_class.clone())
                .or_default()
                .push(drug.id.clone());
        }

        let drugs: HashMap<String, Arc<DrugIdentity>> = ordered
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();

        for members in classes.values_mut() {
            members.sort_by(|a, b| {
                let (da, db) = (&drugs[a], &drugs[b]);
                da.preference
                    .unwrap_or(u32::MAX)
                    .cmp(&db.preference.unwrap_or(u32::MAX))
                    .then_with(|| da.name.to_lowercase().cmp(&db.name.to_lowercase()))
                    .then_with(|| da.id.cmp(&db.id))
            });
        }

        tracing::debug!(
            version,
            drugs = drugs.len(),
            edges = edges.len(),
            rules = rules.values().map(Vec::len).sum::<usize>(),
            "Catalog snapshot indexed"
        );

        Ok(Self {
            version,
            fingerprint,
            loaded_at: chrono::Utc::now().to_rfc3339(),
            drugs,
            names,
            edges,
            rules,
            classes,
        })
    }

    /// Parse and load a JSON catalog document.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let source = CatalogSource::from_json(json)?;
        Self::load(&source)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// SHA-256 (hex) of the source the snapshot was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> &str {
        &self.loaded_at
    }

    pub fn drug_count(&self) -> usize {
        self.drugs.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// All drug ids, sorted.
    pub fn drug_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.drugs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Look up a drug by canonical id.
    pub fn drug(&self, id: &str) -> Option<&DrugIdentity> {
        self.drugs.get(id).map(Arc::as_ref)
    }

    /// Look up a drug by id, display name or synonym (case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<&DrugIdentity> {
        let key = name.trim().to_lowercase();
        self.names.get(&key).and_then(|id| self.drug(id))
    }

    /// Exact lookup, falling back to the closest indexed name at or above
    /// `threshold`.
    pub fn lookup_fuzzy(&self, name: &str, threshold: f64) -> Option<FuzzyHit<'_>> {
        let key = name.trim().to_lowercase();
        if let Some((matched, id)) = self.names.get_key_value(&key) {
            return self.drug(id).map(|drug| FuzzyHit {
                drug,
                matched_name: matched.as_str(),
                similarity: 1.0,
            });
        }

        self.names
            .iter()
            .map(|(indexed, id)| (indexed, id, fuzzy_match(&key, indexed)))
            .filter(|(_, _, similarity)| *similarity >= threshold)
            .max_by(|a, b| a.2.total_cmp(&b.2).then_with(|| b.0.cmp(a.0)))
            .and_then(|(indexed, id, similarity)| {
                self.drug(id).map(|drug| FuzzyHit {
                    drug,
                    matched_name: indexed.as_str(),
                    similarity,
                })
            })
    }

    /// Interaction edge for an unordered pair, if recorded.
    pub fn interaction(&self, a: &str, b: &str) -> Option<&InteractionEdge> {
        self.edges.get(&DrugPair::new(a, b))
    }

    /// Severity recorded for a pair, `None` when absent.
    pub fn severity(&self, a: &str, b: &str) -> Severity {
        self.interaction(a, b)
            .map(|edge| edge.severity)
            .unwrap_or(Severity::None)
    }

    /// Dosing rules of a drug, most specific first.
    pub fn dosage_rules(&self, drug_id: &str) -> &[DosageRule] {
        self.rules.get(drug_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Members of a therapeutic class in catalog preference order.
    pub fn class_members(&self, class: &str) -> impl Iterator<Item = &DrugIdentity> + '_ {
        self.classes
            .get(class)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.drug(id))
    }
}

/// Compute fuzzy string similarity using combined metrics.
fn fuzzy_match(a: &str, b: &str) -> f64 {
    let jw = jaro_winkler(a, b);
    let lev = normalized_levenshtein(a, b);
    jw * 0.6 + lev * 0.4
}

fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

fn required<'a>(value: &'a Option<String>, record: &str, field: &'static str) -> CatalogResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CatalogLoadError::MissingField {
            record: record.to_string(),
            field,
        }),
    }
}

fn push_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !value.is_empty() && !target.contains(&value) {
            target.push(value);
        }
    }
}

fn to_contraindication(record: &ContraindicationRecord) -> Contraindication {
    match record {
        ContraindicationRecord::Tag(tag) => Contraindication {
            tag: normalize_key(tag),
            blocking: false,
            note: None,
        },
        ContraindicationRecord::Detailed { tag, blocking, note } => Contraindication {
            tag: normalize_key(tag),
            blocking: *blocking,
            note: note.clone(),
        },
    }
}

/// Normalize drug records and merge duplicates, keeping catalog order.
fn collect_drugs(records: &[DrugRecord]) -> CatalogResult<Vec<DrugIdentity>> {
    let mut ordered: Vec<DrugIdentity> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let label = format!("drug record #{}", index);
        let id = normalize_key(required(&record.id, &label, "id")?);
        let label = format!("drug '{}'", id);
        let name = required(&record.name, &label, "name")?.to_string();
        let class = normalize_key(required(&record.therapeutic_class, &label, "therapeutic_class")?);

        let synonyms = record.synonyms.iter().map(|s| normalize_key(s));
        let allergy_tags = record.allergy_tags.iter().map(|s| normalize_key(s));
        let contraindications: Vec<Contraindication> =
            record.contraindications.iter().map(to_contraindication).collect();

        match positions.get(&id) {
            Some(&pos) => {
                let existing = &mut ordered[pos];
                if existing.therapeutic_class != class {
                    return Err(CatalogLoadError::ConflictingClass {
                        id,
                        first: existing.therapeutic_class.clone(),
                        second: class,
                    });
                }
                push_unique(&mut existing.synonyms, synonyms);
                push_unique(&mut existing.allergy_tags, allergy_tags);
                for c in contraindications {
                    if !existing.contraindications.iter().any(|e| e.tag == c.tag) {
                        existing.contraindications.push(c);
                    }
                }
                if existing.sub_class.is_none() {
                    existing.sub_class = record.sub_class.as_deref().map(normalize_key);
                }
                if existing.preference.is_none() {
                    existing.preference = record.preference;
                }
            }
            None => {
                let mut drug = DrugIdentity::new(&id, &name, &class);
                drug.sub_class = record.sub_class.as_deref().map(normalize_key);
                push_unique(&mut drug.synonyms, synonyms);
                push_unique(&mut drug.allergy_tags, allergy_tags);
                drug.contraindications = contraindications;
                drug.preference = record.preference;
                positions.insert(id, ordered.len());
                ordered.push(drug);
            }
        }
    }

    Ok(ordered)
}

/// Build the name index; ids are registered before names and synonyms.
fn index_names(drugs: &[DrugIdentity]) -> CatalogResult<HashMap<String, String>> {
    let mut names: HashMap<String, String> = HashMap::new();

    for drug in drugs {
        names.insert(drug.id.clone(), drug.id.clone());
    }

    for drug in drugs {
        let keys = std::iter::once(normalize_key(&drug.name)).chain(drug.synonyms.iter().cloned());
        for key in keys {
            match names.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(drug.id.clone());
                }
                Entry::Occupied(slot) if slot.get() != &drug.id => {
                    return Err(CatalogLoadError::ConflictingSynonym {
                        name: slot.key().clone(),
                        first: slot.get().clone(),
                        second: drug.id.clone(),
                    });
                }
                Entry::Occupied(_) => {}
            }
        }
    }

    Ok(names)
}

fn resolve_reference(
    names: &HashMap<String, String>,
    value: &str,
    record: &str,
) -> CatalogResult<String> {
    names
        .get(&normalize_key(value))
        .cloned()
        .ok_or_else(|| CatalogLoadError::UnknownDrugReference {
            record: record.to_string(),
            id: value.to_string(),
        })
}

/// Validate interaction records into at most one edge per unordered pair.
fn index_edges(
    records: &[InteractionRecord],
    names: &HashMap<String, String>,
) -> CatalogResult<HashMap<DrugPair, InteractionEdge>> {
    let mut edges: HashMap<DrugPair, InteractionEdge> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let label = format!("interaction record #{}", index);
        let a = resolve_reference(names, required(&record.drug_a, &label, "drug_a")?, &label)?;
        let b = resolve_reference(names, required(&record.drug_b, &label, "drug_b")?, &label)?;
        if a == b {
            return Err(CatalogLoadError::SelfInteraction { id: a });
        }

        let raw_severity = required(&record.severity, &label, "severity")?;
        let severity = Severity::parse(raw_severity).ok_or_else(|| CatalogLoadError::InvalidSeverity {
            record: label.clone(),
            value: raw_severity.to_string(),
        })?;

        let pair = DrugPair::new(&a, &b);
        match edges.entry(pair.clone()) {
            Entry::Occupied(existing) if existing.get().severity != severity => {
                return Err(CatalogLoadError::ConflictingInteraction {
                    pair,
                    first: existing.get().severity,
                    second: severity,
                });
            }
            Entry::Occupied(_) => {
                tracing::debug!(pair = %pair, "Duplicate interaction record skipped");
            }
            Entry::Vacant(slot) => {
                slot.insert(InteractionEdge {
                    pair,
                    severity,
                    mechanism: record.mechanism.clone().unwrap_or_default(),
                    source: record.source.clone(),
                });
            }
        }
    }

    Ok(edges)
}

fn band(min: Option<f64>, max: Option<f64>) -> Option<Band> {
    match (min, max) {
        (None, None) => None,
        (min, max) => Some(Band::new(min.unwrap_or(0.0), max.unwrap_or(f64::INFINITY))),
    }
}

fn build_rule(record: &DosageRuleRecord, drug_id: String) -> CatalogResult<DosageRule> {
    let invalid = |reason: &str| CatalogLoadError::InvalidDosageRule {
        drug_id: drug_id.clone(),
        reason: reason.to_string(),
    };

    let age = band(record.age_min, record.age_max);
    if age.map_or(false, |b| !b.is_valid()) {
        return Err(invalid("age band must satisfy min < max"));
    }
    let weight = band(record.weight_min, record.weight_max);
    if weight.map_or(false, |b| !b.is_valid()) {
        return Err(invalid("weight band must satisfy min < max"));
    }

    let max = record.max_dose.ok_or_else(|| invalid("missing max_dose"))?;
    let min = record.min_dose.unwrap_or(0.0);
    let limit = if record.per_kg {
        DoseLimit::PerKg {
            min_per_kg: min,
            max_per_kg: max,
            absolute_max: record.absolute_max,
        }
    } else {
        DoseLimit::Fixed { min, max }
    };
    if !limit.is_valid() {
        return Err(invalid("doses must be non-negative with min <= max"));
    }

    let unit = match record.unit.as_deref().map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => return Err(invalid("missing unit")),
    };

    if let Some(cap) = record.max_daily_frequency {
        if !cap.is_finite() || cap <= 0.0 {
            return Err(invalid("max_daily_frequency must be positive"));
        }
    }

    let mut flags: Vec<String> = record.flags.iter().map(|f| normalize_key(f)).collect();
    flags.sort();
    flags.dedup();

    Ok(DosageRule {
        drug_id,
        predicate: PatientPredicate { age, weight, flags },
        limit,
        unit,
        max_daily_frequency: record.max_daily_frequency,
    })
}

/// Validate dosing rules and sort each drug's rules by specificity.
fn index_rules(
    records: &[DosageRuleRecord],
    names: &HashMap<String, String>,
) -> CatalogResult<HashMap<String, Vec<DosageRule>>> {
    let mut rules: HashMap<String, Vec<DosageRule>> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let label = format!("dosage rule #{}", index);
        let drug_id = resolve_reference(names, required(&record.drug_id, &label, "drug_id")?, &label)?;
        let rule = build_rule(record, drug_id.clone())?;

        let existing = rules.entry(drug_id.clone()).or_default();
        if existing.iter().any(|r| r.predicate == rule.predicate) {
            return Err(CatalogLoadError::AmbiguousDosageRule { drug_id });
        }
        existing.push(rule);
    }

    for list in rules.values_mut() {
        // Stable: equally specific rules keep catalog order.
        list.sort_by(|a, b| {
            a.predicate
                .specificity()
                .most_specific_first(&b.predicate.specificity())
        });
    }

    Ok(rules)
}
