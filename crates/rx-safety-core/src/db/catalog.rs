//! Catalog database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::catalog::{CatalogSource, ContraindicationRecord, DosageRuleRecord, DrugRecord, InteractionRecord};

/// One row of the import log.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogImport {
    pub import_id: i64,
    pub fingerprint: String,
    pub drug_count: usize,
    pub interaction_count: usize,
    pub rule_count: usize,
    pub imported_at: String,
}

impl Database {
    /// Replace the stored catalog with `source`, atomically.
    pub fn import_catalog_source(&mut self, source: &CatalogSource) -> DbResult<CatalogImport> {
        let fingerprint = source.fingerprint()?;
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM drugs", [])?;
        tx.execute("DELETE FROM interactions", [])?;
        tx.execute("DELETE FROM dosage_rules", [])?;

        for drug in &source.drugs {
            tx.execute(
                r#"
                INSERT INTO drugs (
                    id, name, therapeutic_class, sub_class, synonyms,
                    allergy_tags, contraindications, preference
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    drug.id,
                    drug.name,
                    drug.therapeutic_class,
                    drug.sub_class,
                    serde_json::to_string(&drug.synonyms)?,
                    serde_json::to_string(&drug.allergy_tags)?,
                    serde_json::to_string(&drug.contraindications)?,
                    drug.preference,
                ],
            )?;
        }

        for edge in &source.interactions {
            tx.execute(
                r#"
                INSERT INTO interactions (drug_a, drug_b, severity, mechanism, source)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![edge.drug_a, edge.drug_b, edge.severity, edge.mechanism, edge.source],
            )?;
        }

        for rule in &source.dosage_rules {
            tx.execute(
                r#"
                INSERT INTO dosage_rules (
                    drug_id, age_min, age_max, weight_min, weight_max, flags,
                    min_dose, max_dose, per_kg, absolute_max, unit, max_daily_frequency
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    rule.drug_id,
                    rule.age_min,
                    rule.age_max,
                    rule.weight_min,
                    rule.weight_max,
                    serde_json::to_string(&rule.flags)?,
                    rule.min_dose,
                    rule.max_dose,
                    rule.per_kg,
                    rule.absolute_max,
                    rule.unit,
                    rule.max_daily_frequency,
                ],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO catalog_imports (fingerprint, drug_count, interaction_count, rule_count)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                fingerprint,
                source.drugs.len() as i64,
                source.interactions.len() as i64,
                source.dosage_rules.len() as i64,
            ],
        )?;
        let import_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(
            import_id,
            drugs = source.drugs.len(),
            interactions = source.interactions.len(),
            rules = source.dosage_rules.len(),
            "Catalog imported into database"
        );

        self.get_catalog_import(import_id)?
            .ok_or_else(|| DbError::NotFound(format!("catalog import {}", import_id)))
    }

    /// Read the stored catalog back as a source, in insertion order.
    pub fn load_catalog_source(&self) -> DbResult<CatalogSource> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, therapeutic_class, sub_class, synonyms,
                   allergy_tags, contraindications, preference
            FROM drugs
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DrugRow {
                id: row.get(0)?,
                name: row.get(1)?,
                therapeutic_class: row.get(2)?,
                sub_class: row.get(3)?,
                synonyms: row.get(4)?,
                allergy_tags: row.get(5)?,
                contraindications: row.get(6)?,
                preference: row.get(7)?,
            })
        })?;
        let mut drugs = Vec::new();
        for row in rows {
            drugs.push(row?.try_into()?);
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT drug_a, drug_b, severity, mechanism, source
            FROM interactions
            ORDER BY seq
            "#,
        )?;
        let interactions = stmt
            .query_map([], |row| {
                Ok(InteractionRecord {
                    drug_a: row.get(0)?,
                    drug_b: row.get(1)?,
                    severity: row.get(2)?,
                    mechanism: row.get(3)?,
                    source: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT drug_id, age_min, age_max, weight_min, weight_max, flags,
                   min_dose, max_dose, per_kg, absolute_max, unit, max_daily_frequency
            FROM dosage_rules
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DosageRuleRow {
                drug_id: row.get(0)?,
                age_min: row.get(1)?,
                age_max: row.get(2)?,
                weight_min: row.get(3)?,
                weight_max: row.get(4)?,
                flags: row.get(5)?,
                min_dose: row.get(6)?,
                max_dose: row.get(7)?,
                per_kg: row.get(8)?,
                absolute_max: row.get(9)?,
                unit: row.get(10)?,
                max_daily_frequency: row.get(11)?,
            })
        })?;
        let mut dosage_rules = Vec::new();
        for row in rows {
            dosage_rules.push(row?.try_into()?);
        }

        Ok(CatalogSource {
            drugs,
            interactions,
            dosage_rules,
        })
    }

    /// Most recent import, if any.
    pub fn last_catalog_import(&self) -> DbResult<Option<CatalogImport>> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT MAX(import_id) FROM catalog_imports", [], |row| row.get(0))?;
        match id {
            Some(id) => self.get_catalog_import(id),
            None => Ok(None),
        }
    }

    fn get_catalog_import(&self, import_id: i64) -> DbResult<Option<CatalogImport>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT import_id, fingerprint, drug_count, interaction_count, rule_count, imported_at
                FROM catalog_imports
                WHERE import_id = ?
                "#,
                [import_id],
                |row| {
                    Ok(CatalogImport {
                        import_id: row.get(0)?,
                        fingerprint: row.get(1)?,
                        drug_count: row.get::<_, i64>(2)? as usize,
                        interaction_count: row.get::<_, i64>(3)? as usize,
                        rule_count: row.get::<_, i64>(4)? as usize,
                        imported_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }
}

/// Intermediate row struct for database mapping.
struct DrugRow {
    id: Option<String>,
    name: Option<String>,
    therapeutic_class: Option<String>,
    sub_class: Option<String>,
    synonyms: String,
    allergy_tags: String,
    contraindications: String,
    preference: Option<u32>,
}

impl TryFrom<DrugRow> for DrugRecord {
    type Error = DbError;

    fn try_from(row: DrugRow) -> Result<Self, Self::Error> {
        let contraindications: Vec<ContraindicationRecord> = serde_json::from_str(&row.contraindications)?;
        Ok(DrugRecord {
            id: row.id,
            name: row.name,
            therapeutic_class: row.therapeutic_class,
            sub_class: row.sub_class,
            synonyms: serde_json::from_str(&row.synonyms)?,
            allergy_tags: serde_json::from_str(&row.allergy_tags)?,
            contraindications,
            preference: row.preference,
        })
    }
}

struct DosageRuleRow {
    drug_id: Option<String>,
    age_min: Option<f64>,
    age_max: Option<f64>,
    weight_min: Option<f64>,
    weight_max: Option<f64>,
    flags: String,
    min_dose: Option<f64>,
    max_dose: Option<f64>,
    per_kg: bool,
    absolute_max: Option<f64>,
    unit: Option<String>,
    max_daily_frequency: Option<f64>,
}

impl TryFrom<DosageRuleRow> for DosageRuleRecord {
    type Error = DbError;

    fn try_from(row: DosageRuleRow) -> Result<Self, Self::Error> {
        Ok(DosageRuleRecord {
            drug_id: row.drug_id,
            age_min: row.age_min,
            age_max: row.age_max,
            weight_min: row.weight_min,
            weight_max: row.weight_max,
            flags: serde_json::from_str(&row.flags)?,
            min_dose: row.min_dose,
            max_dose: row.max_dose,
            per_kg: row.per_kg,
            absolute_max: row.absolute_max,
            unit: row.unit,
            max_daily_frequency: row.max_daily_frequency,
        })
    }
}
