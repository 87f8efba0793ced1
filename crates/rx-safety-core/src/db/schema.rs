//! SQLite schema definition.

/// Stored in `PRAGMA user_version` once the schema has been applied.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete database schema for the catalog store.
///
/// Rows hold raw source records; validation happens when a snapshot is
/// built, so required columns are nullable here. Row order (`seq`) is the
/// catalog order.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Drugs
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT,
    name TEXT,
    therapeutic_class TEXT,
    sub_class TEXT,
    synonyms TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    allergy_tags TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    contraindications TEXT NOT NULL DEFAULT '[]', -- JSON array of tags or {tag, blocking, note}
    preference INTEGER
);

CREATE INDEX IF NOT EXISTS idx_drugs_id ON drugs(id);

-- ============================================================================
-- Interactions
-- ============================================================================

CREATE TABLE IF NOT EXISTS interactions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    drug_a TEXT,
    drug_b TEXT,
    severity TEXT,
    mechanism TEXT,
    source TEXT
);

-- ============================================================================
-- Dosage Rules
-- ============================================================================

CREATE TABLE IF NOT EXISTS dosage_rules (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    drug_id TEXT,
    age_min REAL,
    age_max REAL,
    weight_min REAL,
    weight_max REAL,
    flags TEXT NOT NULL DEFAULT '[]',             -- JSON array of strings
    min_dose REAL,
    max_dose REAL,
    per_kg INTEGER NOT NULL DEFAULT 0,
    absolute_max REAL,
    unit TEXT,
    max_daily_frequency REAL
);

CREATE INDEX IF NOT EXISTS idx_dosage_rules_drug ON dosage_rules(drug_id);

-- ============================================================================
-- Import Log
-- ============================================================================

CREATE TABLE IF NOT EXISTS catalog_imports (
    import_id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT NOT NULL,
    drug_count INTEGER NOT NULL,
    interaction_count INTEGER NOT NULL,
    rule_count INTEGER NOT NULL,
    imported_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
