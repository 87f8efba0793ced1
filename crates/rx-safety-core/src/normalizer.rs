//! Prescription input normalizer.
//!
//! Handles:
//! - Unit conversion (g→mg, mcg→mg, cc→mL, etc.)
//! - Frequency reading ("bid"→2/day, "every 8 hours"→3/day)
//! - Route canonicalization (orally→PO, intravenously→IV)

use std::collections::HashMap;

use crate::models::{Dose, PrescriptionEntry};

/// Entry after unit, frequency and route normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    /// Lower-cased drug id or name as requested
    pub drug_key: String,
    /// Dose amount in `unit`
    pub amount: f64,
    /// Canonical unit
    pub unit: String,
    /// Administrations per day, when the frequency text could be read
    pub doses_per_day: Option<f64>,
    /// Frequency as written
    pub frequency_text: Option<String>,
    /// Canonical route
    pub route: Option<String>,
}

/// Normalizer for structured prescription entries.
pub struct Normalizer {
    /// Unit conversions: non-standard → (canonical unit, multiplier)
    unit_conversions: HashMap<String, (String, f64)>,
    /// Fixed frequency phrases → administrations per day
    frequencies: HashMap<String, f64>,
    /// Route canonicalization: written → standard abbreviation
    route_map: HashMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            unit_conversions: Self::default_unit_conversions(),
            frequencies: Self::default_frequencies(),
            route_map: Self::default_routes(),
        }
    }

    /// Normalize a prescription entry.
    pub fn normalize(&self, entry: &PrescriptionEntry) -> NormalizedEntry {
        let (unit, multiplier) = self.convert_unit(&entry.dose.unit);

        NormalizedEntry {
            drug_key: entry.drug_id.trim().to_lowercase(),
            amount: entry.dose.amount * multiplier,
            unit,
            doses_per_day: entry.frequency.as_deref().and_then(|f| self.doses_per_day(f)),
            frequency_text: entry.frequency.clone(),
            route: entry.route.as_deref().map(|r| self.canonicalize_route(r)),
        }
    }

    /// Convert a unit to canonical form with multiplier.
    pub fn convert_unit(&self, unit: &str) -> (String, f64) {
        let lower = unit.trim().to_lowercase();
        self.unit_conversions
            .get(&lower)
            .cloned()
            .unwrap_or((lower, 1.0))
    }

    /// Express `dose` in `target_unit`, if the two units are commensurable.
    pub fn convert_dose(&self, dose: &Dose, target_unit: &str) -> Option<f64> {
        let (from_unit, from_mult) = self.convert_unit(&dose.unit);
        let (to_unit, to_mult) = self.convert_unit(target_unit);
        if from_unit != to_unit {
            return None;
        }
        Some(dose.amount * from_mult / to_mult)
    }

    /// Read a frequency phrase as administrations per day.
    ///
    /// Understands fixed phrases ("bid", "once daily"), "N times daily",
    /// "every N hours" and "qNh".
    pub fn doses_per_day(&self, text: &str) -> Option<f64> {
        let lower = text.trim().to_lowercase();
        let cleaned = lower.trim_end_matches('.').replace('.', "");

        if let Some(per_day) = self.frequencies.get(cleaned.as_str()) {
            return Some(*per_day);
        }

        let words: Vec<&str> = cleaned.split_whitespace().collect();
        match words.as_slice() {
            // "3 times daily", "3 times a day", "3x daily"
            [n, "times" | "time", rest @ ..] if is_daily(rest) => parse_count(n),
            [n, rest @ ..] if n.ends_with('x') && is_daily(rest) => parse_count(&n[..n.len() - 1]),
            // "every 8 hours", "every 8 hrs"
            ["every", n, "hours" | "hour" | "hrs" | "hr" | "h"] => {
                parse_count(n).filter(|h| *h > 0.0).map(|h| 24.0 / h)
            }
            // "q8h"
            [single] if single.starts_with('q') && single.ends_with('h') && single.len() > 2 => {
                parse_count(&single[1..single.len() - 1])
                    .filter(|h| *h > 0.0)
                    .map(|h| 24.0 / h)
            }
            _ => None,
        }
    }

    /// Canonicalize a route of administration.
    pub fn canonicalize_route(&self, route: &str) -> String {
        let lower = route.trim().to_lowercase();
        self.route_map
            .get(&lower)
            .cloned()
            .unwrap_or_else(|| route.trim().to_uppercase())
    }

    /// Default unit conversions.
    ///
    /// Mass collapses to mg and volume to mL; count units only lose their
    /// spelling variants.
    fn default_unit_conversions() -> HashMap<String, (String, f64)> {
        const TABLE: &[(&[&str], &str, f64)] = &[
            (&["mg", "milligram", "milligrams"], "mg", 1.0),
            (&["mcg", "ug", "µg", "microgram", "micrograms"], "mg", 0.001),
            (&["g", "gm", "gram", "grams"], "mg", 1000.0),
            (&["ml", "cc"], "mL", 1.0),
            (&["l", "liter", "litre"], "mL", 1000.0),
            (&["unit", "units", "iu"], "unit", 1.0),
            (&["tab", "tabs", "tablets"], "tablet", 1.0),
            (&["cap", "caps", "capsules"], "capsule", 1.0),
        ];

        TABLE
            .iter()
            .flat_map(|(aliases, canonical, multiplier)| {
                aliases
                    .iter()
                    .map(move |alias| (alias.to_string(), (canonical.to_string(), *multiplier)))
            })
            .collect()
    }

    /// Default frequency phrases.
    fn default_frequencies() -> HashMap<String, f64> {
        let mut map = HashMap::new();

        for phrase in ["od", "qd", "daily", "once daily", "once a day", "morning", "evening", "night", "at night", "hs", "qam", "qpm"] {
            map.insert(phrase.to_string(), 1.0);
        }
        for phrase in ["bid", "bd", "twice daily", "twice a day"] {
            map.insert(phrase.to_string(), 2.0);
        }
        for phrase in ["tid", "tds", "thrice daily", "three times daily", "three times a day"] {
            map.insert(phrase.to_string(), 3.0);
        }
        for phrase in ["qid", "qds", "four times daily", "four times a day"] {
            map.insert(phrase.to_string(), 4.0);
        }
        map.insert("weekly".into(), 1.0 / 7.0);
        map.insert("once weekly".into(), 1.0 / 7.0);

        map
    }

    /// Default route mappings.
    fn default_routes() -> HashMap<String, String> {
        const TABLE: &[(&[&str], &str)] = &[
            (&["oral", "orally", "by mouth", "po"], "PO"),
            (&["intravenous", "intravenously", "iv"], "IV"),
            (&["intramuscular", "intramuscularly", "im"], "IM"),
            (&["subcutaneous", "subcutaneously", "sc", "sq"], "SC"),
            (&["topical", "topically"], "TOP"),
            (&["inhaled"], "INH"),
            (&["sublingual"], "SL"),
            (&["rectal"], "PR"),
        ];

        TABLE
            .iter()
            .flat_map(|(aliases, canonical)| {
                aliases
                    .iter()
                    .map(move |alias| (alias.to_string(), canonical.to_string()))
            })
            .collect()
    }
}

fn is_daily(rest: &[&str]) -> bool {
    matches!(rest, ["daily"] | ["a", "day"] | ["per", "day"] | ["day"])
}

fn parse_count(text: &str) -> Option<f64> {
    let value = match text {
        "one" | "once" => 1.0,
        "two" | "twice" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "six" => 6.0,
        other => other.parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        let normalizer = Normalizer::new();

        let (unit, mult) = normalizer.convert_unit("cc");
        assert_eq!(unit, "mL");
        assert_eq!(mult, 1.0);

        let (unit, mult) = normalizer.convert_unit("MCG");
        assert_eq!(unit, "mg");
        assert_eq!(mult, 0.001);

        let (unit, mult) = normalizer.convert_unit("g");
        assert_eq!(unit, "mg");
        assert_eq!(mult, 1000.0);

        // Unknown units pass through lower-cased
        let (unit, mult) = normalizer.convert_unit("Puffs");
        assert_eq!(unit, "puffs");
        assert_eq!(mult, 1.0);
    }

    #[test]
    fn test_convert_dose() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.convert_dose(&Dose::new(0.5, "g"), "mg"), Some(500.0));
        assert_eq!(normalizer.convert_dose(&Dose::new(250.0, "mg"), "g"), Some(0.25));
        assert_eq!(normalizer.convert_dose(&Dose::new(5.0, "cc"), "ml"), Some(5.0));
        assert_eq!(normalizer.convert_dose(&Dose::new(5.0, "mL"), "mg"), None);
    }

    #[test]
    fn test_fixed_frequencies() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.doses_per_day("OD"), Some(1.0));
        assert_eq!(normalizer.doses_per_day("b.i.d."), Some(2.0));
        assert_eq!(normalizer.doses_per_day("Twice daily"), Some(2.0));
        assert_eq!(normalizer.doses_per_day("tid"), Some(3.0));
        assert_eq!(normalizer.doses_per_day("qid"), Some(4.0));
        assert_eq!(normalizer.doses_per_day("night"), Some(1.0));
    }

    #[test]
    fn test_counted_frequencies() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.doses_per_day("3 times daily"), Some(3.0));
        assert_eq!(normalizer.doses_per_day("2 times a day"), Some(2.0));
        assert_eq!(normalizer.doses_per_day("4x daily"), Some(4.0));
        assert_eq!(normalizer.doses_per_day("every 8 hours"), Some(3.0));
        assert_eq!(normalizer.doses_per_day("every 6 hrs"), Some(4.0));
        assert_eq!(normalizer.doses_per_day("q12h"), Some(2.0));
        assert_eq!(normalizer.doses_per_day("every 0 hours"), None);
        assert_eq!(normalizer.doses_per_day("as needed"), None);
    }

    #[test]
    fn test_route_canonicalization() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.canonicalize_route("orally"), "PO");
        assert_eq!(normalizer.canonicalize_route("by mouth"), "PO");
        assert_eq!(normalizer.canonicalize_route("Intravenously"), "IV");
        assert_eq!(normalizer.canonicalize_route("weird_route"), "WEIRD_ROUTE");
    }

    #[test]
    fn test_normalize_entry() {
        let normalizer = Normalizer::new();
        let mut entry = PrescriptionEntry::new("Amoxicillin", 0.5, "g").with_frequency("every 8 hours");
        entry.route = Some("orally".into());

        let normalized = normalizer.normalize(&entry);

        assert_eq!(normalized.drug_key, "amoxicillin");
        assert_eq!(normalized.amount, 500.0);
        assert_eq!(normalized.unit, "mg");
        assert_eq!(normalized.doses_per_day, Some(3.0));
        assert_eq!(normalized.route, Some("PO".into()));
    }
}
