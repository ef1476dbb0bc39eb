//! Unit tables and classification.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Measurement domain of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Volume,
    Weight,
    Count,
    Unknown,
}

impl core::fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UnitCategory::Volume => "volume",
            UnitCategory::Weight => "weight",
            UnitCategory::Count => "count",
            UnitCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A recognized unit: its canonical spelling, domain, and size in the domain's
/// base unit (ml, g or each).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDef {
    pub canonical: &'static str,
    pub category: UnitCategory,
    pub factor: f64,
}

/// Immutable alias → unit lookup table.
#[derive(Debug, Clone)]
pub struct UnitTable {
    units: HashMap<&'static str, UnitDef>,
}

const FL_OZ_ML: f64 = 29.573_529_562_5;

impl UnitTable {
    /// The built-in US/metric kitchen and bar units.
    ///
    /// `oz` is a fluid ounce here; weight is tracked in g, kg, mg or lb.
    pub fn standard() -> Self {
        use UnitCategory::*;

        let groups: &[(&'static str, UnitCategory, f64, &[&'static str])] = &[
            ("ml", Volume, 1.0, &["ml", "milliliter", "millilitre", "mls", "cc"]),
            ("cl", Volume, 10.0, &["cl", "centiliter", "centilitre"]),
            ("dl", Volume, 100.0, &["dl", "deciliter", "decilitre"]),
            ("l", Volume, 1000.0, &["l", "liter", "litre", "ltr", "lt"]),
            ("tsp", Volume, FL_OZ_ML / 6.0, &["tsp", "teaspoon", "tspn"]),
            ("tbsp", Volume, FL_OZ_ML / 2.0, &["tbsp", "tablespoon", "tbs", "tbl"]),
            (
                "fl oz",
                Volume,
                FL_OZ_ML,
                &["fl oz", "floz", "fluid ounce", "fl ounce", "oz", "ounce"],
            ),
            ("cup", Volume, FL_OZ_ML * 8.0, &["cup", "c"]),
            ("pint", Volume, FL_OZ_ML * 16.0, &["pint", "pt"]),
            ("quart", Volume, FL_OZ_ML * 32.0, &["quart", "qt"]),
            ("gallon", Volume, FL_OZ_ML * 128.0, &["gallon", "gal"]),
            ("mg", Weight, 0.001, &["mg", "milligram", "milligramme"]),
            ("g", Weight, 1.0, &["g", "gram", "gramme", "grm"]),
            ("kg", Weight, 1000.0, &["kg", "kilogram", "kilogramme", "kilo"]),
            ("lb", Weight, 453.592_37, &["lb", "lbs", "pound"]),
            (
                "each",
                Count,
                1.0,
                &["each", "ea", "piece", "pc", "pcs", "unit", "item", "count", "ct", "whole"],
            ),
            ("dozen", Count, 12.0, &["dozen", "dz", "doz"]),
        ];

        let mut units = HashMap::new();
        for (canonical, category, factor, aliases) in groups {
            let def = UnitDef {
                canonical: *canonical,
                category: *category,
                factor: *factor,
            };
            for alias in *aliases {
                units.insert(*alias, def);
            }
        }

        Self { units }
    }

    /// Look up a unit by any alias, case-insensitively, accepting plural forms.
    pub fn lookup(&self, unit: &str) -> Option<&UnitDef> {
        let key = normalize_unit(unit);
        if key.is_empty() {
            return None;
        }
        if let Some(def) = self.units.get(key.as_str()) {
            return Some(def);
        }
        singular_candidates(&key)
            .into_iter()
            .find_map(|candidate| self.units.get(candidate.as_str()))
    }

    pub fn category(&self, unit: &str) -> UnitCategory {
        self.lookup(unit)
            .map(|def| def.category)
            .unwrap_or(UnitCategory::Unknown)
    }
}

static STANDARD: LazyLock<UnitTable> = LazyLock::new(UnitTable::standard);

/// Process-wide standard table, built on first use and never mutated.
pub fn standard_units() -> &'static UnitTable {
    &STANDARD
}

/// Classify a unit against the standard table.
pub fn unit_category(unit: &str) -> UnitCategory {
    standard_units().category(unit)
}

/// Lowercase, drop periods, and collapse whitespace (`"Fl. Oz."` → `"fl oz"`).
pub fn normalize_unit(unit: &str) -> String {
    unit.to_lowercase()
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Textual unit identity after normalization, tolerant of plural forms.
///
/// Works for units the table does not know (`"bottles"` vs `"Bottle"`).
pub fn same_unit(a: &str, b: &str) -> bool {
    let a = normalize_unit(a);
    let b = normalize_unit(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let a_forms = with_singulars(&a);
    let b_forms = with_singulars(&b);
    a_forms.iter().any(|form| b_forms.contains(form))
}

fn with_singulars(key: &str) -> Vec<String> {
    let mut forms = vec![key.to_string()];
    forms.extend(singular_candidates(key));
    forms
}

fn singular_candidates(key: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(stem) = key.strip_suffix("ies") {
        out.push(format!("{stem}y"));
    }
    if let Some(stem) = key.strip_suffix("es") {
        out.push(stem.to_string());
    }
    if let Some(stem) = key.strip_suffix('s') {
        out.push(stem.to_string());
    }
    out.retain(|s| !s.is_empty());
    out
}
