//! Free-text quantity parsing (`"2 bottles"`, `"1 1/2 l"`, `"750"`).

use serde::{Deserialize, Serialize};

use larder_core::ValueObject;

use crate::convert::{convert, purchase_to_base};
use crate::unit::{normalize_unit, same_unit};

/// How the unit token of a parsed quantity was interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interpretation {
    /// No unit token, or the token names the base unit.
    BaseUnits,
    /// The token matched the ingredient's purchase unit.
    PurchaseUnits,
    /// The token was converted to the base unit through the unit tables.
    Converted { from_unit: String },
    /// The token was not usable; the literal was taken as base units.
    AssumedBase { unit_token: String },
}

/// A quantity in the ingredient's base unit plus the text it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuantity {
    pub quantity: f64,
    pub raw_text: String,
    pub interpretation: Interpretation,
}

impl ValueObject for ParsedQuantity {}

/// Parse free text into a base-unit quantity.
///
/// Rules, in order:
/// 1. a leading numeric literal is required (`2`, `0.5`, `.5`, `1,500`, `3/4`,
///    `1 1/2`, optionally preceded by `-`), otherwise `None`; no unit token
///    means base units. Commas are thousands separators only between groups
///    of three digits; a single comma before other digits is a decimal comma
///    (`1,5 l` is 1.5 l);
/// 2. a unit token matching the purchase unit (exact, singular or plural) is
///    scaled by `purchase_unit_qty`;
/// 3. a token naming the base unit itself is base units; a token the unit
///    tables can convert to `base_unit` is converted;
/// 4. anything else is taken as already being in base units.
///
/// Negative literals are returned as-is; rejecting them is the caller's call.
pub fn parse_quantity(
    input: &str,
    base_unit: &str,
    purchase_unit: Option<&str>,
    purchase_unit_qty: Option<f64>,
) -> Option<ParsedQuantity> {
    let raw_text = input.trim();
    if raw_text.is_empty() {
        return None;
    }

    let (value, rest) = split_number(raw_text)?;
    if !value.is_finite() {
        return None;
    }
    let token = normalize_unit(rest);

    let (quantity, interpretation) = if token.is_empty() {
        (value, Interpretation::BaseUnits)
    } else if let Some(per_purchase) = purchase_multiplier(&token, purchase_unit, purchase_unit_qty)
    {
        (purchase_to_base(value, per_purchase), Interpretation::PurchaseUnits)
    } else if same_unit(&token, base_unit) {
        (value, Interpretation::BaseUnits)
    } else if let Ok(converted) = convert(value, &token, base_unit) {
        (
            converted,
            Interpretation::Converted {
                from_unit: token.clone(),
            },
        )
    } else {
        (
            value,
            Interpretation::AssumedBase {
                unit_token: token.clone(),
            },
        )
    };

    Some(ParsedQuantity {
        quantity,
        raw_text: raw_text.to_string(),
        interpretation,
    })
}

fn purchase_multiplier(token: &str, purchase_unit: Option<&str>, qty: Option<f64>) -> Option<f64> {
    let unit = purchase_unit?;
    let qty = qty?;
    if !(qty.is_finite() && qty > 0.0) {
        return None;
    }
    same_unit(token, unit).then_some(qty)
}

struct Literal {
    value: f64,
    is_fraction: bool,
}

/// Split `"1 1/2 cups"` into `(1.5, " cups")`.
fn split_number(s: &str) -> Option<(f64, &str)> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };

    let (first, mut rest) = take_literal(body)?;
    let mut value = first.value;

    // Mixed number: whole part, whitespace, then a fraction.
    if !first.is_fraction {
        let trimmed = rest.trim_start();
        if trimmed.len() < rest.len() {
            if let Some((frac, after)) = take_literal(trimmed) {
                if frac.is_fraction {
                    value += frac.value;
                    rest = after;
                }
            }
        }
    }

    Some((if negative { -value } else { value }, rest))
}

/// Rewrite a literal with commas into plain `f64` syntax, or `None` when the
/// commas fit neither thousands grouping nor a decimal comma.
fn normalize_number(number: &str) -> Option<String> {
    if !number.contains(',') {
        return Some(number.to_string());
    }
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (number, None),
    };
    let groups: Vec<&str> = whole.split(',').collect();
    let thousands = (1..=3).contains(&groups[0].len()) && groups[1..].iter().all(|g| g.len() == 3);
    if thousands {
        let mut plain = groups.concat();
        if let Some(fraction) = fraction {
            plain.push('.');
            plain.push_str(fraction);
        }
        return Some(plain);
    }
    match (groups.as_slice(), fraction) {
        ([units, decimals], None) if !decimals.is_empty() => Some(format!("{units}.{decimals}")),
        _ => None,
    }
}

fn take_literal(s: &str) -> Option<(Literal, &str)> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(s.len());
    let number = &s[..end];
    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let numerator: f64 = normalize_number(number)?.parse().ok()?;
    let rest = &s[end..];

    if let Some(after_slash) = rest.strip_prefix('/') {
        let dend = after_slash
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_slash.len());
        if dend > 0 {
            let denominator: f64 = after_slash[..dend].parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            return Some((
                Literal {
                    value: numerator / denominator,
                    is_fraction: true,
                },
                &after_slash[dend..],
            ));
        }
    }

    Some((
        Literal {
            value: numerator,
            is_fraction: false,
        },
        rest,
    ))
}
