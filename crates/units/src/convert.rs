//! Same-domain unit conversion and purchase-unit scaling.

use thiserror::Error;

use crate::unit::{UnitCategory, UnitTable, standard_units};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    /// Units belong to different domains, or at least one is not recognized.
    #[error("incompatible units: cannot convert '{from}' ({from_category}) to '{to}' ({to_category})")]
    IncompatibleUnits {
        from: String,
        to: String,
        from_category: UnitCategory,
        to_category: UnitCategory,
    },
}

impl UnitTable {
    /// Convert `qty` from one unit to another within a single domain.
    ///
    /// Converting a unit to itself (or to another alias of it) returns `qty`
    /// untouched, so no floating-point drift is introduced on the identity path.
    pub fn convert(&self, qty: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
        let incompatible = || ConversionError::IncompatibleUnits {
            from: from.to_string(),
            to: to.to_string(),
            from_category: self.category(from),
            to_category: self.category(to),
        };

        let (Some(src), Some(dst)) = (self.lookup(from), self.lookup(to)) else {
            return Err(incompatible());
        };
        if src.category != dst.category {
            return Err(incompatible());
        }
        if src.canonical == dst.canonical {
            return Ok(qty);
        }

        Ok(qty * src.factor / dst.factor)
    }
}

/// Convert with the standard unit table.
pub fn convert(qty: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
    standard_units().convert(qty, from, to)
}

/// Scale a quantity expressed in purchase units (bottles, cases) to base units.
///
/// A non-positive or non-finite `units_per_purchase` is not a real multiplier;
/// the input is returned unchanged, same as [`base_to_purchase`].
pub fn purchase_to_base(purchase_qty: f64, units_per_purchase: f64) -> f64 {
    if !is_usable_multiplier(units_per_purchase) {
        return purchase_qty;
    }
    purchase_qty * units_per_purchase
}

/// Scale a base-unit quantity to purchase units.
///
/// Fallback, not a conversion: with a non-positive or non-finite
/// `units_per_purchase` the base quantity is returned unchanged. Callers that
/// display the result should label it with the base unit in that case.
pub fn base_to_purchase(base_qty: f64, units_per_purchase: f64) -> f64 {
    if !is_usable_multiplier(units_per_purchase) {
        return base_qty;
    }
    base_qty / units_per_purchase
}

fn is_usable_multiplier(k: f64) -> bool {
    k.is_finite() && k > 0.0
}

/// Round a value for display. Never feed the result back into accumulation.
pub fn round_for_display(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision.min(12) as i32);
    (value * scale).round() / scale
}

/// `"1050 ml"`, `"0.33 l"`: display-rounded value with its unit.
pub fn format_quantity(value: f64, unit: &str, precision: u32) -> String {
    let rounded = round_for_display(value, precision);
    // -0.0 prints as "-0"; normalize it.
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn converts_within_volume() {
        assert!(close(convert(1.0, "l", "ml").unwrap(), 1000.0));
        assert!(close(convert(2.0, "fl oz", "ml").unwrap(), 59.147_059_125));
        assert!(close(convert(3.0, "tsp", "tbsp").unwrap(), 1.0));
        assert!(close(convert(1.0, "gallon", "cups").unwrap(), 16.0));
    }

    #[test]
    fn converts_within_weight_and_count() {
        assert!(close(convert(1.0, "lb", "g").unwrap(), 453.592_37));
        assert!(close(convert(2.5, "kg", "grams").unwrap(), 2500.0));
        assert!(close(convert(2.0, "dozen", "each").unwrap(), 24.0));
    }

    #[test]
    fn cross_domain_conversion_fails() {
        let err = convert(1.0, "ml", "g").unwrap_err();
        assert_eq!(
            err,
            ConversionError::IncompatibleUnits {
                from: "ml".into(),
                to: "g".into(),
                from_category: UnitCategory::Volume,
                to_category: UnitCategory::Weight,
            }
        );
    }

    #[test]
    fn unknown_units_fail_even_against_themselves() {
        assert!(convert(1.0, "bottle", "bottle").is_err());
        assert!(convert(1.0, "ml", "splash").is_err());
    }

    #[test]
    fn base_to_purchase_falls_back_on_bad_multiplier() {
        assert_eq!(base_to_purchase(1500.0, 750.0), 2.0);
        assert_eq!(base_to_purchase(1500.0, 0.0), 1500.0);
        assert_eq!(base_to_purchase(1500.0, -3.0), 1500.0);
        assert_eq!(base_to_purchase(1500.0, f64::NAN), 1500.0);
        assert_eq!(purchase_to_base(2.0, 750.0), 1500.0);
        assert_eq!(purchase_to_base(2.0, 0.0), 2.0);
    }

    #[test]
    fn display_rounding() {
        assert_eq!(round_for_display(1049.996, 2), 1050.0);
        assert_eq!(round_for_display(0.3333333, 2), 0.33);
        assert_eq!(format_quantity(374.99999999, "ml", 2), "375 ml");
        assert_eq!(format_quantity(-0.0000001, "ml", 2), "0 ml");
    }

    const VOLUME: &[&str] = &["ml", "cl", "l", "tsp", "tbsp", "fl oz", "cup", "pint", "quart", "gallon"];
    const WEIGHT: &[&str] = &["mg", "g", "kg", "lb"];
    const COUNT: &[&str] = &["each", "dozen"];

    fn same_domain_triple() -> impl Strategy<Value = (&'static str, &'static str, &'static str)> {
        prop_oneof![
            (
                proptest::sample::select(VOLUME),
                proptest::sample::select(VOLUME),
                proptest::sample::select(VOLUME)
            ),
            (
                proptest::sample::select(WEIGHT),
                proptest::sample::select(WEIGHT),
                proptest::sample::select(WEIGHT)
            ),
            (
                proptest::sample::select(COUNT),
                proptest::sample::select(COUNT),
                proptest::sample::select(COUNT)
            ),
        ]
    }

    proptest! {
        #[test]
        fn identity_conversion_is_exact(
            qty in -1.0e9f64..1.0e9,
            unit in proptest::sample::select([VOLUME, WEIGHT, COUNT].concat())
        ) {
            prop_assert_eq!(convert(qty, unit, unit).unwrap(), qty);
        }

        #[test]
        fn conversion_is_transitive(
            qty in -1.0e6f64..1.0e6,
            (u1, u2, u3) in same_domain_triple()
        ) {
            let stepwise = convert(convert(qty, u1, u2).unwrap(), u2, u3).unwrap();
            let direct = convert(qty, u1, u3).unwrap();
            prop_assert!(close(stepwise, direct), "{stepwise} vs {direct}");
        }

        #[test]
        fn volume_to_weight_always_fails(
            qty in proptest::num::f64::ANY,
            v in proptest::sample::select(VOLUME),
            w in proptest::sample::select(WEIGHT)
        ) {
            prop_assert!(convert(qty, v, w).is_err());
            prop_assert!(convert(qty, w, v).is_err());
        }

        #[test]
        fn purchase_round_trip(x in -1.0e9f64..1.0e9, k in 1.0e-3f64..1.0e6) {
            let back = purchase_to_base(base_to_purchase(x, k), k);
            prop_assert!(close(back, x), "{back} vs {x}");
        }
    }
}
