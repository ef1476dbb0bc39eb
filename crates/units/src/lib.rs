//! `larder-units` — unit classification, conversion and quantity parsing.
//!
//! Quantities are plain `f64`s in full precision. Three unit domains exist
//! (volume in ml, weight in g, count in each); conversion only ever happens
//! inside one domain. Only display values are rounded.

pub mod convert;
pub mod parse;
pub mod unit;

pub use convert::{
    ConversionError, base_to_purchase, convert, format_quantity, purchase_to_base,
    round_for_display,
};
pub use parse::{Interpretation, ParsedQuantity, parse_quantity};
pub use unit::{
    UnitCategory, UnitDef, UnitTable, normalize_unit, same_unit, standard_units, unit_category,
};
