use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{Entity, domain_id};
use larder_units::base_to_purchase;

use crate::count::InventoryCount;

domain_id!(
    /// Ingredient identifier.
    IngredientId
);

/// A raw ingredient tracked in its base unit.
///
/// `last_counted_*` is ground truth from physical counts. `expected_quantity` is
/// derived by recalculation and never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub base_unit: String,
    #[serde(default)]
    pub purchase_unit: Option<String>,
    #[serde(default)]
    pub purchase_unit_quantity: Option<f64>,
    #[serde(default)]
    pub par_level: Option<f64>,
    #[serde(default)]
    pub last_counted_quantity: Option<f64>,
    #[serde(default)]
    pub last_counted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_quantity: Option<f64>,
    /// Trigger time of the recalculation that produced `expected_quantity`.
    #[serde(default)]
    pub recalculated_at: Option<DateTime<Utc>>,
    /// `last_counted_at` of the count `expected_quantity` was derived from.
    #[serde(default)]
    pub recalculated_from_count_at: Option<DateTime<Utc>>,
}

impl Ingredient {
    pub fn new(id: IngredientId, name: impl Into<String>, base_unit: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: None,
            base_unit: base_unit.into(),
            purchase_unit: None,
            purchase_unit_quantity: None,
            par_level: None,
            last_counted_quantity: None,
            last_counted_at: None,
            expected_quantity: None,
            recalculated_at: None,
            recalculated_from_count_at: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_purchase_unit(mut self, unit: impl Into<String>, base_units_per_purchase: f64) -> Self {
        self.purchase_unit = Some(unit.into());
        self.purchase_unit_quantity = Some(base_units_per_purchase);
        self
    }

    pub fn with_par_level(mut self, par_level: f64) -> Self {
        self.par_level = Some(par_level);
        self
    }

    /// Seed ground truth directly (imports, fixtures).
    pub fn with_last_count(mut self, quantity: f64, counted_at: DateTime<Utc>) -> Self {
        self.last_counted_quantity = Some(quantity);
        self.last_counted_at = Some(counted_at);
        self
    }

    /// Counted means both the quantity and its timestamp are known.
    pub fn is_counted(&self) -> bool {
        self.last_counted_quantity.is_some() && self.last_counted_at.is_some()
    }

    /// Make `count` the new ground truth unless a newer count is already recorded.
    ///
    /// Returns whether the count was applied. Older counts still belong in the
    /// count history; they just do not replace a newer observation.
    pub fn apply_count(&mut self, count: &InventoryCount) -> bool {
        if let Some(current) = self.last_counted_at {
            if count.counted_at < current {
                return false;
            }
        }
        self.last_counted_quantity = Some(count.quantity);
        self.last_counted_at = Some(count.counted_at);
        true
    }

    /// Ordering key of the stored derived state: newer count first, then newer trigger.
    pub fn derivation_key(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.recalculated_from_count_at, self.recalculated_at)
    }

    /// Expected quantity expressed in purchase units, when a multiplier is set.
    ///
    /// Without a usable multiplier this is the base-unit value (see
    /// [`larder_units::base_to_purchase`]).
    pub fn expected_in_purchase_units(&self) -> Option<f64> {
        let expected = self.expected_quantity?;
        let per_purchase = self.purchase_unit_quantity.unwrap_or(0.0);
        Some(base_to_purchase(expected, per_purchase))
    }
}

impl Entity for Ingredient {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
