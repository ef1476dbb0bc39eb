use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, domain_id};
use larder_units::parse_quantity;

use crate::ingredient::{Ingredient, IngredientId};

domain_id!(
    /// Physical count identifier.
    CountId
);

/// A validated physical count, in the ingredient's base unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCount {
    pub id: CountId,
    pub ingredient_id: IngredientId,
    pub quantity: f64,
    #[serde(default)]
    pub quantity_raw: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub counted_at: DateTime<Utc>,
}

/// A count as submitted by a person: a number, free text, or both.
///
/// When both are present the number wins and the text is kept for the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountSubmission {
    pub ingredient_id: IngredientId,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub quantity_raw: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub counted_at: DateTime<Utc>,
}

impl CountSubmission {
    pub fn new(ingredient_id: IngredientId, quantity: f64, counted_at: DateTime<Utc>) -> Self {
        Self {
            ingredient_id,
            quantity: Some(quantity),
            quantity_raw: None,
            note: None,
            counted_at,
        }
    }

    pub fn from_text(
        ingredient_id: IngredientId,
        quantity_raw: impl Into<String>,
        counted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ingredient_id,
            quantity: None,
            quantity_raw: Some(quantity_raw.into()),
            note: None,
            counted_at,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Boundary validation: resolve the quantity in base units and reject
    /// malformed, negative or non-finite values.
    pub fn validate(self, ingredient: &Ingredient) -> DomainResult<InventoryCount> {
        if ingredient.id != self.ingredient_id {
            return Err(DomainError::invariant("count submitted against a different ingredient"));
        }

        let raw = self
            .quantity_raw
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let quantity = match (self.quantity, raw.as_deref()) {
            (Some(q), _) => q,
            (None, Some(text)) => {
                parse_quantity(
                    text,
                    &ingredient.base_unit,
                    ingredient.purchase_unit.as_deref(),
                    ingredient.purchase_unit_quantity,
                )
                .ok_or_else(|| DomainError::validation(format!("malformed quantity: '{text}'")))?
                .quantity
            }
            (None, None) => return Err(DomainError::validation("count quantity is required")),
        };

        if !quantity.is_finite() {
            return Err(DomainError::validation("count quantity must be a finite number"));
        }
        if quantity < 0.0 {
            return Err(DomainError::validation("count quantity cannot be negative"));
        }

        Ok(InventoryCount {
            id: CountId::new(),
            ingredient_id: self.ingredient_id,
            quantity,
            quantity_raw: raw,
            note: self.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            counted_at: self.counted_at,
        })
    }
}
