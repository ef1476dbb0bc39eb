//! Inventory domain module.
//!
//! Ingredients and their physical counts, expected-quantity reconciliation and
//! the stock alert lifecycle, implemented purely as deterministic domain logic
//! (no IO, no storage).

pub mod alert;
pub mod count;
pub mod ingredient;
pub mod reconcile;

pub use alert::{
    AlertEvent, AlertId, AlertOpened, AlertResolved, AlertType, EvaluateStock, InventoryAlert,
    StockAlerts, classify,
};
pub use count::{CountId, CountSubmission, InventoryCount};
pub use ingredient::{Ingredient, IngredientId};
pub use reconcile::reconcile;
