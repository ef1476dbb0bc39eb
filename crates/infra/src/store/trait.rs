use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::DomainError;
use larder_inventory::{AlertEvent, Ingredient, IngredientId, InventoryAlert, InventoryCount};
use larder_recipes::{PrepRecipe, Recipe, SalesAggregate};

/// Everything one recalculation pass reads, taken at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub ingredients: Vec<Ingredient>,
    pub recipes: Vec<Recipe>,
    pub prep_recipes: Vec<PrepRecipe>,
    /// Unresolved alerts only.
    pub open_alerts: Vec<InventoryAlert>,
}

impl InventorySnapshot {
    pub fn ingredient(&self, id: IngredientId) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    pub fn open_alert(&self, id: IngredientId) -> Option<&InventoryAlert> {
        self.open_alerts.iter().find(|a| a.ingredient_id == id)
    }
}

/// The derived state of one ingredient produced by a pass.
///
/// The expected quantity and the alert transition travel together so they are
/// written (or skipped) as a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientUpdate {
    pub ingredient_id: IngredientId,
    pub expected_quantity: Option<f64>,
    /// Trigger time of the pass that computed this update.
    pub computed_at: DateTime<Utc>,
    /// `last_counted_at` of the ingredient the update was computed from.
    pub based_on_count_at: Option<DateTime<Utc>>,
    pub alert_events: Vec<AlertEvent>,
}

/// All writes of one pass. Committed atomically; counts are applied first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassCommit {
    pub counts: Vec<InventoryCount>,
    pub updates: Vec<IngredientUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub applied: Vec<IngredientId>,
    /// Updates refused because newer state was already stored.
    pub stale: Vec<IngredientId>,
}

/// Store operation error.
///
/// These are infrastructure failures; any of them aborts the pass with no
/// partial effect.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("snapshot could not be read: {0}")]
    Snapshot(String),

    #[error("domain rule rejected the data: {0}")]
    Domain(#[from] DomainError),

    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Boundary to the transactional store holding ingredients, recipes, counts,
/// sales and alerts.
///
/// ## Commit semantics
///
/// `commit_pass` must be atomic: either every count and every non-stale
/// update becomes visible, or (on error) nothing does. Implementations refuse
/// an update, reporting it in [`CommitOutcome::stale`], when
///
/// - the ingredient's `last_counted_at` (after this commit's counts) differs
///   from `based_on_count_at`, or
/// - the stored value is newer: derived from a later count, or from the same
///   count with a later `recalculated_at` than the update's `computed_at`, or
/// - its alert events do not fit the stored open alert.
pub trait InventoryStore: Send + Sync {
    fn load_snapshot(&self) -> Result<InventorySnapshot, StoreError>;

    fn ingredient(&self, id: IngredientId) -> Result<Ingredient, StoreError>;

    /// Sales rows with `since < sold_at <= until`, ordered by `sold_at`.
    fn sales_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SalesAggregate>, StoreError>;

    fn commit_pass(&self, commit: PassCommit) -> Result<CommitOutcome, StoreError>;

    /// Alert history for one ingredient, oldest first.
    fn alerts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryAlert>, StoreError>;

    /// Count history for one ingredient, in submission order.
    fn counts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryCount>, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn load_snapshot(&self) -> Result<InventorySnapshot, StoreError> {
        (**self).load_snapshot()
    }

    fn ingredient(&self, id: IngredientId) -> Result<Ingredient, StoreError> {
        (**self).ingredient(id)
    }

    fn sales_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SalesAggregate>, StoreError> {
        (**self).sales_between(since, until)
    }

    fn commit_pass(&self, commit: PassCommit) -> Result<CommitOutcome, StoreError> {
        (**self).commit_pass(commit)
    }

    fn alerts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryAlert>, StoreError> {
        (**self).alerts(ingredient_id)
    }

    fn counts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryCount>, StoreError> {
        (**self).counts(ingredient_id)
    }
}
