use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use larder_core::{DomainError, Entity};
use larder_inventory::{AlertEvent, Ingredient, IngredientId, InventoryAlert, InventoryCount};
use larder_recipes::{PrepRecipe, Recipe, RecipeGraph, SalesAggregate};

use super::r#trait::{
    CommitOutcome, IngredientUpdate, InventorySnapshot, InventoryStore, PassCommit, StoreError,
};

/// Serialized store contents, as loaded from a JSON snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub prep_recipes: Vec<PrepRecipe>,
    #[serde(default)]
    pub sales: Vec<SalesAggregate>,
    #[serde(default)]
    pub counts: Vec<InventoryCount>,
    #[serde(default)]
    pub alerts: Vec<InventoryAlert>,
}

#[derive(Debug, Default)]
struct State {
    ingredients: BTreeMap<IngredientId, Ingredient>,
    recipes: Vec<Recipe>,
    prep_recipes: Vec<PrepRecipe>,
    sales: Vec<SalesAggregate>,
    counts: Vec<InventoryCount>,
    alerts: Vec<InventoryAlert>,
}

impl State {
    fn open_alert_mut(&mut self, id: IngredientId) -> Option<&mut InventoryAlert> {
        self.alerts
            .iter_mut()
            .find(|a| a.ingredient_id == id && !a.resolved)
    }

    fn open_alert_id(&self, id: IngredientId) -> Option<larder_inventory::AlertId> {
        self.alerts
            .iter()
            .find(|a| a.ingredient_id == id && !a.resolved)
            .map(|a| a.id)
    }

    /// Whether `update` can be written on top of what is stored now.
    fn is_current(&self, update: &IngredientUpdate) -> bool {
        let Some(stored) = self.ingredients.get(&update.ingredient_id) else {
            return false;
        };
        if stored.last_counted_at != update.based_on_count_at {
            return false;
        }
        // A result derived from a newer count wins over any trigger time.
        if stored.derivation_key() > (update.based_on_count_at, Some(update.computed_at)) {
            return false;
        }

        let mut open = self.open_alert_id(update.ingredient_id);
        for event in &update.alert_events {
            match event {
                AlertEvent::AlertResolved(e) if open == Some(e.alert_id) => open = None,
                AlertEvent::AlertOpened(e) if open.is_none() => open = Some(e.alert_id),
                _ => return false,
            }
        }
        true
    }

    fn apply_alert_event(&mut self, event: &AlertEvent) {
        match event {
            AlertEvent::AlertOpened(e) => self.alerts.push(InventoryAlert {
                id: e.alert_id,
                ingredient_id: e.ingredient_id,
                alert_type: e.alert_type,
                resolved: false,
                created_at: e.occurred_at,
                resolved_at: None,
            }),
            AlertEvent::AlertResolved(e) => {
                if let Some(open) = self.open_alert_mut(e.ingredient_id) {
                    open.resolved = true;
                    open.resolved_at = Some(e.occurred_at);
                }
            }
        }
    }
}

/// In-memory inventory store.
///
/// Intended for tests, dev and the snapshot runner. One `RwLock` guards all
/// data, so every commit is trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Result<Self, StoreError> {
        let store = Self::new();
        {
            let mut state = store.write()?;
            for ingredient in seed.ingredients {
                validate_ingredient(&ingredient)?;
                state.ingredients.insert(ingredient.id, ingredient);
            }
            RecipeGraph::build(&seed.recipes, &seed.prep_recipes, HashMap::new())?;
            state.recipes = seed.recipes;
            state.prep_recipes = seed.prep_recipes;
            state.sales = seed.sales;
            state.counts = seed.counts;

            let mut open = HashSet::new();
            for alert in &seed.alerts {
                if !alert.resolved && !open.insert(alert.ingredient_id) {
                    return Err(StoreError::Snapshot(format!(
                        "more than one open alert for ingredient {}",
                        alert.ingredient_id
                    )));
                }
            }
            state.alerts = seed.alerts;
        }
        Ok(store)
    }

    /// Load a store from a JSON snapshot document (see [`StoreSeed`]).
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let seed: StoreSeed =
            serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Self::from_seed(seed)
    }

    /// Create or redefine an ingredient.
    ///
    /// Redefining keeps the stored count and derived fields; those change only
    /// through counts and recalculation.
    pub fn upsert_ingredient(&self, ingredient: Ingredient) -> Result<(), StoreError> {
        validate_ingredient(&ingredient)?;
        let mut state = self.write()?;
        match state.ingredients.get_mut(&ingredient.id) {
            Some(existing) => {
                existing.name = ingredient.name;
                existing.category = ingredient.category;
                existing.base_unit = ingredient.base_unit;
                existing.purchase_unit = ingredient.purchase_unit;
                existing.purchase_unit_quantity = ingredient.purchase_unit_quantity;
                existing.par_level = ingredient.par_level;
            }
            None => {
                state.ingredients.insert(ingredient.id, ingredient);
            }
        }
        Ok(())
    }

    /// Create or redefine a recipe. A menu item name already used by another
    /// recipe is rejected, so sales rows keep resolving to one recipe.
    pub fn upsert_recipe(&self, recipe: Recipe) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let mut recipes = state.recipes.clone();
        match recipes.iter_mut().find(|r| r.same_entity(&recipe)) {
            Some(existing) => *existing = recipe,
            None => recipes.push(recipe),
        }
        RecipeGraph::build(&recipes, &state.prep_recipes, HashMap::new())?;
        state.recipes = recipes;
        Ok(())
    }

    pub fn upsert_prep_recipe(&self, prep: PrepRecipe) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.prep_recipes.iter_mut().find(|p| p.same_entity(&prep)) {
            Some(existing) => *existing = prep,
            None => state.prep_recipes.push(prep),
        }
        Ok(())
    }

    pub fn record_sales(&self, rows: impl IntoIterator<Item = SalesAggregate>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.sales.extend(rows);
        Ok(())
    }

    /// Delete an ingredient no recipe or prep recipe refers to.
    pub fn remove_ingredient(&self, id: IngredientId) -> Result<Ingredient, StoreError> {
        let mut state = self.write()?;
        if !state.ingredients.contains_key(&id) {
            return Err(StoreError::NotFound(format!("ingredient {id}")));
        }
        let graph = RecipeGraph::build(&state.recipes, &state.prep_recipes, HashMap::new())?;
        if graph.is_ingredient_referenced(id) {
            return Err(StoreError::Conflict(format!(
                "ingredient {id} is still used by a recipe"
            )));
        }
        state
            .ingredients
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ingredient {id}")))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

fn validate_ingredient(ingredient: &Ingredient) -> Result<(), DomainError> {
    if ingredient.name.trim().is_empty() {
        return Err(DomainError::validation("ingredient name cannot be empty"));
    }
    if ingredient.base_unit.trim().is_empty() {
        return Err(DomainError::validation("ingredient base unit cannot be empty"));
    }
    if ingredient.par_level.is_some_and(|p| !p.is_finite()) {
        return Err(DomainError::validation("par level must be a finite number"));
    }
    Ok(())
}

impl InventoryStore for InMemoryInventoryStore {
    fn load_snapshot(&self) -> Result<InventorySnapshot, StoreError> {
        let state = self.read()?;
        Ok(InventorySnapshot {
            ingredients: state.ingredients.values().cloned().collect(),
            recipes: state.recipes.clone(),
            prep_recipes: state.prep_recipes.clone(),
            open_alerts: state.alerts.iter().filter(|a| !a.resolved).cloned().collect(),
        })
    }

    fn ingredient(&self, id: IngredientId) -> Result<Ingredient, StoreError> {
        self.read()?
            .ingredients
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ingredient {id}")))
    }

    fn sales_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SalesAggregate>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<SalesAggregate> = state
            .sales
            .iter()
            .filter(|s| s.sold_at <= until && since.is_none_or(|since| s.sold_at > since))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.sold_at);
        Ok(rows)
    }

    fn commit_pass(&self, commit: PassCommit) -> Result<CommitOutcome, StoreError> {
        let mut state = self.write()?;

        // Validate the whole batch before touching anything.
        for count in &commit.counts {
            if !state.ingredients.contains_key(&count.ingredient_id) {
                return Err(StoreError::NotFound(format!("ingredient {}", count.ingredient_id)));
            }
            if !(count.quantity.is_finite() && count.quantity >= 0.0) {
                return Err(StoreError::InvalidCommit(format!(
                    "count for {} has quantity {}",
                    count.ingredient_id, count.quantity
                )));
            }
        }
        let mut seen = HashSet::new();
        for update in &commit.updates {
            if !state.ingredients.contains_key(&update.ingredient_id) {
                return Err(StoreError::NotFound(format!("ingredient {}", update.ingredient_id)));
            }
            if !seen.insert(update.ingredient_id) {
                return Err(StoreError::InvalidCommit(format!(
                    "ingredient {} updated twice in one pass",
                    update.ingredient_id
                )));
            }
            if update.expected_quantity.is_some_and(|q| !q.is_finite()) {
                return Err(StoreError::InvalidCommit(format!(
                    "non-finite expected quantity for {}",
                    update.ingredient_id
                )));
            }
            if update
                .alert_events
                .iter()
                .any(|e| e.ingredient_id() != update.ingredient_id)
            {
                return Err(StoreError::InvalidCommit(format!(
                    "alert event for another ingredient in update of {}",
                    update.ingredient_id
                )));
            }
        }

        for count in commit.counts {
            if let Some(ingredient) = state.ingredients.get_mut(&count.ingredient_id) {
                if !ingredient.apply_count(&count) {
                    debug!(ingredient_id = %count.ingredient_id, counted_at = %count.counted_at, "older count kept in history only");
                }
            }
            state.counts.push(count);
        }

        let mut outcome = CommitOutcome::default();
        for update in commit.updates {
            if !state.is_current(&update) {
                info!(ingredient_id = %update.ingredient_id, "stale update skipped");
                outcome.stale.push(update.ingredient_id);
                continue;
            }
            if let Some(ingredient) = state.ingredients.get_mut(&update.ingredient_id) {
                ingredient.expected_quantity = update.expected_quantity;
                ingredient.recalculated_at = Some(update.computed_at);
                ingredient.recalculated_from_count_at = update.based_on_count_at;
            }
            for event in &update.alert_events {
                state.apply_alert_event(event);
            }
            outcome.applied.push(update.ingredient_id);
        }

        Ok(outcome)
    }

    fn alerts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryAlert>, StoreError> {
        Ok(self
            .read()?
            .alerts
            .iter()
            .filter(|a| a.ingredient_id == ingredient_id)
            .cloned()
            .collect())
    }

    fn counts(&self, ingredient_id: IngredientId) -> Result<Vec<InventoryCount>, StoreError> {
        Ok(self
            .read()?
            .counts
            .iter()
            .filter(|c| c.ingredient_id == ingredient_id)
            .cloned()
            .collect())
    }
}
