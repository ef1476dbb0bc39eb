//! Recalculation pipeline: the single writer behind every trigger.
//!
//! ```text
//! Trigger (manual count | sales sync | stock webhook)
//!   ↓
//! 1. Take the pass lock (one pass at a time)
//!   ↓
//! 2. Load one snapshot; validate the count, if any
//!   ↓
//! 3. Build the recipe graph; aggregate depletion since each count
//!   ↓
//! 4. Reconcile expected quantities; decide alert transitions (pure)
//!   ↓
//! 5. Commit counts, quantities and alerts in one atomic call
//!   ↓
//! 6. Publish alert events for the updates that were applied
//! ```
//!
//! Soft problems (unit mismatches, cycles, unmatched sales, uncounted
//! ingredients) are counted in [`PassDiagnostics`] and never abort the pass.
//! Store failures abort it with nothing written. Publication runs only after a
//! successful commit, so a publish error means the data is already durable
//! (at-least-once: re-running the pass will not re-emit, since the alert state
//! already moved).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use larder_core::{Aggregate, DomainError};
use larder_events::{EventBus, EventEnvelope};
use larder_inventory::{
    AlertEvent, AlertId, CountSubmission, EvaluateStock, Ingredient, IngredientId, InventoryCount,
    StockAlerts, reconcile,
};
use larder_recipes::{DepletionAggregator, RecipeGraph, SalesAggregate};

use crate::config::EngineConfig;
use crate::store::{IngredientUpdate, InventorySnapshot, InventoryStore, PassCommit, StoreError};

/// Aggregate type stamped on published alert envelopes.
pub const ALERT_AGGREGATE_TYPE: &str = "inventory.stock_alerts";

pub type AlertEnvelope = EventEnvelope<AlertEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    ManualCount,
    SalesSync,
    StockWebhook,
}

/// What started a pass and when. `at` bounds the sales window and orders
/// writes in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(kind: TriggerKind, at: DateTime<Utc>) -> Self {
        Self { kind, at }
    }

    pub fn now(kind: TriggerKind) -> Self {
        Self::new(kind, Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Only(Vec<IngredientId>),
}

/// Counters reported for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassDiagnostics {
    /// Ingredients whose stored expected quantity changed.
    pub ingredients_updated: usize,
    pub alerts_created: usize,
    pub alerts_resolved: usize,
    pub unmatched_sales: usize,
    pub cycles_detected: usize,
    pub unit_errors: usize,
    /// Never counted, non-finite result or inconsistent alert state.
    pub ingredients_skipped: usize,
    /// Updates the store refused because newer state was already written.
    pub stale_skipped: usize,
}

/// Result of a manual count submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountReceipt {
    pub count: InventoryCount,
    /// Whether the count became the ingredient's ground truth (false for a
    /// count older than the one already recorded).
    pub became_ground_truth: bool,
    pub diagnostics: PassDiagnostics,
}

#[derive(Debug, Error)]
pub enum RecalcError {
    /// The submission or scope was rejected before anything was written.
    #[error("input rejected: {0}")]
    Input(DomainError),

    #[error("recipe data is inconsistent: {0}")]
    Graph(DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The pass is committed; only publication failed.
    #[error("alert publication failed after commit: {0}")]
    Publish(String),

    #[error("recalculation lock poisoned")]
    Poisoned,
}

struct Plan {
    updates: Vec<IngredientUpdate>,
    changed: HashSet<IngredientId>,
    diagnostics: PassDiagnostics,
}

/// Serializes recalculation passes and owns the write path to the store.
#[derive(Debug)]
pub struct RecalculationHandler<S, B> {
    store: S,
    bus: B,
    config: EngineConfig,
    // Pass lock; the value is the last published envelope sequence number.
    pass_lock: Mutex<u64>,
}

impl<S, B> RecalculationHandler<S, B> {
    pub fn new(store: S, bus: B, config: EngineConfig) -> Self {
        Self {
            store,
            bus,
            config,
            pass_lock: Mutex::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<S, B> RecalculationHandler<S, B>
where
    S: InventoryStore,
    B: EventBus<AlertEnvelope>,
{
    /// Recompute expected quantities and alerts for `scope`.
    pub fn recalculate(&self, trigger: Trigger, scope: Scope) -> Result<PassDiagnostics, RecalcError> {
        let mut sequence = self.pass_lock.lock().map_err(|_| RecalcError::Poisoned)?;
        let snapshot = self.store.load_snapshot()?;
        self.run_pass(&mut sequence, &snapshot, trigger, &scope, Vec::new())
    }

    /// Record a physical count and recompute that ingredient.
    ///
    /// The count and the recomputed state are committed together.
    pub fn submit_count(
        &self,
        submission: CountSubmission,
        trigger_at: DateTime<Utc>,
    ) -> Result<CountReceipt, RecalcError> {
        let mut sequence = self.pass_lock.lock().map_err(|_| RecalcError::Poisoned)?;
        let mut snapshot = self.store.load_snapshot()?;

        let ingredient_id = submission.ingredient_id;
        let ingredient = snapshot
            .ingredients
            .iter_mut()
            .find(|i| i.id == ingredient_id)
            .ok_or_else(|| RecalcError::Input(DomainError::not_found(format!("ingredient {ingredient_id}"))))?;

        let count = submission.validate(ingredient).map_err(RecalcError::Input)?;
        let became_ground_truth = ingredient.apply_count(&count);
        if !became_ground_truth {
            info!(%ingredient_id, counted_at = %count.counted_at, "count is older than the recorded one; kept in history");
        }

        let diagnostics = self.run_pass(
            &mut sequence,
            &snapshot,
            Trigger::new(TriggerKind::ManualCount, trigger_at),
            &Scope::Only(vec![ingredient_id]),
            vec![count.clone()],
        )?;

        Ok(CountReceipt {
            count,
            became_ground_truth,
            diagnostics,
        })
    }

    fn run_pass(
        &self,
        sequence: &mut u64,
        snapshot: &InventorySnapshot,
        trigger: Trigger,
        scope: &Scope,
        counts: Vec<InventoryCount>,
    ) -> Result<PassDiagnostics, RecalcError> {
        let targets = select_targets(snapshot, scope)?;

        let since = targets.iter().filter_map(|i| i.last_counted_at).min();
        let sales = match since {
            Some(since) => self.store.sales_between(Some(since), trigger.at)?,
            None => Vec::new(),
        };

        let plan = plan_pass(snapshot, &targets, &sales, trigger, &self.config)?;
        let outcome = self.store.commit_pass(PassCommit {
            counts,
            updates: plan.updates.clone(),
        })?;

        let mut diagnostics = plan.diagnostics;
        diagnostics.stale_skipped = outcome.stale.len();

        let applied: HashSet<IngredientId> = outcome.applied.iter().copied().collect();
        let committed: Vec<&IngredientUpdate> = plan
            .updates
            .iter()
            .filter(|u| applied.contains(&u.ingredient_id))
            .collect();

        for update in &committed {
            if plan.changed.contains(&update.ingredient_id) {
                diagnostics.ingredients_updated += 1;
            }
            for event in &update.alert_events {
                match event {
                    AlertEvent::AlertOpened(_) => diagnostics.alerts_created += 1,
                    AlertEvent::AlertResolved(_) => diagnostics.alerts_resolved += 1,
                }
            }
        }

        info!(
            trigger = ?trigger.kind,
            at = %trigger.at,
            ingredients_updated = diagnostics.ingredients_updated,
            alerts_created = diagnostics.alerts_created,
            alerts_resolved = diagnostics.alerts_resolved,
            unmatched_sales = diagnostics.unmatched_sales,
            cycles_detected = diagnostics.cycles_detected,
            unit_errors = diagnostics.unit_errors,
            ingredients_skipped = diagnostics.ingredients_skipped,
            stale_skipped = diagnostics.stale_skipped,
            "recalculation pass committed"
        );

        if self.config.publish_alerts {
            for update in committed {
                for event in &update.alert_events {
                    *sequence += 1;
                    let envelope = EventEnvelope::seal(
                        event.clone(),
                        update.ingredient_id.aggregate_id(),
                        ALERT_AGGREGATE_TYPE,
                        *sequence,
                    );
                    self.bus
                        .publish(envelope)
                        .map_err(|e| RecalcError::Publish(format!("{e:?}")))?;
                }
            }
        }

        Ok(diagnostics)
    }
}

fn select_targets<'s>(snapshot: &'s InventorySnapshot, scope: &Scope) -> Result<Vec<&'s Ingredient>, RecalcError> {
    match scope {
        Scope::All => Ok(snapshot.ingredients.iter().collect()),
        Scope::Only(ids) => {
            let mut seen = HashSet::new();
            ids.iter()
                .filter(|id| seen.insert(**id))
                .map(|id| {
                    snapshot
                        .ingredient(*id)
                        .ok_or_else(|| RecalcError::Input(DomainError::not_found(format!("ingredient {id}"))))
                })
                .collect()
        }
    }
}

/// Decide every write of the pass from one snapshot. No IO.
fn plan_pass(
    snapshot: &InventorySnapshot,
    targets: &[&Ingredient],
    sales: &[SalesAggregate],
    trigger: Trigger,
    config: &EngineConfig,
) -> Result<Plan, RecalcError> {
    let units: HashMap<IngredientId, String> = snapshot
        .ingredients
        .iter()
        .map(|i| (i.id, i.base_unit.clone()))
        .collect();
    let graph = RecipeGraph::build(&snapshot.recipes, &snapshot.prep_recipes, units)
        .map_err(RecalcError::Graph)?;

    let counted_at: HashMap<IngredientId, DateTime<Utc>> = targets
        .iter()
        .filter(|i| i.is_counted())
        .filter_map(|i| i.last_counted_at.map(|at| (i.id, at)))
        .collect();

    let mut aggregator = DepletionAggregator::new(&graph, config.name_matching);
    let report = aggregator.since_counts(sales, trigger.at, &counted_at);
    let expansion = aggregator.into_diagnostics();

    let mut diagnostics = PassDiagnostics {
        unmatched_sales: report.unmatched_sales.len(),
        cycles_detected: expansion.iter().filter(|d| d.is_cycle()).count(),
        unit_errors: expansion.iter().filter(|d| d.is_unit_error()).count(),
        ..PassDiagnostics::default()
    };

    let mut updates = Vec::with_capacity(targets.len());
    let mut changed = HashSet::new();

    for ingredient in targets {
        let id = ingredient.id;
        let Some(expected) = reconcile(ingredient, report.depletion_of(id)) else {
            debug!(ingredient_id = %id, "never counted; expected quantity unknown");
            diagnostics.ingredients_skipped += 1;
            continue;
        };
        if !expected.is_finite() {
            warn!(ingredient_id = %id, expected, "non-finite expected quantity");
            diagnostics.ingredients_skipped += 1;
            continue;
        }

        let alerts = match StockAlerts::rehydrate(id, snapshot.open_alert(id).cloned()) {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(ingredient_id = %id, error = %e, "stored alert state is inconsistent");
                diagnostics.ingredients_skipped += 1;
                continue;
            }
        };
        let alert_events = match alerts.handle(&EvaluateStock {
            ingredient_id: id,
            expected_quantity: Some(expected),
            par_level: ingredient.par_level,
            alert_id: AlertId::new(),
            evaluated_at: trigger.at,
        }) {
            Ok(events) => events,
            Err(e) => {
                warn!(ingredient_id = %id, error = %e, "alert evaluation rejected");
                diagnostics.ingredients_skipped += 1;
                continue;
            }
        };

        debug!(
            ingredient_id = %id,
            name = %ingredient.name,
            expected,
            alert_events = alert_events.len(),
            "ingredient reconciled"
        );

        if ingredient.expected_quantity != Some(expected) {
            changed.insert(id);
        }
        updates.push(IngredientUpdate {
            ingredient_id: id,
            expected_quantity: Some(expected),
            computed_at: trigger.at,
            based_on_count_at: ingredient.last_counted_at,
            alert_events,
        });
    }

    Ok(Plan {
        updates,
        changed,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use larder_inventory::AlertType;
    use larder_recipes::{Component, Recipe, RecipeId};

    fn t(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn snapshot() -> (InventorySnapshot, IngredientId, IngredientId) {
        let vodka = Ingredient::new(IngredientId::new(), "Vodka", "ml")
            .with_par_level(500.0)
            .with_last_count(1500.0, t(0));
        let olive = Ingredient::new(IngredientId::new(), "Olive", "each");
        let recipe = Recipe::new(RecipeId::new(), "Martini")
            .with_component(Component::ingredient(vodka.id, 60.0, "ml"))
            .with_component(Component::ingredient(olive.id, 1.0, "each"));
        let snapshot = InventorySnapshot {
            ingredients: vec![vodka.clone(), olive.clone()],
            recipes: vec![recipe],
            prep_recipes: vec![],
            open_alerts: vec![],
        };
        (snapshot, vodka.id, olive.id)
    }

    #[test]
    fn plan_reconciles_counted_and_skips_uncounted() {
        let (snapshot, vodka, _) = snapshot();
        let targets = select_targets(&snapshot, &Scope::All).unwrap();
        let sales = vec![SalesAggregate::new("Martini", 20.0, t(2))];
        let trigger = Trigger::new(TriggerKind::SalesSync, t(3));

        let plan = plan_pass(&snapshot, &targets, &sales, trigger, &EngineConfig::default()).unwrap();

        assert_eq!(plan.updates.len(), 1);
        let update = &plan.updates[0];
        assert_eq!(update.ingredient_id, vodka);
        assert_eq!(update.expected_quantity, Some(300.0));
        assert_eq!(update.computed_at, t(3));
        assert!(matches!(
            &update.alert_events[..],
            [AlertEvent::AlertOpened(e)] if e.alert_type == AlertType::LowStock
        ));
        assert_eq!(plan.diagnostics.ingredients_skipped, 1);
        assert!(plan.changed.contains(&vodka));
    }

    #[test]
    fn unknown_ingredient_in_scope_is_an_input_error() {
        let (snapshot, vodka, _) = snapshot();
        let result = select_targets(&snapshot, &Scope::Only(vec![vodka, IngredientId::new()]));
        assert!(matches!(result, Err(RecalcError::Input(DomainError::NotFound(_)))));

        let deduped = select_targets(&snapshot, &Scope::Only(vec![vodka, vodka])).unwrap();
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn duplicate_menu_names_fail_the_pass() {
        let (mut snapshot, _, _) = snapshot();
        let copy = Recipe::new(RecipeId::new(), "Martini");
        snapshot.recipes.push(copy);
        let targets = select_targets(&snapshot, &Scope::All).unwrap();

        let result = plan_pass(
            &snapshot,
            &targets,
            &[],
            Trigger::new(TriggerKind::StockWebhook, t(1)),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(RecalcError::Graph(_))));
    }
}
