//! Sales volume -> raw ingredient depletion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use larder_inventory::IngredientId;

use crate::expand::{BomExpander, ExpansionDiagnostic, IngredientUsage};
use crate::graph::{NameMatching, RecipeGraph, RecipeIdx};

/// Units of one menu item sold during a window ending at `sold_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesAggregate {
    pub menu_item_name: String,
    pub quantity_sold: f64,
    pub sold_at: DateTime<Utc>,
}

impl SalesAggregate {
    pub fn new(menu_item_name: impl Into<String>, quantity_sold: f64, sold_at: DateTime<Utc>) -> Self {
        Self {
            menu_item_name: menu_item_name.into(),
            quantity_sold,
            sold_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    UnknownItem,
    OffMenu,
    InvalidQuantity,
}

/// A sales row that could not be turned into depletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedSale {
    pub menu_item_name: String,
    pub quantity_sold: f64,
    pub sold_at: DateTime<Utc>,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepletionReport {
    pub by_ingredient: IngredientUsage,
    pub unmatched_sales: Vec<UnmatchedSale>,
}

impl DepletionReport {
    /// Depletion for one ingredient; zero when nothing was sold.
    pub fn depletion_of(&self, ingredient_id: IngredientId) -> f64 {
        self.by_ingredient.get(&ingredient_id).copied().unwrap_or(0.0)
    }
}

/// Multiplies sales by per-serving usage and sums per ingredient.
///
/// Holds the pass's [`BomExpander`], so each recipe is expanded at most once
/// however many sales rows name it.
#[derive(Debug)]
pub struct DepletionAggregator<'g> {
    expander: BomExpander<'g>,
    matching: NameMatching,
    per_serving: HashMap<RecipeIdx, IngredientUsage>,
}

impl<'g> DepletionAggregator<'g> {
    pub fn new(graph: &'g RecipeGraph, matching: NameMatching) -> Self {
        Self {
            expander: BomExpander::new(graph),
            matching,
            per_serving: HashMap::new(),
        }
    }

    pub fn diagnostics(&self) -> &[ExpansionDiagnostic] {
        self.expander.diagnostics()
    }

    pub fn into_diagnostics(self) -> Vec<ExpansionDiagnostic> {
        self.expander.into_diagnostics()
    }

    /// Depletion from rows with `since < sold_at <= until` (`since = None`
    /// means from the beginning).
    pub fn total_for_window(
        &mut self,
        sales: &[SalesAggregate],
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> DepletionReport {
        let mut report = DepletionReport::default();
        for row in sales {
            if row.sold_at > until || since.is_some_and(|s| row.sold_at <= s) {
                continue;
            }
            let Some(usage) = self.match_row(row, &mut report) else {
                continue;
            };
            for (id, per_serving) in usage {
                *report.by_ingredient.entry(*id).or_insert(0.0) += row.quantity_sold * per_serving;
            }
        }
        report
    }

    /// Depletion since each ingredient's own last count: a row counts toward an
    /// ingredient when `counted_at[ingredient] < sold_at <= until`.
    ///
    /// Ingredients missing from `counted_at` were never counted and get no entry.
    pub fn since_counts(
        &mut self,
        sales: &[SalesAggregate],
        until: DateTime<Utc>,
        counted_at: &HashMap<IngredientId, DateTime<Utc>>,
    ) -> DepletionReport {
        let mut report = DepletionReport::default();
        let Some(earliest) = counted_at.values().min().copied() else {
            return report;
        };

        for row in sales {
            if row.sold_at > until || row.sold_at <= earliest {
                continue;
            }
            let Some(usage) = self.match_row(row, &mut report) else {
                continue;
            };
            for (id, per_serving) in usage {
                let in_window = counted_at.get(id).is_some_and(|c| *c < row.sold_at);
                if in_window {
                    *report.by_ingredient.entry(*id).or_insert(0.0) += row.quantity_sold * per_serving;
                }
            }
        }
        report
    }

    fn match_row(&mut self, row: &SalesAggregate, report: &mut DepletionReport) -> Option<&IngredientUsage> {
        let graph = self.expander.graph();
        let reason = if !row.quantity_sold.is_finite() {
            Some(UnmatchedReason::InvalidQuantity)
        } else {
            match graph.find_by_name(&row.menu_item_name, self.matching) {
                None => Some(UnmatchedReason::UnknownItem),
                Some(idx) if !graph.recipe(idx).on_menu => Some(UnmatchedReason::OffMenu),
                Some(idx) => {
                    if !self.per_serving.contains_key(&idx) {
                        let usage = self.expander.expand(idx);
                        debug!(menu_item = %row.menu_item_name, ingredients = usage.len(), "recipe expanded");
                        self.per_serving.insert(idx, usage);
                    }
                    return self.per_serving.get(&idx);
                }
            }
        };

        if let Some(reason) = reason {
            warn!(menu_item = %row.menu_item_name, ?reason, "sales row not matched to an on-menu recipe");
            report.unmatched_sales.push(UnmatchedSale {
                menu_item_name: row.menu_item_name.clone(),
                quantity_sold: row.quantity_sold,
                sold_at: row.sold_at,
                reason,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, PrepRecipe, PrepRecipeId, Recipe, RecipeId};
    use chrono::{Duration, TimeZone};

    fn t(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    struct Bar {
        vodka: IngredientId,
        lime: IngredientId,
        graph: RecipeGraph,
    }

    fn bar() -> Bar {
        let vodka = IngredientId::new();
        let lime = IngredientId::new();
        let units = HashMap::from([(vodka, "ml".to_string()), (lime, "ml".to_string())]);
        let sour = PrepRecipe::new(PrepRecipeId::new(), "Sour mix", 500.0, "ml")
            .with_component(Component::ingredient(lime, 250.0, "ml"));
        let recipes = vec![
            Recipe::new(RecipeId::new(), "Vodka Soda").with_component(Component::ingredient(vodka, 45.0, "ml")),
            Recipe::new(RecipeId::new(), "Kamikaze")
                .with_component(Component::ingredient(vodka, 30.0, "ml"))
                .with_component(Component::prep(sour.id, 20.0, "ml")),
            Recipe::new(RecipeId::new(), "Cosmo").off_menu().with_component(Component::ingredient(vodka, 40.0, "ml")),
        ];
        let graph = RecipeGraph::build(&recipes, &[sour], units).unwrap();
        Bar { vodka, lime, graph }
    }

    #[test]
    fn sums_sales_times_usage_per_ingredient() {
        let bar = bar();
        let mut agg = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
        let sales = vec![
            SalesAggregate::new("Vodka Soda", 10.0, t(1)),
            SalesAggregate::new("Kamikaze", 5.0, t(2)),
        ];

        let report = agg.total_for_window(&sales, None, t(3));
        assert_eq!(report.depletion_of(bar.vodka), 450.0 + 150.0);
        assert_eq!(report.depletion_of(bar.lime), 5.0 * 10.0);
        assert!(report.unmatched_sales.is_empty());
    }

    #[test]
    fn window_bounds_are_exclusive_then_inclusive() {
        let bar = bar();
        let mut agg = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
        let sales = vec![
            SalesAggregate::new("Vodka Soda", 1.0, t(1)),
            SalesAggregate::new("Vodka Soda", 2.0, t(2)),
            SalesAggregate::new("Vodka Soda", 4.0, t(3)),
        ];

        let report = agg.total_for_window(&sales, Some(t(1)), t(2));
        assert_eq!(report.depletion_of(bar.vodka), 90.0);
    }

    #[test]
    fn unmatched_rows_are_reported_not_fatal() {
        let bar = bar();
        let mut agg = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
        let sales = vec![
            SalesAggregate::new("vodka soda", 1.0, t(1)),
            SalesAggregate::new("Cosmo", 3.0, t(1)),
            SalesAggregate::new("Vodka Soda", f64::NAN, t(1)),
            SalesAggregate::new("Vodka Soda", 2.0, t(1)),
        ];

        let report = agg.total_for_window(&sales, None, t(2));
        assert_eq!(report.depletion_of(bar.vodka), 90.0);
        let reasons: Vec<_> = report.unmatched_sales.iter().map(|u| u.reason).collect();
        assert_eq!(
            reasons,
            vec![
                UnmatchedReason::UnknownItem,
                UnmatchedReason::OffMenu,
                UnmatchedReason::InvalidQuantity
            ]
        );

        let mut lenient = DepletionAggregator::new(&bar.graph, NameMatching::CaseInsensitive);
        let report = lenient.total_for_window(&sales[..1], None, t(2));
        assert_eq!(report.depletion_of(bar.vodka), 45.0);
    }

    #[test]
    fn since_counts_uses_each_ingredients_own_window() {
        let bar = bar();
        let mut agg = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
        let sales = vec![
            SalesAggregate::new("Kamikaze", 1.0, t(1)),
            SalesAggregate::new("Kamikaze", 2.0, t(3)),
        ];
        // Vodka counted at t(0), lime counted at t(2).
        let counted = HashMap::from([(bar.vodka, t(0)), (bar.lime, t(2))]);

        let report = agg.since_counts(&sales, t(4), &counted);
        assert_eq!(report.depletion_of(bar.vodka), 90.0);
        assert_eq!(report.depletion_of(bar.lime), 20.0);

        // A sale stamped exactly at the count instant is already in the count.
        let counted = HashMap::from([(bar.vodka, t(3))]);
        let report = agg.since_counts(&sales, t(4), &counted);
        assert_eq!(report.depletion_of(bar.vodka), 0.0);
        assert!(!report.by_ingredient.contains_key(&bar.lime));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: aggregation is deterministic and linear in quantity sold.
            #[test]
            fn deterministic_and_linear(qtys in proptest::collection::vec(0u32..500, 1..20)) {
                let bar = bar();
                let sales: Vec<_> = qtys
                    .iter()
                    .enumerate()
                    .map(|(i, q)| SalesAggregate::new(
                        if i % 2 == 0 { "Vodka Soda" } else { "Kamikaze" },
                        f64::from(*q),
                        t(1),
                    ))
                    .collect();

                let mut a = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
                let mut b = DepletionAggregator::new(&bar.graph, NameMatching::Exact);
                let first = a.total_for_window(&sales, None, t(2));
                let second = b.total_for_window(&sales, None, t(2));
                prop_assert_eq!(&first, &second);

                let doubled: Vec<_> = sales
                    .iter()
                    .map(|s| SalesAggregate::new(s.menu_item_name.clone(), s.quantity_sold * 2.0, s.sold_at))
                    .collect();
                let twice = a.total_for_window(&doubled, None, t(2));
                let expected = 2.0 * first.depletion_of(bar.vodka);
                prop_assert!((twice.depletion_of(bar.vodka) - expected).abs() < 1e-6);
            }
        }
    }
}
