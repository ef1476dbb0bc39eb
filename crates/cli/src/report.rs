//! Plain-text rendering of a pass result.

use std::collections::BTreeSet;

use serde::Serialize;

use larder_infra::PassDiagnostics;
use larder_inventory::{AlertType, Ingredient, IngredientId, InventoryAlert};
use larder_units::{format_quantity, round_for_display};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientRow {
    pub name: String,
    pub expected: Option<f64>,
    pub expected_purchase_units: Option<f64>,
    pub par_level: Option<f64>,
    pub alert: Option<AlertType>,
}

/// One row per ingredient, values rounded for display only.
pub fn rows(ingredients: &[Ingredient], open_alerts: &[InventoryAlert], precision: u32) -> Vec<IngredientRow> {
    let mut rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            name: i.name.clone(),
            expected: i.expected_quantity.map(|q| round_for_display(q, precision)),
            expected_purchase_units: purchase_view(i).map(|(q, _)| round_for_display(q, precision)),
            par_level: i.par_level,
            alert: open_alerts
                .iter()
                .find(|a| a.ingredient_id == i.id)
                .map(|a| a.alert_type),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

pub fn render(ingredients: &[Ingredient], open_alerts: &[InventoryAlert], precision: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:>16} {:>16} {:>12}  {}\n",
        "ingredient", "expected", "purchase units", "par", "alert"
    ));

    for ingredient in sorted(ingredients) {
        let expected = ingredient
            .expected_quantity
            .map(|q| format_quantity(q, &ingredient.base_unit, precision))
            .unwrap_or_else(|| "uncounted".to_string());
        let purchase = purchase_view(ingredient)
            .map(|(q, unit)| format_quantity(q, unit, precision))
            .unwrap_or_else(|| "-".to_string());
        let par = ingredient
            .par_level
            .map(|p| format_quantity(p, &ingredient.base_unit, precision))
            .unwrap_or_else(|| "-".to_string());
        let alert = open_alerts
            .iter()
            .find(|a| a.ingredient_id == ingredient.id)
            .map(|a| a.alert_type.to_string())
            .unwrap_or_default();

        out.push_str(&format!(
            "{:<24} {:>16} {:>16} {:>12}  {}\n",
            ingredient.name, expected, purchase, par, alert
        ));
    }
    out
}

pub fn summary(diagnostics: &PassDiagnostics) -> String {
    format!(
        "updated {} | alerts +{} -{} | unmatched sales {} | cycles {} | unit errors {} | skipped {} | stale {}",
        diagnostics.ingredients_updated,
        diagnostics.alerts_created,
        diagnostics.alerts_resolved,
        diagnostics.unmatched_sales,
        diagnostics.cycles_detected,
        diagnostics.unit_errors,
        diagnostics.ingredients_skipped,
        diagnostics.stale_skipped,
    )
}

/// Ingredients some on-menu recipe uses whose stock has never been counted, by name.
pub fn uncounted_on_menu(ingredients: &[Ingredient], in_use: &BTreeSet<IngredientId>) -> Vec<String> {
    sorted(ingredients)
        .into_iter()
        .filter(|i| in_use.contains(&i.id) && !i.is_counted())
        .map(|i| i.name.clone())
        .collect()
}

/// Expected quantity in purchase units, only when a real multiplier is set.
fn purchase_view(ingredient: &Ingredient) -> Option<(f64, &str)> {
    let unit = ingredient.purchase_unit.as_deref()?;
    ingredient
        .purchase_unit_quantity
        .filter(|k| k.is_finite() && *k > 0.0)?;
    Some((ingredient.expected_in_purchase_units()?, unit))
}

fn sorted(ingredients: &[Ingredient]) -> Vec<&Ingredient> {
    let mut sorted: Vec<&Ingredient> = ingredients.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}
