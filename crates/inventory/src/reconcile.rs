use crate::ingredient::Ingredient;

/// Expected on-hand quantity: last physical count minus depletion since that count.
///
/// `None` for an ingredient that was never counted; unknown stock is not
/// assumed to be full. Negative results are returned as-is (over-pour, waste
/// or bad data are worth seeing).
pub fn reconcile(ingredient: &Ingredient, depletion_since_count: f64) -> Option<f64> {
    if !ingredient.is_counted() {
        return None;
    }
    ingredient
        .last_counted_quantity
        .map(|counted| counted - depletion_since_count)
}
