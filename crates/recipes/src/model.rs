use serde::{Deserialize, Serialize};

use larder_core::{Entity, domain_id};
use larder_inventory::IngredientId;

domain_id!(
    /// Sellable recipe identifier.
    RecipeId
);

domain_id!(
    /// Prep (sub-)recipe identifier.
    PrepRecipeId
);

/// What a component points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ComponentRef {
    Ingredient(IngredientId),
    PrepRecipe(PrepRecipeId),
}

/// One line of a recipe: a quantity of an ingredient or a prep recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub source: ComponentRef,
    pub quantity: f64,
    pub unit: String,
}

impl Component {
    pub fn ingredient(id: IngredientId, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            source: ComponentRef::Ingredient(id),
            quantity,
            unit: unit.into(),
        }
    }

    pub fn prep(id: PrepRecipeId, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            source: ComponentRef::PrepRecipe(id),
            quantity,
            unit: unit.into(),
        }
    }
}

/// A sellable menu item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub menu_item_name: String,
    #[serde(default = "default_on_menu")]
    pub on_menu: bool,
    #[serde(default)]
    pub components: Vec<Component>,
}

fn default_on_menu() -> bool {
    true
}

impl Recipe {
    pub fn new(id: RecipeId, menu_item_name: impl Into<String>) -> Self {
        Self {
            id,
            menu_item_name: menu_item_name.into(),
            on_menu: true,
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn off_menu(mut self) -> Self {
        self.on_menu = false;
        self
    }
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A batch preparation (syrup, sauce, infusion) used by other recipes.
///
/// One batch yields `yield_amount` of `yield_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepRecipe {
    pub id: PrepRecipeId,
    pub name: String,
    pub yield_amount: f64,
    pub yield_unit: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl PrepRecipe {
    pub fn new(
        id: PrepRecipeId,
        name: impl Into<String>,
        yield_amount: f64,
        yield_unit: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            yield_amount,
            yield_unit: yield_unit.into(),
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }
}

impl Entity for PrepRecipe {
    type Id = PrepRecipeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_reference_serializes_tagged() {
        let id = IngredientId::new();
        let component = Component::ingredient(id, 45.0, "ml");
        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["source"]["kind"], "ingredient");
        assert_eq!(json["source"]["id"], id.to_string());

        let back: Component = serde_json::from_value(json).unwrap();
        assert_eq!(back, component);
    }

    #[test]
    fn recipes_default_to_on_menu() {
        let json = r#"{
            "id": "0190f1a2-7c4e-7d3a-9b1e-3f6a2b8c9d02",
            "menu_item_name": "Daiquiri"
        }"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert!(recipe.on_menu);
        assert!(recipe.components.is_empty());
    }
}
