//! Owned recipe graph: prep recipes in an arena, components resolved to indices.
//!
//! Built once per recalculation pass from a read-only snapshot. Nothing in
//! here follows pointers; every traversal is index based with explicit
//! visited sets.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult};
use larder_inventory::IngredientId;

use crate::model::{Component, ComponentRef, PrepRecipe, PrepRecipeId, Recipe, RecipeId};

/// Index of a prep recipe in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrepIdx(pub(crate) usize);

/// Index of a sellable recipe in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecipeIdx(pub(crate) usize);

/// A component after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Ingredient(IngredientId),
    Prep(PrepIdx),
    /// Points at a prep recipe that is not in the snapshot.
    Dangling(PrepRecipeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub target: Target,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeNode {
    pub id: RecipeId,
    pub menu_item_name: String,
    pub on_menu: bool,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepNode {
    pub id: PrepRecipeId,
    pub name: String,
    pub yield_amount: f64,
    pub yield_unit: String,
    pub edges: Vec<Edge>,
}

/// How sales rows are matched to recipes by menu item name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    #[default]
    Exact,
    /// Exact match first, then a unique case-insensitive match.
    CaseInsensitive,
}

impl core::str::FromStr for NameMatching {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(NameMatching::Exact),
            "case_insensitive" | "case-insensitive" => Ok(NameMatching::CaseInsensitive),
            other => Err(DomainError::validation(format!(
                "unknown name matching mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeGraph {
    recipes: Vec<RecipeNode>,
    preps: Vec<PrepNode>,
    recipe_index: HashMap<RecipeId, RecipeIdx>,
    prep_index: HashMap<PrepRecipeId, PrepIdx>,
    by_name: HashMap<String, RecipeIdx>,
    // Lowercased name -> recipe, `None` when two names differ only by case.
    by_folded_name: HashMap<String, Option<RecipeIdx>>,
    ingredient_units: HashMap<IngredientId, String>,
}

impl RecipeGraph {
    /// Build the graph from a snapshot.
    ///
    /// `ingredient_units` maps every known ingredient to its base unit.
    /// Duplicate recipe ids, prep ids or menu item names are rejected;
    /// components pointing at unknown prep recipes are kept as
    /// [`Target::Dangling`] and surface during expansion.
    pub fn build(
        recipes: &[Recipe],
        prep_recipes: &[PrepRecipe],
        ingredient_units: HashMap<IngredientId, String>,
    ) -> DomainResult<Self> {
        let mut prep_index = HashMap::with_capacity(prep_recipes.len());
        for (i, prep) in prep_recipes.iter().enumerate() {
            if prep_index.insert(prep.id, PrepIdx(i)).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate prep recipe id {}",
                    prep.id
                )));
            }
        }

        let resolve = |components: &[Component]| -> Vec<Edge> {
            components
                .iter()
                .map(|c| Edge {
                    target: match c.source {
                        ComponentRef::Ingredient(id) => Target::Ingredient(id),
                        ComponentRef::PrepRecipe(id) => prep_index
                            .get(&id)
                            .map(|idx| Target::Prep(*idx))
                            .unwrap_or(Target::Dangling(id)),
                    },
                    quantity: c.quantity,
                    unit: c.unit.clone(),
                })
                .collect()
        };

        let preps: Vec<PrepNode> = prep_recipes
            .iter()
            .map(|p| PrepNode {
                id: p.id,
                name: p.name.clone(),
                yield_amount: p.yield_amount,
                yield_unit: p.yield_unit.clone(),
                edges: resolve(&p.components),
            })
            .collect();

        let mut recipe_index = HashMap::with_capacity(recipes.len());
        let mut by_name = HashMap::with_capacity(recipes.len());
        let mut by_folded_name: HashMap<String, Option<RecipeIdx>> = HashMap::new();
        let mut nodes = Vec::with_capacity(recipes.len());

        for (i, recipe) in recipes.iter().enumerate() {
            let idx = RecipeIdx(i);
            if recipe_index.insert(recipe.id, idx).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate recipe id {}",
                    recipe.id
                )));
            }
            if by_name.insert(recipe.menu_item_name.clone(), idx).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate menu item name '{}'",
                    recipe.menu_item_name
                )));
            }
            by_folded_name
                .entry(recipe.menu_item_name.to_lowercase())
                .and_modify(|slot| *slot = None)
                .or_insert(Some(idx));

            nodes.push(RecipeNode {
                id: recipe.id,
                menu_item_name: recipe.menu_item_name.clone(),
                on_menu: recipe.on_menu,
                edges: resolve(&recipe.components),
            });
        }

        Ok(Self {
            recipes: nodes,
            preps,
            recipe_index,
            prep_index,
            by_name,
            by_folded_name,
            ingredient_units,
        })
    }

    pub fn recipe(&self, idx: RecipeIdx) -> &RecipeNode {
        &self.recipes[idx.0]
    }

    pub fn prep(&self, idx: PrepIdx) -> &PrepNode {
        &self.preps[idx.0]
    }

    pub fn recipe_indices(&self) -> impl Iterator<Item = RecipeIdx> + '_ {
        (0..self.recipes.len()).map(RecipeIdx)
    }

    pub fn recipe_idx(&self, id: RecipeId) -> Option<RecipeIdx> {
        self.recipe_index.get(&id).copied()
    }

    pub fn prep_idx(&self, id: PrepRecipeId) -> Option<PrepIdx> {
        self.prep_index.get(&id).copied()
    }

    pub fn prep_count(&self) -> usize {
        self.preps.len()
    }

    pub fn base_unit(&self, ingredient_id: IngredientId) -> Option<&str> {
        self.ingredient_units.get(&ingredient_id).map(String::as_str)
    }

    /// Find the recipe a sales row refers to.
    pub fn find_by_name(&self, name: &str, matching: NameMatching) -> Option<RecipeIdx> {
        if let Some(idx) = self.by_name.get(name) {
            return Some(*idx);
        }
        match matching {
            NameMatching::Exact => None,
            NameMatching::CaseInsensitive => self
                .by_folded_name
                .get(&name.trim().to_lowercase())
                .copied()
                .flatten(),
        }
    }

    /// Every ingredient reachable from a recipe, through any depth of prep recipes.
    pub fn ingredients_in_use(&self, on_menu_only: bool) -> BTreeSet<IngredientId> {
        let mut found = BTreeSet::new();
        let mut visited = vec![false; self.preps.len()];
        let mut frontier: Vec<PrepIdx> = Vec::new();

        let mut visit = |edges: &[Edge], frontier: &mut Vec<PrepIdx>, found: &mut BTreeSet<IngredientId>| {
            for edge in edges {
                match edge.target {
                    Target::Ingredient(id) => {
                        found.insert(id);
                    }
                    Target::Prep(idx) if !visited[idx.0] => {
                        visited[idx.0] = true;
                        frontier.push(idx);
                    }
                    Target::Prep(_) | Target::Dangling(_) => {}
                }
            }
        };

        for recipe in self.recipes.iter().filter(|r| r.on_menu || !on_menu_only) {
            visit(&recipe.edges, &mut frontier, &mut found);
        }
        while let Some(idx) = frontier.pop() {
            visit(&self.preps[idx.0].edges, &mut frontier, &mut found);
        }

        found
    }

    /// Whether any recipe or prep recipe lists the ingredient directly.
    pub fn is_ingredient_referenced(&self, ingredient_id: IngredientId) -> bool {
        let mentions = |edges: &[Edge]| {
            edges
                .iter()
                .any(|e| e.target == Target::Ingredient(ingredient_id))
        };
        self.recipes.iter().any(|r| mentions(&r.edges))
            || self.preps.iter().any(|p| mentions(&p.edges))
    }
}
