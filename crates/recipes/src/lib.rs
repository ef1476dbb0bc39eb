//! Recipes domain module.
//!
//! Sellable recipes and nested prep recipes, the owned recipe graph built from
//! them, bill-of-materials expansion down to raw ingredients, and aggregation
//! of sales volume into per-ingredient depletion.

pub mod depletion;
pub mod expand;
pub mod graph;
pub mod model;

pub use depletion::{DepletionAggregator, DepletionReport, SalesAggregate, UnmatchedReason, UnmatchedSale};
pub use expand::{BomExpander, ExpansionDiagnostic, IngredientUsage};
pub use graph::{NameMatching, PrepIdx, RecipeGraph, RecipeIdx, Target};
pub use model::{Component, ComponentRef, PrepRecipe, PrepRecipeId, Recipe, RecipeId};
