//! Bill-of-materials expansion: recipe -> raw ingredient usage per serving.
//!
//! ## Traversal
//!
//! Prep recipes are expanded depth first with an explicit frame stack (no
//! recursion, so graph depth never touches the thread stack). A prep recipe
//! is "on path" between its `Enter` and `Exit` frames; an edge to a prep that
//! is on path closes a cycle and is truncated (contributes nothing) with a
//! [`ExpansionDiagnostic::CycleDetected`].
//!
//! ## Memoization
//!
//! Each prep recipe's usage *per unit of yield* is computed once per
//! expander and reused by every recipe that needs it. One expander lives for
//! one recalculation pass.
//!
//! ## Soft failures
//!
//! Unit mismatches, dangling references and bad yields zero the affected
//! contribution and are recorded as diagnostics; expansion itself never fails.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::warn;

use larder_core::{DomainError, DomainResult};
use larder_inventory::IngredientId;
use larder_units::{convert, same_unit};

use crate::graph::{Edge, PrepIdx, RecipeGraph, RecipeIdx, Target};
use crate::model::{PrepRecipeId, RecipeId};

/// Ingredient -> quantity in the ingredient's base unit.
pub type IngredientUsage = BTreeMap<IngredientId, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpansionDiagnostic {
    CycleDetected {
        from: PrepRecipeId,
        to: PrepRecipeId,
    },
    IncompatibleUnits {
        context: String,
        from_unit: String,
        to_unit: String,
    },
    MissingPrepRecipe {
        context: String,
        prep_recipe_id: PrepRecipeId,
    },
    UnknownIngredient {
        context: String,
        ingredient_id: IngredientId,
    },
    InvalidYield {
        prep_recipe_id: PrepRecipeId,
        yield_amount: f64,
    },
}

impl ExpansionDiagnostic {
    pub fn is_cycle(&self) -> bool {
        matches!(self, ExpansionDiagnostic::CycleDetected { .. })
    }

    pub fn is_unit_error(&self) -> bool {
        matches!(self, ExpansionDiagnostic::IncompatibleUnits { .. })
    }
}

enum Frame {
    Enter(PrepIdx),
    Exit(PrepIdx),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Open,
    Done,
}

fn has_valid_yield(yield_amount: f64) -> bool {
    yield_amount.is_finite() && yield_amount > 0.0
}

/// Prep edges that close a cycle, found by one depth-first walk over every
/// prep in declaration order, components in order. Removing them leaves an
/// acyclic graph that is the same whichever recipe is expanded first.
fn cycle_edges(graph: &RecipeGraph) -> HashSet<(PrepIdx, usize)> {
    let mut visit = vec![Visit::New; graph.prep_count()];
    let mut cut = HashSet::new();

    for root in 0..graph.prep_count() {
        if visit[root] != Visit::New {
            continue;
        }
        let mut stack = vec![Frame::Enter(PrepIdx(root))];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(idx) => {
                    if visit[idx.0] != Visit::New {
                        continue;
                    }
                    visit[idx.0] = Visit::Open;
                    stack.push(Frame::Exit(idx));

                    let prep = graph.prep(idx);
                    if !has_valid_yield(prep.yield_amount) {
                        continue;
                    }
                    for (pos, edge) in prep.edges.iter().enumerate().rev() {
                        let Target::Prep(child) = edge.target else {
                            continue;
                        };
                        match visit[child.0] {
                            Visit::Open => {
                                cut.insert((idx, pos));
                            }
                            Visit::New => stack.push(Frame::Enter(child)),
                            Visit::Done => {}
                        }
                    }
                }
                Frame::Exit(idx) => visit[idx.0] = Visit::Done,
            }
        }
    }
    cut
}

#[derive(Debug)]
pub struct BomExpander<'g> {
    graph: &'g RecipeGraph,
    memo: Vec<Option<IngredientUsage>>,
    on_path: Vec<bool>,
    truncated: HashSet<(PrepIdx, usize)>,
    diagnostics: Vec<ExpansionDiagnostic>,
}

impl<'g> BomExpander<'g> {
    pub fn new(graph: &'g RecipeGraph) -> Self {
        Self {
            graph,
            memo: vec![None; graph.prep_count()],
            on_path: vec![false; graph.prep_count()],
            truncated: cycle_edges(graph),
            diagnostics: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g RecipeGraph {
        self.graph
    }

    pub fn diagnostics(&self) -> &[ExpansionDiagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<ExpansionDiagnostic> {
        self.diagnostics
    }

    /// Raw ingredient usage for one serving of `recipe_id`.
    pub fn expand_recipe(&mut self, recipe_id: RecipeId) -> DomainResult<IngredientUsage> {
        let idx = self
            .graph
            .recipe_idx(recipe_id)
            .ok_or_else(|| DomainError::not_found(format!("recipe {recipe_id}")))?;
        Ok(self.expand(idx))
    }

    pub(crate) fn expand(&mut self, idx: RecipeIdx) -> IngredientUsage {
        let graph = self.graph;
        let node = graph.recipe(idx);
        for edge in &node.edges {
            if let Target::Prep(child) = edge.target {
                self.expand_prep(child);
            }
        }

        let mut usage = IngredientUsage::new();
        for edge in &node.edges {
            self.accumulate(&node.menu_item_name, edge, &mut usage);
        }
        usage
    }

    fn expand_prep(&mut self, root: PrepIdx) {
        if self.memo[root.0].is_some() {
            return;
        }

        let graph = self.graph;
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(idx) => {
                    if self.memo[idx.0].is_some() || self.on_path[idx.0] {
                        continue;
                    }
                    let prep = graph.prep(idx);
                    if !has_valid_yield(prep.yield_amount) {
                        self.report(ExpansionDiagnostic::InvalidYield {
                            prep_recipe_id: prep.id,
                            yield_amount: prep.yield_amount,
                        });
                        self.memo[idx.0] = Some(IngredientUsage::new());
                        continue;
                    }

                    self.on_path[idx.0] = true;
                    stack.push(Frame::Exit(idx));
                    for (pos, edge) in prep.edges.iter().enumerate().rev() {
                        let Target::Prep(child) = edge.target else {
                            continue;
                        };
                        if !self.truncated.contains(&(idx, pos)) && self.memo[child.0].is_none() {
                            stack.push(Frame::Enter(child));
                        }
                    }
                }
                Frame::Exit(idx) => {
                    let prep = graph.prep(idx);
                    let mut batch = IngredientUsage::new();
                    for (pos, edge) in prep.edges.iter().enumerate() {
                        if self.truncated.contains(&(idx, pos)) {
                            if let Target::Prep(child) = edge.target {
                                self.report(ExpansionDiagnostic::CycleDetected {
                                    from: prep.id,
                                    to: graph.prep(child).id,
                                });
                            }
                            continue;
                        }
                        self.accumulate(&prep.name, edge, &mut batch);
                    }
                    for qty in batch.values_mut() {
                        *qty /= prep.yield_amount;
                    }
                    self.on_path[idx.0] = false;
                    self.memo[idx.0] = Some(batch);
                }
            }
        }
    }

    /// Add one component's contribution to `usage`. Prep children must already
    /// be memoized.
    fn accumulate(&mut self, context: &str, edge: &Edge, usage: &mut IngredientUsage) {
        let graph = self.graph;
        match edge.target {
            Target::Ingredient(id) => {
                let Some(base_unit) = graph.base_unit(id) else {
                    self.report(ExpansionDiagnostic::UnknownIngredient {
                        context: context.to_string(),
                        ingredient_id: id,
                    });
                    return;
                };
                if let Some(qty) = self.to_unit(context, edge, base_unit) {
                    *usage.entry(id).or_insert(0.0) += qty;
                }
            }
            Target::Prep(child) => {
                let prep = graph.prep(child);
                let Some(qty) = self.to_unit(context, edge, &prep.yield_unit) else {
                    return;
                };
                if let Some(per_unit) = &self.memo[child.0] {
                    for (id, amount) in per_unit {
                        *usage.entry(*id).or_insert(0.0) += amount * qty;
                    }
                }
            }
            Target::Dangling(prep_recipe_id) => {
                self.report(ExpansionDiagnostic::MissingPrepRecipe {
                    context: context.to_string(),
                    prep_recipe_id,
                });
            }
        }
    }

    fn to_unit(&mut self, context: &str, edge: &Edge, target_unit: &str) -> Option<f64> {
        if same_unit(&edge.unit, target_unit) {
            return Some(edge.quantity);
        }
        match convert(edge.quantity, &edge.unit, target_unit) {
            Ok(qty) => Some(qty),
            Err(_) => {
                self.report(ExpansionDiagnostic::IncompatibleUnits {
                    context: context.to_string(),
                    from_unit: edge.unit.clone(),
                    to_unit: target_unit.to_string(),
                });
                None
            }
        }
    }

    fn report(&mut self, diagnostic: ExpansionDiagnostic) {
        match &diagnostic {
            ExpansionDiagnostic::CycleDetected { from, to } => {
                warn!(%from, %to, "prep recipe cycle truncated");
            }
            ExpansionDiagnostic::IncompatibleUnits {
                context,
                from_unit,
                to_unit,
            } => {
                warn!(%context, %from_unit, %to_unit, "component unit cannot be converted");
            }
            ExpansionDiagnostic::MissingPrepRecipe {
                context,
                prep_recipe_id,
            } => {
                warn!(%context, %prep_recipe_id, "component references a missing prep recipe");
            }
            ExpansionDiagnostic::UnknownIngredient {
                context,
                ingredient_id,
            } => {
                warn!(%context, %ingredient_id, "component references an unknown ingredient");
            }
            ExpansionDiagnostic::InvalidYield {
                prep_recipe_id,
                yield_amount,
            } => {
                warn!(%prep_recipe_id, yield_amount, "prep recipe has a non-positive yield");
            }
        }
        self.diagnostics.push(diagnostic);
    }
}
