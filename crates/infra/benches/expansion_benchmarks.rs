use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use larder_events::InMemoryEventBus;
use larder_infra::{
    AlertEnvelope, EngineConfig, InMemoryInventoryStore, RecalculationHandler, Scope, Trigger,
    TriggerKind,
};
use larder_inventory::{Ingredient, IngredientId};
use larder_recipes::{
    BomExpander, Component, DepletionAggregator, NameMatching, PrepRecipe, PrepRecipeId, Recipe,
    RecipeGraph, RecipeId, SalesAggregate,
};

struct Menu {
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    preps: Vec<PrepRecipe>,
}

/// `recipes` menu items over a chain of `depth` nested prep recipes, each prep
/// also using a couple of raw ingredients.
fn menu(recipes: usize, depth: usize) -> Menu {
    let counted_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let ingredients: Vec<Ingredient> = (0..32)
        .map(|i| {
            Ingredient::new(IngredientId::new(), format!("Ingredient {i}"), "ml")
                .with_par_level(500.0)
                .with_last_count(1_000_000.0, counted_at)
        })
        .collect();

    let mut preps: Vec<PrepRecipe> = Vec::with_capacity(depth);
    for level in 0..depth {
        let mut prep = PrepRecipe::new(PrepRecipeId::new(), format!("Prep {level}"), 1.0, "l")
            .with_component(Component::ingredient(ingredients[level % 32].id, 200.0, "ml"))
            .with_component(Component::ingredient(ingredients[(level + 7) % 32].id, 0.1, "l"));
        if let Some(child) = preps.last() {
            prep = prep.with_component(Component::prep(child.id, 500.0, "ml"));
        }
        preps.push(prep);
    }

    let recipes = (0..recipes)
        .map(|r| {
            let mut recipe = Recipe::new(RecipeId::new(), format!("Item {r}"))
                .with_component(Component::ingredient(ingredients[r % 32].id, 1.5, "fl oz"));
            if !preps.is_empty() {
                let prep = &preps[r % preps.len()];
                recipe = recipe.with_component(Component::prep(prep.id, 30.0, "ml"));
            }
            recipe
        })
        .collect();

    Menu {
        ingredients,
        recipes,
        preps,
    }
}

fn units(menu: &Menu) -> HashMap<IngredientId, String> {
    menu.ingredients
        .iter()
        .map(|i| (i.id, i.base_unit.clone()))
        .collect()
}

fn bench_graph_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_expansion");

    for depth in [1usize, 8, 32, 128] {
        let menu = menu(200, depth);
        let graph = RecipeGraph::build(&menu.recipes, &menu.preps, units(&menu)).unwrap();
        let ids: Vec<RecipeId> = menu.recipes.iter().map(|r| r.id).collect();

        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_with_input(BenchmarkId::new("expand_all_recipes", depth), &ids, |b, ids| {
            b.iter(|| {
                let mut expander = BomExpander::new(&graph);
                for id in ids {
                    black_box(expander.expand_recipe(*id).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_depletion(c: &mut Criterion) {
    let mut group = c.benchmark_group("depletion_aggregation");
    let menu = menu(200, 16);
    let graph = RecipeGraph::build(&menu.recipes, &menu.preps, units(&menu)).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let counted_at: HashMap<IngredientId, _> = menu.ingredients.iter().map(|i| (i.id, start)).collect();

    for rows in [100usize, 1_000, 10_000] {
        let sales: Vec<SalesAggregate> = (0..rows)
            .map(|i| {
                SalesAggregate::new(
                    format!("Item {}", i % menu.recipes.len()),
                    (i % 5 + 1) as f64,
                    start + Duration::minutes(i as i64 + 1),
                )
            })
            .collect();
        let until = start + Duration::days(30);

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("since_counts", rows), &sales, |b, sales| {
            b.iter(|| {
                let mut agg = DepletionAggregator::new(&graph, NameMatching::Exact);
                black_box(agg.since_counts(sales, until, &counted_at));
            });
        });
    }

    group.finish();
}

fn bench_full_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("recalculation_pass");
    group.sample_size(50);

    group.bench_function("sales_sync_200_items", |b| {
        let menu = menu(200, 16);
        let store = Arc::new(InMemoryInventoryStore::new());
        for ingredient in &menu.ingredients {
            store.upsert_ingredient(ingredient.clone()).unwrap();
        }
        for prep in &menu.preps {
            store.upsert_prep_recipe(prep.clone()).unwrap();
        }
        for recipe in &menu.recipes {
            store.upsert_recipe(recipe.clone()).unwrap();
        }
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        store
            .record_sales((0..2_000).map(|i| {
                SalesAggregate::new(format!("Item {}", i % 200), 1.0, start + Duration::minutes(i + 1))
            }))
            .unwrap();

        let bus: Arc<InMemoryEventBus<AlertEnvelope>> = Arc::new(InMemoryEventBus::new());
        let handler = RecalculationHandler::new(store, bus, EngineConfig::default());
        let mut at = start + Duration::days(2);

        b.iter(|| {
            at += Duration::seconds(1);
            black_box(
                handler
                    .recalculate(Trigger::new(TriggerKind::SalesSync, at), Scope::All)
                    .unwrap(),
            );
        });
    });

    group.finish();
}

criterion_group!(benches, bench_graph_expansion, bench_depletion, bench_full_pass);
criterion_main!(benches);
