//! `larder`: run one recalculation pass over a JSON snapshot and print the result.

mod report;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use larder_events::{EventBus, InMemoryEventBus};
use larder_infra::{
    AlertEnvelope, EngineConfig, InMemoryInventoryStore, InventoryStore, RecalculationHandler,
    Scope, Trigger, TriggerKind,
};
use larder_recipes::RecipeGraph;

#[derive(Debug, Parser)]
#[command(name = "larder", about = "Recalculate expected stock and alerts from a snapshot", version)]
struct Args {
    /// JSON snapshot of ingredients, recipes, prep recipes, sales, counts and alerts.
    snapshot: PathBuf,

    /// Trigger time of the pass (RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<DateTime<Utc>>,

    /// Print the result as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn main() -> Result<()> {
    larder_observability::init();

    let args = Args::parse();
    let config = EngineConfig::from_env();

    let json = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let store = Arc::new(InMemoryInventoryStore::from_json(&json).context("loading snapshot")?);

    let bus: Arc<InMemoryEventBus<AlertEnvelope>> = Arc::new(InMemoryEventBus::new());
    let published = bus.subscribe();
    let handler = RecalculationHandler::new(store.clone(), bus, config);

    let trigger = match args.at {
        Some(at) => Trigger::new(TriggerKind::SalesSync, at),
        None => Trigger::now(TriggerKind::SalesSync),
    };
    tracing::info!(snapshot = %args.snapshot.display(), at = %trigger.at, "running recalculation pass");
    let diagnostics = handler.recalculate(trigger, Scope::All)?;

    let snapshot = store.load_snapshot()?;
    let units: HashMap<_, _> = snapshot
        .ingredients
        .iter()
        .map(|i| (i.id, i.base_unit.clone()))
        .collect();
    let graph = RecipeGraph::build(&snapshot.recipes, &snapshot.prep_recipes, units)
        .context("building recipe graph")?;
    let uncounted = report::uncounted_on_menu(&snapshot.ingredients, &graph.ingredients_in_use(true));
    let events: Vec<_> = published.drain().into_iter().map(|e| e.into_payload()).collect();

    if args.json {
        let output = serde_json::json!({
            "diagnostics": diagnostics,
            "ingredients": report::rows(&snapshot.ingredients, &snapshot.open_alerts, config.display_precision),
            "uncounted_on_menu": uncounted,
            "alert_events": events,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", report::summary(&diagnostics));
        if !uncounted.is_empty() {
            println!("on menu but never counted: {}", uncounted.join(", "));
        }
        println!();
        print!(
            "{}",
            report::render(&snapshot.ingredients, &snapshot.open_alerts, config.display_precision)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("larder").chain(list.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_snapshot_and_options() {
        let parsed = args(&["bar.json", "--at", "2024-03-01T22:00:00Z", "--json"]).unwrap();
        assert_eq!(parsed.snapshot, PathBuf::from("bar.json"));
        assert_eq!(
            parsed.at.map(|at| at.to_rfc3339()),
            Some("2024-03-01T22:00:00+00:00".to_string())
        );
        assert!(parsed.json);

        let offset = args(&["bar.json", "--at", "2024-03-01T23:00:00+01:00"]).unwrap();
        assert_eq!(offset.at, parsed.at);
        assert!(!offset.json);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
        assert!(args(&["a.json", "--at"]).is_err());
        assert!(args(&["a.json", "--at", "yesterday"]).is_err());
        assert!(args(&["a.json", "--verbose"]).is_err());
    }

    #[test]
    fn demo_snapshot_runs_a_full_pass() {
        let store = Arc::new(InMemoryInventoryStore::from_json(include_str!("../../../demos/bar.json")).unwrap());
        let bus: Arc<InMemoryEventBus<AlertEnvelope>> = Arc::new(InMemoryEventBus::new());
        let published = bus.subscribe();
        let handler = RecalculationHandler::new(store.clone(), bus, EngineConfig::default());

        let at = parse_timestamp("2024-03-01T22:00:00Z").unwrap();
        let diagnostics = handler
            .recalculate(Trigger::new(TriggerKind::SalesSync, at), Scope::All)
            .unwrap();
        assert_eq!(diagnostics.ingredients_updated, 3);
        assert_eq!(diagnostics.alerts_created, 1);

        let snapshot = store.load_snapshot().unwrap();
        let sugar = snapshot.ingredients.iter().find(|i| i.name == "Sugar").unwrap();
        assert!((sugar.expected_quantity.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(published.drain().len(), 1);

        let units = snapshot.ingredients.iter().map(|i| (i.id, i.base_unit.clone())).collect();
        let graph = RecipeGraph::build(&snapshot.recipes, &snapshot.prep_recipes, units).unwrap();
        assert_eq!(
            report::uncounted_on_menu(&snapshot.ingredients, &graph.ingredients_in_use(true)),
            vec!["Lemon Juice".to_string()]
        );

        let table = report::render(&snapshot.ingredients, &snapshot.open_alerts, 2);
        assert!(table.contains("low_stock"));
        assert!(table.contains("uncounted"));
    }
}
