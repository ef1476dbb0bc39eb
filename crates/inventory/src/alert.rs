use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{Aggregate, AggregateRoot, DomainError, domain_id};
use larder_events::Event;

use crate::ingredient::IngredientId;

domain_id!(
    /// Stock alert identifier.
    AlertId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

impl core::fmt::Display for AlertType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AlertType::LowStock => f.write_str("low_stock"),
            AlertType::OutOfStock => f.write_str("out_of_stock"),
        }
    }
}

/// A persisted stock alert row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAlert {
    pub id: AlertId,
    pub ingredient_id: IngredientId,
    pub alert_type: AlertType,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Which alert, if any, a stock level calls for.
///
/// Opens on `expected <= par` (out of stock at or below zero); anything
/// strictly above par needs no alert. The asymmetric boundary keeps a value
/// sitting exactly on par from flapping.
pub fn classify(expected: f64, par_level: f64) -> Option<AlertType> {
    if expected > par_level {
        None
    } else if expected <= 0.0 {
        Some(AlertType::OutOfStock)
    } else {
        Some(AlertType::LowStock)
    }
}

/// Aggregate root: the alert lifecycle of one ingredient.
///
/// States: no alert → open(low_stock | out_of_stock) → resolved. At most one
/// alert is open at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct StockAlerts {
    ingredient_id: IngredientId,
    open: Option<InventoryAlert>,
    version: u64,
}

impl StockAlerts {
    /// No alert open.
    pub fn empty(ingredient_id: IngredientId) -> Self {
        Self {
            ingredient_id,
            open: None,
            version: 0,
        }
    }

    /// Rebuild from the currently open alert as persisted.
    pub fn rehydrate(
        ingredient_id: IngredientId,
        open: Option<InventoryAlert>,
    ) -> Result<Self, DomainError> {
        if let Some(alert) = &open {
            if alert.ingredient_id != ingredient_id {
                return Err(DomainError::invariant("open alert belongs to another ingredient"));
            }
            if alert.resolved {
                return Err(DomainError::invariant("rehydrated alert is already resolved"));
            }
        }
        Ok(Self {
            ingredient_id,
            open,
            version: 0,
        })
    }

    pub fn ingredient_id(&self) -> IngredientId {
        self.ingredient_id
    }

    pub fn open_alert(&self) -> Option<&InventoryAlert> {
        self.open.as_ref()
    }
}

impl AggregateRoot for StockAlerts {
    type Id = IngredientId;

    fn id(&self) -> &Self::Id {
        &self.ingredient_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: EvaluateStock.
///
/// `alert_id` is the id to use if this evaluation opens an alert; passing it in
/// keeps `handle` deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateStock {
    pub ingredient_id: IngredientId,
    pub expected_quantity: Option<f64>,
    pub par_level: Option<f64>,
    pub alert_id: AlertId,
    pub evaluated_at: DateTime<Utc>,
}

/// Event: AlertOpened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOpened {
    pub alert_id: AlertId,
    pub ingredient_id: IngredientId,
    pub alert_type: AlertType,
    pub expected_quantity: f64,
    pub par_level: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AlertResolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResolved {
    pub alert_id: AlertId,
    pub ingredient_id: IngredientId,
    pub alert_type: AlertType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertEvent {
    AlertOpened(AlertOpened),
    AlertResolved(AlertResolved),
}

impl AlertEvent {
    pub fn ingredient_id(&self) -> IngredientId {
        match self {
            AlertEvent::AlertOpened(e) => e.ingredient_id,
            AlertEvent::AlertResolved(e) => e.ingredient_id,
        }
    }
}

impl Event for AlertEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AlertEvent::AlertOpened(_) => "inventory.alert.opened",
            AlertEvent::AlertResolved(_) => "inventory.alert.resolved",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AlertEvent::AlertOpened(e) => e.occurred_at,
            AlertEvent::AlertResolved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockAlerts {
    type Command = EvaluateStock;
    type Event = AlertEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AlertEvent::AlertOpened(e) => {
                self.open = Some(InventoryAlert {
                    id: e.alert_id,
                    ingredient_id: e.ingredient_id,
                    alert_type: e.alert_type,
                    resolved: false,
                    created_at: e.occurred_at,
                    resolved_at: None,
                });
            }
            AlertEvent::AlertResolved(e) => {
                if self.open.as_ref().is_some_and(|open| open.id == e.alert_id) {
                    self.open = None;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, cmd: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if cmd.ingredient_id != self.ingredient_id {
            return Err(DomainError::invariant("ingredient_id mismatch"));
        }

        // No threshold means nothing to alert on; unknown stock means nothing to decide.
        let levels = match (cmd.expected_quantity, cmd.par_level) {
            (_, None) => None,
            (None, Some(_)) => return Ok(vec![]),
            (Some(expected), Some(par)) => {
                if !expected.is_finite() || !par.is_finite() {
                    return Err(DomainError::validation("stock levels must be finite numbers"));
                }
                Some((expected, par))
            }
        };
        let wanted = levels.and_then(|(expected, par)| classify(expected, par).map(|kind| (kind, expected, par)));

        let resolve = |open: &InventoryAlert| {
            AlertEvent::AlertResolved(AlertResolved {
                alert_id: open.id,
                ingredient_id: self.ingredient_id,
                alert_type: open.alert_type,
                occurred_at: cmd.evaluated_at,
            })
        };
        let open_new = |alert_type: AlertType, expected_quantity: f64, par_level: f64| {
            AlertEvent::AlertOpened(AlertOpened {
                alert_id: cmd.alert_id,
                ingredient_id: self.ingredient_id,
                alert_type,
                expected_quantity,
                par_level,
                occurred_at: cmd.evaluated_at,
            })
        };

        let events = match (&self.open, wanted) {
            (None, None) => vec![],
            (None, Some((kind, expected, par))) => vec![open_new(kind, expected, par)],
            (Some(open), None) => vec![resolve(open)],
            (Some(open), Some((kind, ..))) if open.alert_type == kind => vec![],
            // Severity changed: close the old alert and open one of the new type.
            (Some(open), Some((kind, expected, par))) => vec![resolve(open), open_new(kind, expected, par)],
        };

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn evaluate(alerts: &StockAlerts, expected: Option<f64>, par: Option<f64>) -> EvaluateStock {
        EvaluateStock {
            ingredient_id: alerts.ingredient_id(),
            expected_quantity: expected,
            par_level: par,
            alert_id: AlertId::new(),
            evaluated_at: t0(),
        }
    }

    fn run(alerts: &mut StockAlerts, expected: Option<f64>, par: Option<f64>) -> Vec<AlertEvent> {
        let cmd = evaluate(alerts, expected, par);
        alerts.execute(&cmd).unwrap()
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(500.0, 500.0), Some(AlertType::LowStock));
        assert_eq!(classify(500.000001, 500.0), None);
        assert_eq!(classify(0.0, 500.0), Some(AlertType::OutOfStock));
        assert_eq!(classify(-20.0, 500.0), Some(AlertType::OutOfStock));
        assert_eq!(classify(0.0, 0.0), Some(AlertType::OutOfStock));
    }

    #[test]
    fn exactly_at_par_opens_one_alert() {
        let mut alerts = StockAlerts::empty(IngredientId::new());
        let events = run(&mut alerts, Some(500.0), Some(500.0));
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            AlertEvent::AlertOpened(e) if e.alert_type == AlertType::LowStock
        ));

        // Re-evaluating without a change is a no-op.
        assert!(run(&mut alerts, Some(500.0), Some(500.0)).is_empty());
        assert_eq!(alerts.version(), 1);
    }

    #[test]
    fn rising_above_par_resolves() {
        let mut alerts = StockAlerts::empty(IngredientId::new());
        run(&mut alerts, Some(375.0), Some(500.0));
        let opened = alerts.open_alert().cloned().unwrap();

        let events = run(&mut alerts, Some(501.0), Some(500.0));
        assert_eq!(
            events,
            vec![AlertEvent::AlertResolved(AlertResolved {
                alert_id: opened.id,
                ingredient_id: alerts.ingredient_id(),
                alert_type: AlertType::LowStock,
                occurred_at: t0(),
            })]
        );
        assert!(alerts.open_alert().is_none());
    }

    #[test]
    fn dropping_to_zero_escalates_low_stock_to_out_of_stock() {
        let mut alerts = StockAlerts::empty(IngredientId::new());
        run(&mut alerts, Some(375.0), Some(500.0));

        let events = run(&mut alerts, Some(0.0), Some(500.0));
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], AlertEvent::AlertResolved(e) if e.alert_type == AlertType::LowStock));
        assert!(matches!(&events[1], AlertEvent::AlertOpened(e) if e.alert_type == AlertType::OutOfStock));
        assert_eq!(
            alerts.open_alert().map(|a| a.alert_type),
            Some(AlertType::OutOfStock)
        );
    }

    #[test]
    fn unknown_stock_or_missing_par_never_transitions() {
        let mut alerts = StockAlerts::empty(IngredientId::new());
        assert!(run(&mut alerts, None, Some(500.0)).is_empty());
        assert!(run(&mut alerts, Some(0.0), None).is_empty());

        run(&mut alerts, Some(10.0), Some(500.0));
        assert!(run(&mut alerts, None, Some(500.0)).is_empty());
        assert!(alerts.open_alert().is_some());
    }

    #[test]
    fn clearing_the_par_level_resolves_the_open_alert() {
        let mut alerts = StockAlerts::empty(IngredientId::new());
        run(&mut alerts, Some(10.0), Some(500.0));
        let opened = alerts.open_alert().cloned().unwrap();

        let events = run(&mut alerts, Some(10.0), None);
        assert!(matches!(&events[..], [AlertEvent::AlertResolved(e)] if e.alert_id == opened.id));
        assert!(alerts.open_alert().is_none());
        assert!(run(&mut alerts, Some(10.0), None).is_empty());
    }

    #[test]
    fn handle_is_pure() {
        let alerts = StockAlerts::empty(IngredientId::new());
        let cmd = evaluate(&alerts, Some(1.0), Some(5.0));
        let before = alerts.clone();
        let a = alerts.handle(&cmd).unwrap();
        let b = alerts.handle(&cmd).unwrap();
        assert_eq!(a, b);
        assert_eq!(alerts, before);
    }

    #[test]
    fn rejects_mismatched_or_non_finite_input() {
        let alerts = StockAlerts::empty(IngredientId::new());
        let mut cmd = evaluate(&alerts, Some(1.0), Some(5.0));
        cmd.ingredient_id = IngredientId::new();
        assert!(matches!(alerts.handle(&cmd), Err(DomainError::InvariantViolation(_))));

        let cmd = evaluate(&alerts, Some(f64::NAN), Some(5.0));
        assert!(matches!(alerts.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rehydrate_checks_the_open_alert() {
        let ingredient_id = IngredientId::new();
        let alert = InventoryAlert {
            id: AlertId::new(),
            ingredient_id,
            alert_type: AlertType::LowStock,
            resolved: false,
            created_at: t0(),
            resolved_at: None,
        };
        assert!(StockAlerts::rehydrate(ingredient_id, Some(alert.clone())).is_ok());
        assert!(StockAlerts::rehydrate(IngredientId::new(), Some(alert.clone())).is_err());

        let resolved = InventoryAlert {
            resolved: true,
            resolved_at: Some(t0() + Duration::hours(1)),
            ..alert
        };
        assert!(StockAlerts::rehydrate(ingredient_id, Some(resolved)).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any sequence of evaluations keeps at most one alert open,
            /// and repeating the last evaluation never emits anything.
            #[test]
            fn repeated_evaluation_is_idempotent(
                levels in proptest::collection::vec(-100.0f64..1000.0, 1..30),
                par in 0.0f64..600.0
            ) {
                let mut alerts = StockAlerts::empty(IngredientId::new());
                let mut open_count: i64 = 0;

                for level in &levels {
                    for e in run(&mut alerts, Some(*level), Some(par)) {
                        match e {
                            AlertEvent::AlertOpened(_) => open_count += 1,
                            AlertEvent::AlertResolved(_) => open_count -= 1,
                        }
                    }
                    prop_assert!((0..=1).contains(&open_count));
                    prop_assert_eq!(open_count == 1, alerts.open_alert().is_some());
                }

                let last = *levels.last().unwrap();
                prop_assert!(run(&mut alerts, Some(last), Some(par)).is_empty());
                prop_assert_eq!(alerts.open_alert().is_some(), classify(last, par).is_some());
            }
        }
    }
}
