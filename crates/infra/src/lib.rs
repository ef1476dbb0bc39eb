//! Infrastructure layer: store boundary, recalculation pipeline, config.

pub mod config;
pub mod recalculation;
pub mod store;

pub use config::EngineConfig;
pub use recalculation::{
    ALERT_AGGREGATE_TYPE, AlertEnvelope, CountReceipt, PassDiagnostics, RecalcError,
    RecalculationHandler, Scope, Trigger, TriggerKind,
};
pub use store::{InMemoryInventoryStore, InventoryStore, StoreError, StoreSeed};
