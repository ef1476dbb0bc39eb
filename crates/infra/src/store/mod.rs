//! Inventory store boundary and the in-memory reference implementation.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryInventoryStore, StoreSeed};
pub use r#trait::{
    CommitOutcome, IngredientUpdate, InventorySnapshot, InventoryStore, PassCommit, StoreError,
};
