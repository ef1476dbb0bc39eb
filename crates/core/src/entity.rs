//! Entities: things tracked by id while their attributes change.

/// Ingredients, recipes and prep recipes keep their id through counts,
/// recalculations and edits; everything else about them may change.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Same thing, possibly in a different state.
    fn same_entity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
