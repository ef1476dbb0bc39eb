//! Command/event state machines.
//!
//! An aggregate decides (`handle`) and evolves (`apply`) separately, so a
//! caller can compute the transitions of a whole recalculation pass, commit
//! them, and only then consider them facts.

/// Identity and version of an aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Count of events applied since the aggregate was built or rehydrated.
    fn version(&self) -> u64;
}

/// A pure state machine: no IO, no clock, no randomness inside.
///
/// Anything non-deterministic (new ids, timestamps) travels in the command.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve state from one event. Must accept every event `handle` can emit.
    fn apply(&mut self, event: &Self::Event);

    /// Decide the events for `command` without mutating state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// `handle` followed by `apply` of each resulting event.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}
