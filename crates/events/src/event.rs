use chrono::{DateTime, Utc};

/// A committed fact that downstream consumers may react to.
///
/// `occurred_at` is the time the fact is about (the pass trigger time for
/// alert transitions), never the time it was handed to a bus.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name consumers route on, e.g. `inventory.alert.opened`.
    fn event_type(&self) -> &'static str;

    fn occurred_at(&self) -> DateTime<Utc>;

    /// Payload schema revision. Bump when a field changes meaning.
    fn version(&self) -> u32 {
        1
    }
}
