//! Value objects: compared by value, never by identity.

/// Marker for immutable values such as a parsed quantity (`1500 ml` from
/// `"2 bottles"`). Two equal values are interchangeable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
