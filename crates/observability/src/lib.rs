//! Logging setup for the `larder` binary and anything else embedding the engine.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Install structured logging for the process. Safe to call more than once.
pub fn init() {
    crate::tracing::init();
}
