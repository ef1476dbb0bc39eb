//! Errors raised by recipe, unit and inventory rules.
//!
//! Storage failures live in the infra crate; this enum only covers what a
//! command or a graph build can reject on its own.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input: unparseable quantity text, negative par, duplicate menu name.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A command contradicts the state it was issued against.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected because other data still depends on the target.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        DomainError::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        DomainError::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }

    /// Caller-side mistakes, as opposed to missing or conflicting data.
    pub fn is_input_error(&self) -> bool {
        matches!(self, DomainError::Validation(_) | DomainError::InvalidId(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_context() {
        let err = DomainError::validation("quantity text is empty");
        assert_eq!(err.to_string(), "validation failed: quantity text is empty");
        assert_eq!(
            DomainError::not_found("recipe Martini").to_string(),
            "not found: recipe Martini"
        );
    }

    #[test]
    fn input_errors_are_told_apart() {
        assert!(DomainError::validation("x").is_input_error());
        assert!(DomainError::invalid_id("x").is_input_error());
        assert!(!DomainError::conflict("x").is_input_error());
        assert!(!DomainError::invariant("x").is_input_error());
    }
}
