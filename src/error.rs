//! Error taxonomy for the multilingual core.
//!
//! Only two conditions are real errors: a malformed language spec
//! (`ValidationError`, every violated field reported at once) and an
//! operation referencing a language the registry does not know
//! (`Error::InvalidLanguage`). Missing translations are never errors; they
//! surface as `None` and callers treat them as pass-through.

use std::fmt;

/// A single violated field in a language spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field name (e.g. "slug", "locale")
    pub field: &'static str,

    /// Human-readable description of the problem
    pub message: String,
}

/// Rejection of a malformed language spec.
///
/// Carries every violation found, not just the first: callers surface the
/// full list and nothing is written to the substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Record a violation against a field.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.violations.push(Violation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert into a `Result`: `Ok(())` when no violations were recorded.
    pub fn into_result(self) -> std::result::Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid language spec: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by the multilingual core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed language spec; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An operation referenced a language that is not in the registry.
    #[error("language '{0}' is not registered")]
    InvalidLanguage(String),

    /// The tag-storage substrate failed.
    #[error("tag storage failure")]
    Store(#[source] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
