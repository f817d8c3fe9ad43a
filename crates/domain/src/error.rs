//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`WatchError`]
//! via `#[from]` (domain errors) or the boxed `Transport` / `Storage`
//! variants (adapter errors).

use std::fmt;

use crate::id::{DeviceId, SiteId};
use crate::location::Location;

/// Boxed source error carried by adapter-facing variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error shared by every crate of the workspace.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A directory write was rejected by schema or invariant checks.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A site, location, or device does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// An inbound message could not be decoded.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] MalformedEventError),

    /// Publish / subscribe on the transport failed.
    #[error("transport error")]
    Transport(#[source] BoxError),

    /// Loading or persisting the directory failed.
    #[error("storage error")]
    Storage(#[source] BoxError),
}

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Problem {
    #[error("missing required field")]
    Missing,
    #[error("expected {expected}")]
    WrongType { expected: &'static str },
    #[error("must not be empty")]
    Empty,
    #[error("{0}")]
    Invalid(&'static str),
}

/// One rejected field, addressed by its dotted path in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub problem: Problem,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Every violation found in a payload, collected without early exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Start an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an error holding a single violation.
    #[must_use]
    pub fn single(field: impl Into<String>, problem: Problem) -> Self {
        let mut err = Self::new();
        err.push(field, problem);
        err
    }

    /// Record a violation.
    pub fn push(&mut self, field: impl Into<String>, problem: Problem) {
        self.violations.push(FieldViolation {
            field: field.into(),
            problem,
        });
    }

    /// All violations, in discovery order.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation targets `field`.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was collected, `Err(self)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one violation was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            violation.fmt(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A lookup into the directory found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("site {0} not found")]
    Site(SiteId),
    #[error("location {0} not found")]
    Location(Location),
    #[error("device {0} not found")]
    Device(DeviceId),
}

/// Why an inbound topic or payload was dropped.
#[derive(Debug, thiserror::Error)]
pub enum MalformedEventError {
    #[error("unexpected topic shape {topic:?}")]
    Topic { topic: String },

    #[error("unknown sensor kind {kind:?}")]
    UnknownSensor { kind: String },

    #[error("payload is not a valid envelope")]
    Payload(#[source] serde_json::Error),

    #[error("envelope must carry exactly one event, got {0}")]
    EventCount(usize),

    #[error("invalid timestamp {0}")]
    Timestamp(String),

    #[error("invalid {kind} value {value}")]
    Value { kind: &'static str, value: String },
}
