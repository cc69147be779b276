//! Error types for contact element setup and assembly.

use sim_types::BodyId;
use thiserror::Error;

use crate::ShapeId;

/// Errors raised by contact configuration and evaluation.
///
/// Setup errors (`InvalidConfig`, `InvalidShape`, `DuplicateShape`,
/// `UnknownShape`) are raised before any dynamics step runs. The remaining
/// variants are hard evaluation errors that the outer iteration loop must
/// handle; a structural change is not an error and travels as
/// [`AssemblyStatus`](crate::AssemblyStatus) instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContactError {
    /// Invalid configuration value.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Shape dimensions or margin are not usable.
    #[error("invalid shape for label {label}: {reason}")]
    InvalidShape {
        /// Label the shape was registered under.
        label: u32,
        /// Description of what's wrong.
        reason: String,
    },

    /// Two shapes registered under the same label.
    #[error("shape label {0} is already registered")]
    DuplicateShape(u32),

    /// Shape label not present in the registry.
    #[error("unknown shape label {0}")]
    UnknownShape(ShapeId),

    /// A body referenced by a contact pair is missing from the body set.
    #[error("body {0} is not available in the body set")]
    UnknownBody(BodyId),

    /// A body's pose, velocity or spin-compliance terms contain `NaN` or `Inf`.
    #[error("body {0} has non-finite kinematic state")]
    NonFiniteBody(BodyId),

    /// The solver coefficient must be positive and finite.
    #[error("invalid solver coefficient: {0} (must be positive and finite)")]
    InvalidCoefficient(f64),

    /// The global state vector does not cover the contact unknowns.
    #[error("state vector has {len} entries, index {index} required")]
    StateTooShort {
        /// Index that was requested.
        index: usize,
        /// Length of the provided state vector.
        len: usize,
    },

    /// Jacobian requested for contact points no residual pass has evaluated.
    #[error("contact pair {pair} has points that were never assembled")]
    NotAssembled {
        /// Pair whose points are missing an evaluation.
        pair: String,
    },

    /// Private data query outside the (empty) published range.
    #[error("invalid private data query: {query}")]
    InvalidPrivateData {
        /// The rejected index or name.
        query: String,
    },
}

impl ContactError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(label: u32, reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            label,
            reason: reason.into(),
        }
    }

    /// Create an invalid private data error.
    #[must_use]
    pub fn invalid_private_data(query: impl ToString) -> Self {
        Self::InvalidPrivateData {
            query: query.to_string(),
        }
    }

    /// Check if this error can only occur while building the contact set.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::InvalidShape { .. }
                | Self::DuplicateShape(_)
                | Self::UnknownShape(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContactError::InvalidCoefficient(-1.0);
        assert!(err.to_string().contains("-1"));

        let err = ContactError::StateTooShort { index: 9, len: 4 };
        assert!(err.to_string().contains('9'));

        let err = ContactError::invalid_private_data("force");
        assert!(err.to_string().contains("force"));
    }

    #[test]
    fn test_setup_predicate() {
        assert!(ContactError::invalid_config("bad").is_setup_error());
        assert!(ContactError::DuplicateShape(3).is_setup_error());
        assert!(!ContactError::UnknownBody(BodyId::new(1)).is_setup_error());
        assert!(!ContactError::InvalidCoefficient(0.0).is_setup_error());
        assert!(!ContactError::NonFiniteBody(BodyId::new(2)).is_setup_error());
    }
}
