//! Numerical thresholds shared by every contact pair.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ContactError;

/// Numerical configuration for contact evaluation.
///
/// # Example
///
/// ```
/// use sim_frictional_contact::ContactConfig;
///
/// let config = ContactConfig::default().with_separation_epsilon(1e-12);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactConfig {
    /// Minimum separation-vector length for a point to count as active (m).
    ///
    /// Shorter vectors have no usable direction; those points are treated
    /// as inactive instead of raising an error.
    pub separation_epsilon: f64,

    /// Squared reaction-force magnitude above which the stick branch adds
    /// its geometric-stiffness terms (N²).
    ///
    /// At exactly zero tangential load these terms only amplify noise.
    pub geometric_stiffness_threshold: f64,

    /// Trial tangential force below which a sliding point applies no
    /// friction force (N).
    pub tangent_force_epsilon: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            separation_epsilon: f64::EPSILON,
            geometric_stiffness_threshold: f64::EPSILON,
            tangent_force_epsilon: f64::EPSILON,
        }
    }
}

impl ContactConfig {
    /// Thresholds for noisy geometry sources (mesh or GJK based).
    #[must_use]
    pub fn noise_tolerant() -> Self {
        Self {
            separation_epsilon: 1e-10,
            geometric_stiffness_threshold: 1e-12,
            tangent_force_epsilon: 1e-10,
        }
    }

    /// Set the minimum separation-vector length.
    #[must_use]
    pub fn with_separation_epsilon(mut self, epsilon: f64) -> Self {
        self.separation_epsilon = epsilon;
        self
    }

    /// Set the geometric-stiffness gate.
    #[must_use]
    pub fn with_geometric_stiffness_threshold(mut self, threshold: f64) -> Self {
        self.geometric_stiffness_threshold = threshold;
        self
    }

    /// Set the minimum trial tangential force for sliding friction.
    #[must_use]
    pub fn with_tangent_force_epsilon(mut self, epsilon: f64) -> Self {
        self.tangent_force_epsilon = epsilon;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ContactError> {
        let fields = [
            ("separation_epsilon", self.separation_epsilon),
            (
                "geometric_stiffness_threshold",
                self.geometric_stiffness_threshold,
            ),
            ("tangent_force_epsilon", self.tangent_force_epsilon),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ContactError::invalid_config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
