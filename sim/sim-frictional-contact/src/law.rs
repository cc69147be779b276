//! One-dimensional constitutive laws for the normal contact force.
//!
//! A law maps a scalar strain and strain rate to a force and its two partial
//! derivatives. Contact elements feed it the penetration depth and its rate,
//! both divided by the law's reference length:
//!
//! ```text
//! s  = depth / L0
//! s' = rate  / L0
//! (F, dF/ds, dF/ds') = law(s, s')
//! ```
//!
//! Laws are stateless so that repeated evaluations at the same state are
//! bit-identical. Piecewise laws report which piece produced the response
//! through [`LawResponse::branch`]; a change of branch between passes is a
//! structural change of the contact equations.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ContactError;

/// Force and partial derivatives returned by a constitutive law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LawResponse {
    /// Force magnitude (positive pushes the bodies apart).
    pub force: f64,
    /// Partial derivative with respect to strain.
    pub d_strain: f64,
    /// Partial derivative with respect to strain rate.
    pub d_strain_rate: f64,
    /// Identifier of the active piece of a piecewise law.
    pub branch: u32,
}

impl LawResponse {
    /// Response of the primary branch.
    #[must_use]
    pub const fn new(force: f64, d_strain: f64, d_strain_rate: f64) -> Self {
        Self {
            force,
            d_strain,
            d_strain_rate,
            branch: 0,
        }
    }

    /// Set the branch identifier.
    #[must_use]
    pub const fn on_branch(mut self, branch: u32) -> Self {
        self.branch = branch;
        self
    }
}

/// Normal-force constitutive law.
pub trait NormalConstitutiveLaw: Debug + Send + Sync {
    /// Evaluate force and derivatives at the given strain and strain rate.
    fn evaluate(&self, strain: f64, strain_rate: f64) -> LawResponse;

    /// Natural length `L0` used to turn depth into strain.
    fn reference_length(&self) -> f64 {
        1.0
    }

    /// Check the law's parameters once, at configuration time.
    fn validate(&self) -> Result<(), ContactError> {
        let l0 = self.reference_length();
        if l0.is_finite() && l0 > 0.0 {
            Ok(())
        } else {
            Err(ContactError::invalid_config(format!(
                "reference length must be positive and finite, got {l0}"
            )))
        }
    }
}

/// Linear spring-damper: `F = k·s + c·s'`.
///
/// With `tension_free` set, a negative force is replaced by zero (the
/// contact cannot pull), and the response moves to branch 1.
///
/// # Example
///
/// ```
/// use sim_frictional_contact::{LinearViscoelastic, NormalConstitutiveLaw};
///
/// let law = LinearViscoelastic::new(1000.0, 0.0);
/// let response = law.evaluate(0.01, -0.1);
/// assert!((response.force - 10.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearViscoelastic {
    /// Stiffness `k` (N per unit strain).
    pub stiffness: f64,
    /// Damping `c` (N per unit strain rate).
    pub damping: f64,
    /// Reference length `L0`.
    pub reference_length: f64,
    /// Clamp tensile forces to zero.
    pub tension_free: bool,
}

impl LinearViscoelastic {
    /// Branch reported when the tensile force was cut off.
    pub const CUTOFF_BRANCH: u32 = 1;

    /// Create a linear law with unit reference length.
    #[must_use]
    pub fn new(stiffness: f64, damping: f64) -> Self {
        Self {
            stiffness,
            damping,
            reference_length: 1.0,
            tension_free: false,
        }
    }

    /// Set the reference length.
    #[must_use]
    pub fn with_reference_length(mut self, reference_length: f64) -> Self {
        self.reference_length = reference_length;
        self
    }

    /// Clamp tensile forces to zero.
    #[must_use]
    pub fn tension_free(mut self) -> Self {
        self.tension_free = true;
        self
    }
}

impl NormalConstitutiveLaw for LinearViscoelastic {
    fn evaluate(&self, strain: f64, strain_rate: f64) -> LawResponse {
        let force = self.stiffness * strain + self.damping * strain_rate;
        if self.tension_free && force < 0.0 {
            return LawResponse::new(0.0, 0.0, 0.0).on_branch(Self::CUTOFF_BRANCH);
        }
        LawResponse::new(force, self.stiffness, self.damping)
    }

    fn reference_length(&self) -> f64 {
        self.reference_length
    }

    fn validate(&self) -> Result<(), ContactError> {
        if !(self.stiffness.is_finite() && self.damping.is_finite()) {
            return Err(ContactError::invalid_config(
                "linear law stiffness and damping must be finite",
            ));
        }
        if self.stiffness < 0.0 || self.damping < 0.0 {
            return Err(ContactError::invalid_config(
                "linear law stiffness and damping cannot be negative",
            ));
        }
        if !(self.reference_length.is_finite() && self.reference_length > 0.0) {
            return Err(ContactError::invalid_config(
                "reference length must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Power-law spring with linear damping: `F = k·s^p + c·s'`.
///
/// Exponents above one give Hertz-like stiffening (`p = 1.5` for spheres).
/// Negative strain produces no spring force.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerLawViscoelastic {
    /// Stiffness coefficient `k`.
    pub stiffness: f64,
    /// Exponent `p` (at least 1).
    pub exponent: f64,
    /// Damping `c`.
    pub damping: f64,
    /// Reference length `L0`.
    pub reference_length: f64,
}

impl PowerLawViscoelastic {
    /// Create a power law with unit reference length.
    #[must_use]
    pub fn new(stiffness: f64, exponent: f64, damping: f64) -> Self {
        Self {
            stiffness,
            exponent,
            damping,
            reference_length: 1.0,
        }
    }

    /// Hertzian contact exponent.
    #[must_use]
    pub fn hertz(stiffness: f64, damping: f64) -> Self {
        Self::new(stiffness, 1.5, damping)
    }

    /// Set the reference length.
    #[must_use]
    pub fn with_reference_length(mut self, reference_length: f64) -> Self {
        self.reference_length = reference_length;
        self
    }
}

impl NormalConstitutiveLaw for PowerLawViscoelastic {
    fn evaluate(&self, strain: f64, strain_rate: f64) -> LawResponse {
        let damping = self.damping * strain_rate;
        if strain <= 0.0 {
            return LawResponse::new(damping, 0.0, self.damping).on_branch(1);
        }
        let spring = self.stiffness * strain.powf(self.exponent);
        let d_strain = self.stiffness * self.exponent * strain.powf(self.exponent - 1.0);
        LawResponse::new(spring + damping, d_strain, self.damping)
    }

    fn reference_length(&self) -> f64 {
        self.reference_length
    }

    fn validate(&self) -> Result<(), ContactError> {
        if !(self.exponent.is_finite() && self.exponent >= 1.0) {
            return Err(ContactError::invalid_config(format!(
                "power law exponent must be at least 1, got {}",
                self.exponent
            )));
        }
        if !(self.stiffness >= 0.0 && self.damping >= 0.0) {
            return Err(ContactError::invalid_config(
                "power law stiffness and damping cannot be negative",
            ));
        }
        if !(self.reference_length.is_finite() && self.reference_length > 0.0) {
            return Err(ContactError::invalid_config(
                "reference length must be positive and finite",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_response() {
        let law = LinearViscoelastic::new(1000.0, 20.0);
        let r = law.evaluate(0.01, -0.1);
        assert_relative_eq!(r.force, 10.0 - 2.0, epsilon = 1e-12);
        assert_eq!(r.d_strain, 1000.0);
        assert_eq!(r.d_strain_rate, 20.0);
        assert_eq!(r.branch, 0);
    }

    #[test]
    fn test_tension_free_cutoff_switches_branch() {
        let law = LinearViscoelastic::new(1000.0, 500.0).tension_free();
        let pushing = law.evaluate(0.01, 0.0);
        assert_eq!(pushing.branch, 0);

        let pulling = law.evaluate(0.01, -1.0);
        assert_eq!(pulling.force, 0.0);
        assert_eq!(pulling.d_strain, 0.0);
        assert_eq!(pulling.branch, LinearViscoelastic::CUTOFF_BRANCH);
    }

    #[test]
    fn test_power_law_derivative_matches_difference() {
        let law = PowerLawViscoelastic::hertz(1e5, 10.0);
        let s = 0.02;
        let h = 1e-7;
        let r = law.evaluate(s, 0.3);
        let fd = (law.evaluate(s + h, 0.3).force - law.evaluate(s - h, 0.3).force) / (2.0 * h);
        assert_relative_eq!(r.d_strain, fd, max_relative = 1e-6);
    }

    #[test]
    fn test_validation() {
        assert!(LinearViscoelastic::new(1.0, 0.0).validate().is_ok());
        assert!(LinearViscoelastic::new(-1.0, 0.0).validate().is_err());
        assert!(LinearViscoelastic::new(1.0, 0.0)
            .with_reference_length(0.0)
            .validate()
            .is_err());
        assert!(PowerLawViscoelastic::new(1.0, 0.5, 0.0).validate().is_err());
    }
}
