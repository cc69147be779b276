//! Friction coefficient laws.
//!
//! A friction law maps the relative tangential sliding speed at a contact
//! point to a Coulomb coefficient `μ ≥ 0`. The contact element needs the
//! slope `dμ/dv` as well, because the sliding branch of the Jacobian
//! differentiates `μ(|V_t|)·F_n`.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ContactError;

/// Friction coefficient as a function of sliding speed.
pub trait FrictionLaw: Debug + Send + Sync {
    /// Coefficient at the given relative tangential speed (non-negative).
    fn coefficient(&self, speed: f64) -> f64;

    /// Derivative of [`Self::coefficient`] with respect to speed.
    fn derivative(&self, speed: f64) -> f64;

    /// Check the law's parameters once, at configuration time.
    fn validate(&self) -> Result<(), ContactError> {
        Ok(())
    }
}

fn check_coefficient(name: &str, mu: f64) -> Result<(), ContactError> {
    if mu.is_finite() && mu >= 0.0 {
        Ok(())
    } else {
        Err(ContactError::invalid_config(format!(
            "{name} must be finite and non-negative, got {mu}"
        )))
    }
}

fn check_velocity(name: &str, velocity: f64) -> Result<(), ContactError> {
    if velocity.is_finite() && velocity > 0.0 {
        Ok(())
    } else {
        Err(ContactError::invalid_config(format!(
            "{name} must be positive and finite, got {velocity}"
        )))
    }
}

/// Constant Coulomb coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoulombFriction {
    /// Friction coefficient.
    pub mu: f64,
}

impl CoulombFriction {
    /// Create a constant friction law.
    #[must_use]
    pub fn new(mu: f64) -> Self {
        Self { mu }
    }
}

impl FrictionLaw for CoulombFriction {
    fn coefficient(&self, _speed: f64) -> f64 {
        self.mu
    }

    fn derivative(&self, _speed: f64) -> f64 {
        0.0
    }

    fn validate(&self) -> Result<(), ContactError> {
        check_coefficient("mu", self.mu)
    }
}

/// Stribeck curve: exponential decay from static to kinetic friction.
///
/// ```text
/// μ(v) = μ_k + (μ_s - μ_k) · exp(-v / v_s)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StribeckFriction {
    /// Static friction coefficient.
    pub mu_static: f64,
    /// Kinetic friction coefficient.
    pub mu_kinetic: f64,
    /// Stribeck velocity `v_s` (m/s).
    pub stribeck_velocity: f64,
}

impl StribeckFriction {
    /// Create a Stribeck law with a 1 cm/s transition velocity.
    #[must_use]
    pub fn new(mu_static: f64, mu_kinetic: f64) -> Self {
        Self {
            mu_static,
            mu_kinetic,
            stribeck_velocity: 0.01,
        }
    }

    /// Set the Stribeck velocity.
    #[must_use]
    pub fn with_stribeck_velocity(mut self, velocity: f64) -> Self {
        self.stribeck_velocity = velocity;
        self
    }
}

impl FrictionLaw for StribeckFriction {
    fn coefficient(&self, speed: f64) -> f64 {
        self.mu_kinetic
            + (self.mu_static - self.mu_kinetic) * (-speed / self.stribeck_velocity).exp()
    }

    fn derivative(&self, speed: f64) -> f64 {
        -(self.mu_static - self.mu_kinetic) / self.stribeck_velocity
            * (-speed / self.stribeck_velocity).exp()
    }

    fn validate(&self) -> Result<(), ContactError> {
        check_coefficient("mu_static", self.mu_static)?;
        check_coefficient("mu_kinetic", self.mu_kinetic)?;
        check_velocity("stribeck_velocity", self.stribeck_velocity)
    }
}

/// Smooth static-to-kinetic blend: `μ = μ_s·(1 - tanh(v/v_t)) + μ_k·tanh(v/v_t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaticKineticFriction {
    /// Static friction coefficient.
    pub mu_static: f64,
    /// Kinetic friction coefficient.
    pub mu_kinetic: f64,
    /// Transition velocity (m/s).
    pub velocity_threshold: f64,
}

impl StaticKineticFriction {
    /// Create a static/kinetic law with a 1 cm/s transition velocity.
    #[must_use]
    pub fn new(mu_static: f64, mu_kinetic: f64) -> Self {
        Self {
            mu_static,
            mu_kinetic,
            velocity_threshold: 0.01,
        }
    }
}

impl FrictionLaw for StaticKineticFriction {
    fn coefficient(&self, speed: f64) -> f64 {
        let blend = (speed / self.velocity_threshold).tanh();
        self.mu_static * (1.0 - blend) + self.mu_kinetic * blend
    }

    fn derivative(&self, speed: f64) -> f64 {
        let t = (speed / self.velocity_threshold).tanh();
        (self.mu_kinetic - self.mu_static) * (1.0 - t * t) / self.velocity_threshold
    }

    fn validate(&self) -> Result<(), ContactError> {
        check_coefficient("mu_static", self.mu_static)?;
        check_coefficient("mu_kinetic", self.mu_kinetic)?;
        check_velocity("velocity_threshold", self.velocity_threshold)
    }
}
