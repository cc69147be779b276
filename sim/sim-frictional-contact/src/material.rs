//! Material-pair table: which laws govern contact between two materials.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::{ContactError, FrictionLaw, NormalConstitutiveLaw};

/// Friction strategy with its penetration ratio.
#[derive(Debug, Clone)]
pub struct FrictionSpec {
    /// Coefficient law.
    pub law: Arc<dyn FrictionLaw>,
    /// Where the friction arm sits between the two detected surface points,
    /// from `0` (surface of body 1) to `1` (surface of body 2).
    pub penetration_ratio: f64,
}

/// Laws for one unordered material pair.
#[derive(Debug, Clone)]
pub struct MaterialPairSpec {
    /// Normal-force law.
    pub normal: Arc<dyn NormalConstitutiveLaw>,
    /// Friction, if the pair has any.
    pub friction: Option<FrictionSpec>,
}

impl MaterialPairSpec {
    /// Frictionless contact with the given normal law.
    pub fn frictionless(normal: impl NormalConstitutiveLaw + 'static) -> Self {
        Self {
            normal: Arc::new(normal),
            friction: None,
        }
    }

    /// Add friction. The penetration ratio is checked by [`Self::validate`].
    #[must_use]
    pub fn with_friction(
        mut self,
        law: impl FrictionLaw + 'static,
        penetration_ratio: f64,
    ) -> Self {
        self.friction = Some(FrictionSpec {
            law: Arc::new(law),
            penetration_ratio,
        });
        self
    }

    /// Check both laws and the penetration ratio.
    pub fn validate(&self) -> Result<(), ContactError> {
        self.normal.validate()?;
        if let Some(friction) = &self.friction {
            friction.law.validate()?;
            let ratio = friction.penetration_ratio;
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ContactError::invalid_config(format!(
                    "penetration ratio must lie in [0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Table of material pairs.
///
/// Keys are unordered: `("steel", "rubber")` and `("rubber", "steel")` are
/// the same entry.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    pairs: HashMap<(String, String), MaterialPairSpec>,
}

impl MaterialTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_owned(), b.to_owned())
        } else {
            (b.to_owned(), a.to_owned())
        }
    }

    /// Insert or replace a material pair. Invalid specs fail here.
    pub fn insert(&mut self, a: &str, b: &str, spec: MaterialPairSpec) -> Result<(), ContactError> {
        spec.validate()?;
        self.pairs.insert(Self::key(a, b), spec);
        Ok(())
    }

    /// Builder-style [`Self::insert`].
    pub fn with_pair(
        mut self,
        a: &str,
        b: &str,
        spec: MaterialPairSpec,
    ) -> Result<Self, ContactError> {
        self.insert(a, b, spec)?;
        Ok(self)
    }

    /// Find the spec for two materials, in either order.
    #[must_use]
    pub fn lookup(&self, a: &str, b: &str) -> Option<&MaterialPairSpec> {
        self.pairs.get(&Self::key(a, b))
    }

    /// Number of material pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{CoulombFriction, LinearViscoelastic};

    #[test]
    fn test_lookup_is_unordered() {
        let table = MaterialTable::new()
            .with_pair(
                "steel",
                "rubber",
                MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 10.0)),
            )
            .unwrap();
        assert!(table.lookup("rubber", "steel").is_some());
        assert!(table.lookup("steel", "rubber").is_some());
        assert!(table.lookup("steel", "steel").is_none());
    }

    #[test]
    fn test_penetration_ratio_range() {
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0))
            .with_friction(CoulombFriction::new(0.3), 1.5);
        let err = MaterialTable::new().insert("a", "b", spec).unwrap_err();
        assert!(err.is_setup_error());

        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0))
            .with_friction(CoulombFriction::new(0.3), 0.5);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_invalid_law_rejected() {
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(-1.0, 0.0));
        assert!(MaterialTable::new().insert("a", "b", spec).is_err());
    }
}
