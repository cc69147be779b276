//! Explicit registry of collision shapes for one simulation run.

use std::collections::BTreeMap;

use crate::{ContactError, ShapeId, ShapeProxy};

/// Shapes known to a simulation, keyed by label.
///
/// The registry is owned by whoever builds the contact set and is passed to
/// [`ContactSetManager::new`](crate::ContactSetManager::new); it lives as
/// long as the run that created it.
///
/// # Example
///
/// ```
/// use sim_frictional_contact::{Shape, ShapeId, ShapeProxy, ShapeRegistry};
/// use sim_types::BodyId;
///
/// let mut registry = ShapeRegistry::new();
/// let ball = ShapeProxy::new(ShapeId(1), BodyId(0), Shape::sphere(0.1), "steel").unwrap();
/// registry.register(ball).unwrap();
/// assert!(registry.get(ShapeId(1)).is_ok());
/// assert!(registry.get(ShapeId(2)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: BTreeMap<ShapeId, ShapeProxy>,
}

impl ShapeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape. Labels must be unique.
    pub fn register(&mut self, proxy: ShapeProxy) -> Result<ShapeId, ContactError> {
        let id = proxy.id();
        if self.shapes.contains_key(&id) {
            return Err(ContactError::DuplicateShape(id.raw()));
        }
        self.shapes.insert(id, proxy);
        Ok(id)
    }

    /// Look up a shape by label.
    pub fn get(&self, id: ShapeId) -> Result<&ShapeProxy, ContactError> {
        self.shapes.get(&id).ok_or(ContactError::UnknownShape(id))
    }

    /// Number of registered shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Check if no shape is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterate over shapes in label order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapeProxy> {
        self.shapes.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Shape;
    use sim_types::BodyId;

    fn ball(label: u32, body: u64) -> ShapeProxy {
        ShapeProxy::new(ShapeId(label), BodyId(body), Shape::sphere(0.5), "steel").unwrap()
    }

    #[test]
    fn test_duplicate_label_fails() {
        let mut registry = ShapeRegistry::new();
        registry.register(ball(1, 0)).unwrap();
        let err = registry.register(ball(1, 3)).unwrap_err();
        assert_eq!(err, ContactError::DuplicateShape(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_iterates_in_label_order() {
        let mut registry = ShapeRegistry::new();
        registry.register(ball(3, 0)).unwrap();
        registry.register(ball(1, 0)).unwrap();
        registry.register(ball(2, 1)).unwrap();
        let labels: Vec<_> = registry.iter().map(ShapeProxy::id).collect();
        assert_eq!(labels, vec![ShapeId(1), ShapeId(2), ShapeId(3)]);
        assert!(matches!(
            registry.get(ShapeId(9)),
            Err(ContactError::UnknownShape(ShapeId(9)))
        ));
    }
}
