//! The contact set: every contact pair of a simulation, driven as one unit.
//!
//! One residual pass does, in order:
//!
//! 1. synchronize every tracked [`ShapeProxy`] with its body,
//! 2. clear every pair's point list and run the geometry source once,
//! 3. route each detected contact to its pair (unregistered pairs are
//!    dropped),
//! 4. lay the pairs out: two unknowns per point starting at the first
//!    index, and one slot per pair in the stacked work storage,
//! 5. assemble each pair in [`ShapePair`] order and merge their statuses.
//!
//! The Jacobian pass reuses the points and regimes of the last residual
//! pass; it does not re-detect.

use std::collections::{BTreeMap, BTreeSet};

use sim_types::{BodyId, BodySet};
use tracing::{debug, trace, warn};

use crate::{
    AssemblyStatus, ContactConfig, ContactError, ContactGeometrySource, ContactPairElement,
    ContactReport, Footprint, LayoutCursor, MaterialTable, ShapeId, ShapePair, ShapeProxy,
    ShapeRegistry, WorkMatrix, WorkVector,
};

/// Residual blocks of one pass and whether the equations changed.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ResidualAssembly {
    /// One block per pair with at least one point, in pair order.
    pub blocks: Vec<WorkVector>,
    /// Structural-change status of the whole contact set.
    pub status: AssemblyStatus,
}

impl ResidualAssembly {
    /// Add every block into a global residual.
    pub fn scatter_add(&self, global: &mut nalgebra::DVector<f64>) -> Result<(), ContactError> {
        self.blocks.iter().try_for_each(|b| b.scatter_add(global))
    }

    /// Copy every block into its slot of a stacked vector of
    /// [`Footprint::rows`] entries.
    pub fn stack_into(&self, storage: &mut nalgebra::DVector<f64>) -> Result<(), ContactError> {
        self.blocks.iter().try_for_each(|b| b.stack_into(storage))
    }
}

/// All contact pairs of a simulation.
pub struct ContactSetManager {
    config: ContactConfig,
    proxies: Vec<ShapeProxy>,
    pairs: BTreeMap<ShapePair, ContactPairElement>,
    source: Box<dyn ContactGeometrySource>,
    bodies: BTreeSet<BodyId>,
    first_index: usize,
    footprint: Footprint,
}

impl std::fmt::Debug for ContactSetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactSetManager")
            .field("config", &self.config)
            .field("pairs", &self.pairs.keys().collect::<Vec<_>>())
            .field("bodies", &self.bodies)
            .field("first_index", &self.first_index)
            .field("footprint", &self.footprint)
            .finish_non_exhaustive()
    }
}

impl ContactSetManager {
    /// Build the contact set for the listed shapes.
    ///
    /// Each shape is paired with every shape listed before it. A pair is
    /// kept when the table has an entry for its two materials; the later
    /// shape becomes body 1 of the pair. Shapes on the same body are never
    /// paired.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, an unknown label, or a label listed twice.
    pub fn new(
        registry: &ShapeRegistry,
        shapes: &[ShapeId],
        materials: &MaterialTable,
        source: impl ContactGeometrySource + 'static,
        config: ContactConfig,
    ) -> Result<Self, ContactError> {
        config.validate()?;
        let mut proxies: Vec<ShapeProxy> = Vec::with_capacity(shapes.len());
        let mut pairs = BTreeMap::new();

        for &id in shapes {
            let proxy = registry.get(id)?;
            if proxies.iter().any(|p| p.id() == id) {
                return Err(ContactError::DuplicateShape(id.raw()));
            }
            for earlier in &proxies {
                if earlier.body() == proxy.body() {
                    warn!(
                        first = %id,
                        second = %earlier.id(),
                        body = %proxy.body(),
                        "shapes share a body; pair skipped"
                    );
                    continue;
                }
                let Some(spec) = materials.lookup(proxy.material(), earlier.material()) else {
                    continue;
                };
                let pair = ShapePair::new(id, earlier.id());
                pairs.insert(
                    pair,
                    ContactPairElement::new(pair, proxy.body(), earlier.body(), spec),
                );
            }
            proxies.push(proxy.clone());
        }

        let bodies: BTreeSet<BodyId> = pairs
            .values()
            .flat_map(|p: &ContactPairElement| {
                let (a, b) = p.bodies();
                [a, b]
            })
            .collect();
        debug!(shapes = proxies.len(), pairs = pairs.len(), "built contact set");

        Ok(Self {
            config,
            proxies,
            pairs,
            source: Box::new(source),
            bodies,
            first_index: 0,
            footprint: Footprint::default(),
        })
    }

    /// Build the contact set over every registered shape, in label order.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config.
    pub fn from_registry(
        registry: &ShapeRegistry,
        materials: &MaterialTable,
        source: impl ContactGeometrySource + 'static,
        config: ContactConfig,
    ) -> Result<Self, ContactError> {
        let shapes: Vec<ShapeId> = registry.iter().map(ShapeProxy::id).collect();
        Self::new(registry, &shapes, materials, source, config)
    }

    /// Numerical configuration.
    #[must_use]
    pub fn config(&self) -> &ContactConfig {
        &self.config
    }

    /// Set the global index of the first contact unknown.
    pub fn set_first_index(&mut self, first_index: usize) {
        self.first_index = first_index;
    }

    /// Global index of the first contact unknown.
    #[must_use]
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Footprint of the last allocation.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Number of contact unknowns of the last allocation.
    #[must_use]
    pub fn num_unknowns(&self) -> usize {
        self.footprint.unknowns
    }

    /// Number of contact pairs.
    #[must_use]
    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Look up a pair element.
    #[must_use]
    pub fn pair(&self, pair: ShapePair) -> Option<&ContactPairElement> {
        self.pairs.get(&pair)
    }

    /// Iterate over pairs in evaluation order.
    pub fn pairs(&self) -> impl Iterator<Item = &ContactPairElement> {
        self.pairs.values()
    }

    /// Tracked shapes, in listing order.
    #[must_use]
    pub fn proxies(&self) -> &[ShapeProxy] {
        &self.proxies
    }

    /// Bodies that take part in at least one pair, sorted.
    #[must_use]
    pub fn connected_bodies(&self) -> &BTreeSet<BodyId> {
        &self.bodies
    }

    /// Per-point output of the last residual pass, in pair order.
    pub fn reports(&self) -> impl Iterator<Item = &ContactReport> {
        self.pairs.values().flat_map(|p| p.reports().iter())
    }

    /// Synchronize proxies, run detection and route contacts to pairs.
    pub fn refresh_geometry(&mut self, bodies: &dyn BodySet) -> Result<(), ContactError> {
        for proxy in &mut self.proxies {
            let body = bodies
                .body(proxy.body())
                .ok_or(ContactError::UnknownBody(proxy.body()))?;
            if !body.is_finite() {
                return Err(ContactError::NonFiniteBody(proxy.body()));
            }
            proxy.sync(body);
        }
        for element in self.pairs.values_mut() {
            element.clear_points();
        }

        let contacts = self.source.detect(&self.proxies);
        let mut routed = 0usize;
        for raw in contacts {
            let direct = ShapePair::new(raw.shape_a, raw.shape_b);
            let (pair, contact) = if self.pairs.contains_key(&direct) {
                (direct, raw)
            } else {
                (direct.swapped(), raw.swapped())
            };
            let Some(element) = self.pairs.get_mut(&pair) else {
                continue;
            };
            let (id1, id2) = element.bodies();
            let b1 = bodies.body(id1).ok_or(ContactError::UnknownBody(id1))?;
            let b2 = bodies.body(id2).ok_or(ContactError::UnknownBody(id2))?;
            element.push_contact(b1, b2, &contact.point_on_a, &contact.point_on_b, contact.feature);
            routed += 1;
        }
        trace!(routed, "routed contacts");
        Ok(())
    }

    /// Assign unknowns and stacked-storage slots to every pair of the
    /// current pass.
    ///
    /// Reports a structural change when the footprint differs from the
    /// previous allocation.
    pub fn allocate_layout(&mut self) -> AssemblyStatus {
        let mut cursor = LayoutCursor::new(self.first_index);
        let footprint: Footprint = self
            .pairs
            .values_mut()
            .map(|element| element.assign_layout(&mut cursor))
            .sum();
        let changed = footprint != self.footprint;
        if changed {
            debug!(
                unknowns = footprint.unknowns,
                previous = self.footprint.unknowns,
                "contact layout changed"
            );
        }
        self.footprint = footprint;
        AssemblyStatus::from_changed(changed)
    }

    /// Refresh geometry and assemble the residual of every pair.
    ///
    /// # Errors
    ///
    /// Fails on a non-positive coefficient, a missing or non-finite body, or
    /// a state vector that does not cover the contact unknowns.
    pub fn compute_residual(
        &mut self,
        bodies: &dyn BodySet,
        state: &[f64],
        coefficient: f64,
    ) -> Result<ResidualAssembly, ContactError> {
        check_coefficient(coefficient)?;
        self.refresh_geometry(bodies)?;
        let mut status = self.allocate_layout();

        let mut blocks = Vec::new();
        for element in self.pairs.values_mut() {
            let (block, pair_status) =
                element.assemble_residual(bodies, state, coefficient, &self.config)?;
            status |= pair_status;
            if !block.is_empty() {
                blocks.push(block);
            }
        }
        if status.is_structural_change() {
            debug!(unknowns = self.footprint.unknowns, "contact set changed structure");
        }
        Ok(ResidualAssembly { blocks, status })
    }

    /// Assemble the Jacobian of every pair for the last residual pass.
    ///
    /// # Errors
    ///
    /// Fails with [`ContactError::NotAssembled`] when a pair holds points no
    /// residual pass has evaluated.
    pub fn compute_jacobian(
        &self,
        bodies: &dyn BodySet,
        state: &[f64],
        coefficient: f64,
    ) -> Result<Vec<WorkMatrix>, ContactError> {
        check_coefficient(coefficient)?;
        self.pairs
            .values()
            .filter(|element| element.num_points() > 0)
            .map(|element| element.assemble_jacobian(bodies, state, coefficient, &self.config))
            .collect()
    }

    /// Reset every stick/slip record before the first step.
    pub fn on_initialize(&mut self) {
        self.reset_states();
        debug!("contact states initialized");
    }

    /// Reset every stick/slip record once a step has converged.
    pub fn on_step_accepted(&mut self) {
        self.reset_states();
        debug!("contact states reset after accepted step");
    }

    fn reset_states(&mut self) {
        for element in self.pairs.values_mut() {
            element.reset_states();
        }
    }

    /// Number of published scalar outputs. Always zero.
    #[must_use]
    pub fn private_data_count(&self) -> usize {
        0
    }

    /// Index of a published output by name. No name is valid.
    pub fn private_data_index(&self, name: &str) -> Result<usize, ContactError> {
        Err(ContactError::invalid_private_data(name))
    }

    /// Value of a published output. No index is valid.
    pub fn private_data(&self, index: usize) -> Result<f64, ContactError> {
        Err(ContactError::invalid_private_data(index))
    }
}

fn check_coefficient(coefficient: f64) -> Result<(), ContactError> {
    if coefficient.is_finite() && coefficient > 0.0 {
        Ok(())
    } else {
        Err(ContactError::InvalidCoefficient(coefficient))
    }
}
