//! Contact element for one pair of shapes.
//!
//! # Local layout
//!
//! A pair with `n` contact points owns a square block of size `12 + 2n`:
//!
//! ```text
//! rows/cols 0..3    body 1 force / linear unknowns
//!           3..6    body 1 moment / angular unknowns
//!           6..9    body 2 force / linear unknowns
//!           9..12   body 2 moment / angular unknowns
//!           12+2i   tangential unknowns λ of point i (two each)
//! ```
//!
//! # Per-point equations
//!
//! Every active point applies the normal force `F = d·F_n/|d|` (body 1 gets
//! `+F` at its material point, body 2 gets `-F`). The two unknowns of a
//! point are pinned to zero (`-λ = 0`) unless the point sticks, in which case
//! they are the tangential reaction in the point's [`TangentBasis`] and
//! their rows enforce zero tangential velocity.
//!
//! The Jacobian is `-(∂r/∂ẏ + c·∂r/∂y)` on body columns and `-∂r/∂λ` on
//! unknown columns. It differentiates every quantity the residual uses,
//! including the tangent basis, the friction coefficient and the Coulomb
//! clamp, so it matches finite differences of the residual.

use std::sync::Arc;

use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};
use sim_types::{BodyId, BodySet, RigidBodyKinematics, SpinCompliance};
use tracing::{debug, trace};

use crate::basis::TangentBasis;
use crate::gradient::{self, Gradient1, Gradient3, ANGULAR_1, ANGULAR_2, LINEAR_1, LINEAR_2};
use crate::{
    AssemblyStatus, ContactConfig, ContactError, ContactKey, ContactPoint, ContactRegime,
    ContactReport, ContactState, EquationSignature, FeatureId, Footprint, FrictionLaw,
    FrictionSpec, LawResponse, LayoutCursor, MaterialPairSpec, NormalConstitutiveLaw, ShapePair,
    StickSlip, WorkMatrix, WorkVector,
};

/// Snapshot of one body for a single evaluation.
#[derive(Debug, Clone, Copy)]
struct BodyFrame {
    position: Vector3<f64>,
    orientation: Matrix3<f64>,
    linear: Vector3<f64>,
    angular: Vector3<f64>,
    spin: SpinCompliance,
    dof: usize,
}

impl BodyFrame {
    fn read(body: &dyn RigidBodyKinematics) -> Self {
        Self {
            position: body.position(),
            orientation: body.orientation(),
            linear: body.linear_velocity(),
            angular: body.angular_velocity(),
            spin: body.spin_compliance().unwrap_or_default(),
            dof: body.dof_offset(),
        }
    }
}

/// World-frame kinematics of one contact point.
#[derive(Debug, Clone, Copy)]
struct PointKinematics {
    /// Material point arms `R_i·offset_i`.
    o1: Vector3<f64>,
    o2: Vector3<f64>,
    /// Separation `d` between the material points and its rate.
    separation: Vector3<f64>,
    separation_rate: Vector3<f64>,
    depth: f64,
    rate: f64,
    /// Friction arms from each body's reference point.
    r1: Vector3<f64>,
    r2: Vector3<f64>,
    active: bool,
}

impl PointKinematics {
    fn new(point: &ContactPoint, b1: &BodyFrame, b2: &BodyFrame, config: &ContactConfig) -> Self {
        let o1 = b1.orientation * point.offset1;
        let o2 = b2.orientation * point.offset2;
        let separation = b2.position + o2 - b1.position - o1;
        let separation_rate =
            b2.linear + b2.angular.cross(&o2) - b1.linear - b1.angular.cross(&o1);
        let depth = separation.norm();
        let rate = if depth > 0.0 {
            separation.dot(&separation_rate) / depth
        } else {
            0.0
        };
        let r2 = b2.orientation * point.arm2;
        let r1 = b2.position + r2 - b1.position;
        let active = separation.dot(&(b2.position - b1.position)) < 0.0
            && depth > config.separation_epsilon;
        Self {
            o1,
            o2,
            separation,
            separation_rate,
            depth,
            rate,
            r1,
            r2,
            active,
        }
    }

    fn normal_force(&self, response: &LawResponse) -> Vector3<f64> {
        self.separation * (response.force / self.depth)
    }
}

/// Tangential quantities at the friction arm.
#[derive(Debug, Clone, Copy)]
struct FrictionKinematics {
    normal: Vector3<f64>,
    velocity: Vector3<f64>,
    tangential: Vector3<f64>,
    speed: f64,
    mu: f64,
    /// Unprojected `(r2×B2 + G2)×r2 - (r1×B1 + G1)×r1`.
    raw: Vector3<f64>,
    /// Trial tangential force.
    trial: Vector3<f64>,
}

impl FrictionKinematics {
    fn new(
        kin: &PointKinematics,
        b1: &BodyFrame,
        b2: &BodyFrame,
        law: &dyn FrictionLaw,
        coefficient: f64,
    ) -> Self {
        let normal = kin.separation / kin.depth;
        let velocity =
            b2.linear + b2.angular.cross(&kin.r2) - b1.linear - b1.angular.cross(&kin.r1);
        let tangential = velocity - normal * normal.dot(&velocity);
        let speed = tangential.norm();
        let raw = b2.spin.force_at_arm(&kin.r2) - b1.spin.force_at_arm(&kin.r1);
        let trial = (raw - normal * normal.dot(&raw)) / coefficient;
        Self {
            normal,
            velocity,
            tangential,
            speed,
            mu: law.coefficient(speed),
            raw,
            trial,
        }
    }

    /// Coulomb-clamped sliding force, zero below the trial-force epsilon.
    fn slip_force(&self, normal_force: f64, config: &ContactConfig) -> Vector3<f64> {
        let magnitude = self.trial.norm();
        if magnitude <= config.tangent_force_epsilon {
            return Vector3::zeros();
        }
        self.trial * (self.mu * normal_force / magnitude)
    }
}

/// Gradients shared by every branch of an active point.
#[derive(Debug, Clone, Copy)]
struct PointGradients {
    o1: Gradient3,
    o2: Gradient3,
    separation: Gradient3,
    separation_rate: Gradient3,
    r1: Gradient3,
    r2: Gradient3,
    velocity: Gradient3,
    normal: Gradient3,
}

impl PointGradients {
    fn new(kin: &PointKinematics, b1: &BodyFrame, b2: &BodyFrame, coefficient: f64) -> Self {
        let x1 = gradient::position(LINEAR_1, coefficient);
        let x2 = gradient::position(LINEAR_2, coefficient);
        let v1 = gradient::velocity(LINEAR_1);
        let v2 = gradient::velocity(LINEAR_2);
        let w1 = gradient::velocity(ANGULAR_1);
        let w2 = gradient::velocity(ANGULAR_2);

        let o1 = gradient::rotated(ANGULAR_1, &kin.o1, coefficient);
        let o2 = gradient::rotated(ANGULAR_2, &kin.o2, coefficient);
        let separation = x2 + o2 - x1 - o1;
        let separation_rate = v2 + gradient::cross(&b2.angular, &w2, &kin.o2, &o2)
            - v1
            - gradient::cross(&b1.angular, &w1, &kin.o1, &o1);

        let r2 = gradient::rotated(ANGULAR_2, &kin.r2, coefficient);
        let r1 = x2 + r2 - x1;
        let velocity = v2 + gradient::cross(&b2.angular, &w2, &kin.r2, &r2)
            - v1
            - gradient::cross(&b1.angular, &w1, &kin.r1, &r1);

        Self {
            o1,
            o2,
            separation,
            separation_rate,
            r1,
            r2,
            velocity,
            normal: gradient::unit(&kin.separation, &separation),
        }
    }

    /// Gradient of the law's force magnitude.
    fn normal_magnitude(
        &self,
        kin: &PointKinematics,
        response: &LawResponse,
        reference_length: f64,
    ) -> (Gradient1, Gradient1) {
        let length = gradient::norm(&kin.separation, &self.separation);
        let rate = (gradient::dot(
            &kin.separation,
            &self.separation,
            &kin.separation_rate,
            &self.separation_rate,
        ) - length * kin.rate)
            / kin.depth;
        let force = (length * response.d_strain + rate * response.d_strain_rate) / reference_length;
        (length, force)
    }
}

/// Add a force applied at `arm1` on body 1 and its reaction at `arm2` on
/// body 2.
fn apply_pair_force(
    residual: &mut WorkVector,
    force: &Vector3<f64>,
    arm1: &Vector3<f64>,
    arm2: &Vector3<f64>,
) {
    residual.add_vector(0, force);
    residual.add_vector(3, &arm1.cross(force));
    residual.add_vector(6, &-force);
    residual.add_vector(9, &-arm2.cross(force));
}

/// Jacobian counterpart of [`apply_pair_force`].
fn apply_pair_gradient(
    jacobian: &mut WorkMatrix,
    force: (&Vector3<f64>, &Gradient3),
    arm1: (&Vector3<f64>, &Gradient3),
    arm2: (&Vector3<f64>, &Gradient3),
) {
    let (f, gf) = force;
    jacobian.add_gradient(0, gf, -1.0);
    jacobian.add_gradient(3, &gradient::cross(arm1.0, arm1.1, f, gf), -1.0);
    jacobian.add_gradient(6, gf, 1.0);
    jacobian.add_gradient(9, &gradient::cross(arm2.0, arm2.1, f, gf), 1.0);
}

/// Stick/slip decision for one pass. Updates the record and returns whether
/// the point slides.
fn decide_slip(record: &mut ContactState, trial: &Vector3<f64>, limit: f64) -> bool {
    let same_direction = record.ft_prev.dot(trial) >= 0.0;
    let slip = same_direction
        && match record.stick {
            StickSlip::Slip => true,
            StickSlip::Undefined => limit < trial.norm(),
            StickSlip::NoSlip => false,
        };
    record.stick = if slip {
        StickSlip::Slip
    } else {
        StickSlip::NoSlip
    };
    record.ft_prev = *trial;
    slip
}

fn read_unknown(state: &[f64], index: usize) -> Result<f64, ContactError> {
    state
        .get(index)
        .copied()
        .ok_or(ContactError::StateTooShort {
            index,
            len: state.len(),
        })
}

/// Contact element owning the points between two shapes.
///
/// Built once at configuration time. The point list is rebuilt every
/// residual pass; the stick/slip records are keyed by [`ContactKey`] and
/// carried across passes until the step is accepted.
#[derive(Debug, Clone)]
pub struct ContactPairElement {
    pair: ShapePair,
    body1: BodyId,
    body2: BodyId,
    normal: Arc<dyn NormalConstitutiveLaw>,
    friction: Option<FrictionSpec>,
    points: Vec<ContactPoint>,
    states: HashMap<ContactKey, ContactState>,
    reports: Vec<ContactReport>,
    slot: LayoutCursor,
}

impl ContactPairElement {
    /// Create an element. `pair.first` sits on `body1`, `pair.second` on
    /// `body2`.
    #[must_use]
    pub fn new(pair: ShapePair, body1: BodyId, body2: BodyId, spec: &MaterialPairSpec) -> Self {
        Self {
            pair,
            body1,
            body2,
            normal: Arc::clone(&spec.normal),
            friction: spec.friction.clone(),
            points: Vec::new(),
            states: HashMap::new(),
            reports: Vec::new(),
            slot: LayoutCursor::default(),
        }
    }

    /// Shapes of this element.
    #[must_use]
    pub fn pair(&self) -> ShapePair {
        self.pair
    }

    /// Bodies carrying the two shapes.
    #[must_use]
    pub fn bodies(&self) -> (BodyId, BodyId) {
        (self.body1, self.body2)
    }

    /// Check if the pair has a friction law.
    #[must_use]
    pub fn has_friction(&self) -> bool {
        self.friction.is_some()
    }

    /// Points of the current pass.
    #[must_use]
    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    /// Number of points of the current pass.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Per-point output of the last residual pass.
    #[must_use]
    pub fn reports(&self) -> &[ContactReport] {
        &self.reports
    }

    /// Persistent record of a point.
    #[must_use]
    pub fn state(&self, key: &ContactKey) -> Option<&ContactState> {
        self.states.get(key)
    }

    /// Global index of this pair's first unknown.
    #[must_use]
    pub fn first_unknown(&self) -> usize {
        self.slot.unknown
    }

    /// Where this pair starts in the unknowns and the stacked work storage.
    #[must_use]
    pub fn slot(&self) -> LayoutCursor {
        self.slot
    }

    /// Footprint of the current point list.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        Footprint::of_pair(self.points.len())
    }

    /// Drop all points of the previous pass.
    pub fn clear_points(&mut self) {
        self.points.clear();
        self.reports.clear();
    }

    /// Add a detected contact. `p1` lies on the shape of body 1, `p2` on the
    /// shape of body 2.
    pub fn push_contact(
        &mut self,
        body1: &dyn RigidBodyKinematics,
        body2: &dyn RigidBodyKinematics,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        feature: Option<FeatureId>,
    ) -> ContactKey {
        let feature = feature.unwrap_or_else(|| FeatureId::ordinal(self.points.len()));
        let occurrence = self
            .points
            .iter()
            .filter(|p| p.key.feature == feature)
            .count();
        let key = ContactKey::new(feature, u32::try_from(occurrence).unwrap_or(u32::MAX));
        let ratio = self
            .friction
            .as_ref()
            .map_or(0.0, |f| f.penetration_ratio);
        self.points.push(ContactPoint::from_surface_points(
            key, body1, body2, p1, p2, ratio,
        ));
        key
    }

    /// Start this pair at `cursor` and advance it past the pair's footprint.
    pub fn assign_layout(&mut self, cursor: &mut LayoutCursor) -> Footprint {
        self.slot = *cursor;
        let footprint = self.footprint();
        cursor.advance(footprint);
        footprint
    }

    /// Reset every stick/slip record and forget records of vanished points.
    pub fn reset_states(&mut self) {
        let points = &self.points;
        self.states
            .retain(|key, _| points.iter().any(|p| p.key == *key));
        for state in self.states.values_mut() {
            state.reset();
        }
    }

    fn frames(&self, bodies: &dyn BodySet) -> Result<(BodyFrame, BodyFrame), ContactError> {
        let b1 = bodies
            .body(self.body1)
            .ok_or(ContactError::UnknownBody(self.body1))?;
        let b2 = bodies
            .body(self.body2)
            .ok_or(ContactError::UnknownBody(self.body2))?;
        if !b1.is_finite() {
            return Err(ContactError::NonFiniteBody(self.body1));
        }
        if !b2.is_finite() {
            return Err(ContactError::NonFiniteBody(self.body2));
        }
        Ok((BodyFrame::read(b1), BodyFrame::read(b2)))
    }

    fn indices(&self, b1: &BodyFrame, b2: &BodyFrame) -> Vec<usize> {
        (b1.dof..b1.dof + 6)
            .chain(b2.dof..b2.dof + 6)
            .chain(self.slot.unknown..self.slot.unknown + 2 * self.points.len())
            .collect()
    }

    fn law_response(&self, kin: &PointKinematics) -> LawResponse {
        let l0 = self.normal.reference_length();
        self.normal.evaluate(kin.depth / l0, kin.rate / l0)
    }

    /// Assemble the residual of every point and update stick/slip records.
    ///
    /// `state` is the global unknown vector; this pair reads its tangential
    /// unknowns from `first_unknown()..first_unknown() + 2n`.
    pub fn assemble_residual(
        &mut self,
        bodies: &dyn BodySet,
        state: &[f64],
        coefficient: f64,
        config: &ContactConfig,
    ) -> Result<(WorkVector, AssemblyStatus), ContactError> {
        self.reports.clear();
        if self.points.is_empty() {
            return Ok((WorkVector::zeros(Vec::new()), AssemblyStatus::Unchanged));
        }
        let (b1, b2) = self.frames(bodies)?;
        let mut residual = WorkVector::zeros(self.indices(&b1, &b2)).with_offset(self.slot.row);
        let mut status = AssemblyStatus::Unchanged;

        for i in 0..self.points.len() {
            let point = self.points[i];
            let row = 12 + 2 * i;
            let unknown = self.slot.unknown + 2 * i;
            let lambda = [
                read_unknown(state, unknown)?,
                read_unknown(state, unknown + 1)?,
            ];
            let kin = PointKinematics::new(&point, &b1, &b2, config);

            let (signature, report) = if kin.active {
                let response = self.law_response(&kin);
                let normal_force = kin.normal_force(&response);
                apply_pair_force(&mut residual, &normal_force, &kin.o1, &kin.o2);

                let mut report = ContactReport::inactive(self.pair, point.key, kin.depth, kin.rate);
                report.normal_force = response.force;

                let regime = match &self.friction {
                    None => {
                        residual.set(row, -lambda[0]);
                        residual.set(row + 1, -lambda[1]);
                        ContactRegime::Frictionless
                    }
                    Some(spec) => {
                        let fk =
                            FrictionKinematics::new(&kin, &b1, &b2, spec.law.as_ref(), coefficient);
                        report.tangential_velocity = fk.tangential;
                        let record = self.states.entry(point.key).or_default();
                        if decide_slip(record, &fk.trial, fk.mu * response.force) {
                            let force = fk.slip_force(response.force, config);
                            apply_pair_force(&mut residual, &force, &kin.r1, &kin.r2);
                            residual.set(row, -lambda[0]);
                            residual.set(row + 1, -lambda[1]);
                            report.friction_force = force;
                            ContactRegime::Slip
                        } else {
                            let basis = TangentBasis::from_normal(&fk.normal);
                            let (e1, e2) = (basis.axis(0), basis.axis(1));
                            let reaction = e1 * lambda[0] + e2 * lambda[1];
                            apply_pair_force(&mut residual, &reaction, &kin.r1, &kin.r2);
                            residual.set(row, -e1.dot(&fk.tangential));
                            residual.set(row + 1, -e2.dot(&fk.tangential));
                            report.friction_force = reaction;
                            ContactRegime::NoSlip
                        }
                    }
                };
                report.regime = regime;
                (EquationSignature::new(regime, response.branch), report)
            } else {
                residual.set(row, -lambda[0]);
                residual.set(row + 1, -lambda[1]);
                (
                    EquationSignature::dormant(),
                    ContactReport::inactive(self.pair, point.key, kin.depth, kin.rate),
                )
            };

            let record = self.states.entry(point.key).or_default();
            if record.record_signature(signature) {
                debug!(
                    pair = %self.pair,
                    key = ?point.key,
                    regime = ?signature.regime,
                    branch = signature.branch,
                    "contact equations changed"
                );
                status = AssemblyStatus::StructuralChange;
            }
            self.points[i].regime = Some(signature.regime);
            self.reports.push(report);
        }

        trace!(pair = %self.pair, points = self.points.len(), "assembled contact residual");
        Ok((residual, status))
    }

    /// Assemble the Jacobian block for the regimes of the last residual pass.
    pub fn assemble_jacobian(
        &self,
        bodies: &dyn BodySet,
        state: &[f64],
        coefficient: f64,
        config: &ContactConfig,
    ) -> Result<WorkMatrix, ContactError> {
        if self.points.is_empty() {
            return Ok(WorkMatrix::zeros(Vec::new(), Vec::new()));
        }
        let (b1, b2) = self.frames(bodies)?;
        let indices = self.indices(&b1, &b2);
        let mut jacobian = WorkMatrix::zeros(indices.clone(), indices)
            .with_offsets(self.slot.row, self.slot.col);

        for (i, point) in self.points.iter().enumerate() {
            let row = 12 + 2 * i;
            let regime = point.regime.ok_or_else(|| ContactError::NotAssembled {
                pair: self.pair.to_string(),
            })?;
            let kin = PointKinematics::new(point, &b1, &b2, config);
            if !regime.is_active() || kin.depth <= 0.0 {
                jacobian.set(row, row, 1.0);
                jacobian.set(row + 1, row + 1, 1.0);
                continue;
            }

            let response = self.law_response(&kin);
            let grads = PointGradients::new(&kin, &b1, &b2, coefficient);
            let (length, magnitude) =
                grads.normal_magnitude(&kin, &response, self.normal.reference_length());
            let fn_over_depth = response.force / kin.depth;
            let force = kin.normal_force(&response);
            let force_grad = grads.separation * fn_over_depth
                + kin.separation
                    * (magnitude / kin.depth - length * (fn_over_depth / kin.depth));
            apply_pair_gradient(
                &mut jacobian,
                (&force, &force_grad),
                (&kin.o1, &grads.o1),
                (&kin.o2, &grads.o2),
            );

            let spec = match (&self.friction, regime) {
                (Some(spec), ContactRegime::Slip | ContactRegime::NoSlip) => spec,
                _ => {
                    jacobian.set(row, row, 1.0);
                    jacobian.set(row + 1, row + 1, 1.0);
                    continue;
                }
            };
            let law = spec.law.as_ref();
            let fk = FrictionKinematics::new(&kin, &b1, &b2, law, coefficient);

            if regime == ContactRegime::Slip {
                jacobian.set(row, row, 1.0);
                jacobian.set(row + 1, row + 1, 1.0);
                let trial_norm = fk.trial.norm();
                if trial_norm <= config.tangent_force_epsilon {
                    continue;
                }
                let tangential_grad =
                    gradient::tangential(&fk.normal, &grads.normal, &fk.velocity, &grads.velocity);
                let mu_grad = if fk.speed > 0.0 {
                    gradient::norm(&fk.tangential, &tangential_grad) * law.derivative(fk.speed)
                } else {
                    Gradient1::zeros()
                };
                let raw_grad = gradient::spin_force(&kin.r2, &grads.r2, &b2.spin)
                    - gradient::spin_force(&kin.r1, &grads.r1, &b1.spin);
                let trial_grad =
                    gradient::tangential(&fk.normal, &grads.normal, &fk.raw, &raw_grad)
                        / coefficient;
                let direction = fk.trial / trial_norm;
                let limit = fk.mu * response.force;
                let slip = direction * limit;
                let slip_grad = direction * (mu_grad * response.force + magnitude * fk.mu)
                    + gradient::unit(&fk.trial, &trial_grad) * limit;
                apply_pair_gradient(
                    &mut jacobian,
                    (&slip, &slip_grad),
                    (&kin.r1, &grads.r1),
                    (&kin.r2, &grads.r2),
                );
            } else {
                let unknown = self.slot.unknown + 2 * i;
                let lambda = [
                    read_unknown(state, unknown)?,
                    read_unknown(state, unknown + 1)?,
                ];
                let basis = TangentBasis::from_normal(&fk.normal);
                let mut reaction = Vector3::zeros();
                let mut reaction_grad = Gradient3::zeros();
                for (k, &lambda_k) in lambda.iter().enumerate() {
                    let axis = basis.axis(k);
                    let axis_grad = basis.axis_derivative(k) * grads.normal;
                    jacobian.add_column(0, row + k, &-axis);
                    jacobian.add_column(3, row + k, &-kin.r1.cross(&axis));
                    jacobian.add_column(6, row + k, &axis);
                    jacobian.add_column(9, row + k, &kin.r2.cross(&axis));
                    jacobian.add_row(
                        row + k,
                        &gradient::dot(&axis, &axis_grad, &fk.velocity, &grads.velocity),
                    );
                    reaction += axis * lambda_k;
                    reaction_grad += axis_grad * lambda_k;
                }
                if (reaction * coefficient).norm_squared() > config.geometric_stiffness_threshold {
                    apply_pair_gradient(
                        &mut jacobian,
                        (&reaction, &reaction_grad),
                        (&kin.r1, &grads.r1),
                        (&kin.r2, &grads.r2),
                    );
                }
            }
        }
        Ok(jacobian)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{
        CoulombFriction, LinearViscoelastic, PowerLawViscoelastic, ShapeId, StribeckFriction,
    };
    use approx::assert_relative_eq;
    use nalgebra::{DVector, UnitQuaternion};
    use sim_types::{Pose, RigidBodyState, Twist};
    use std::collections::BTreeMap;

    type Bodies = BTreeMap<BodyId, RigidBodyState>;

    const C: f64 = 3.0;

    fn bodies(spin2: Option<SpinCompliance>) -> Bodies {
        let lower = RigidBodyState::new(
            Pose::from_position_rotation(
                Point3::new(0.01, -0.02, 0.0),
                UnitQuaternion::from_euler_angles(0.05, -0.03, 0.2),
            ),
            Twist::new(Vector3::new(0.1, -0.05, 0.2), Vector3::new(0.3, 0.1, -0.2)),
            0,
        );
        let mut upper = RigidBodyState::new(
            Pose::from_position_rotation(
                Point3::new(0.0, 0.0, 1.95),
                UnitQuaternion::from_euler_angles(-0.1, 0.04, 0.0),
            ),
            Twist::new(Vector3::new(-0.2, 0.15, -0.1), Vector3::new(-0.1, 0.25, 0.05)),
            6,
        );
        upper.spin = spin2;
        BTreeMap::from([(BodyId(0), lower), (BodyId(1), upper)])
    }

    fn element(spec: &MaterialPairSpec, bodies: &Bodies) -> ContactPairElement {
        let mut element = ContactPairElement::new(
            ShapePair::new(ShapeId(2), ShapeId(1)),
            BodyId(0),
            BodyId(1),
            spec,
        );
        element.push_contact(
            &bodies[&BodyId(0)],
            &bodies[&BodyId(1)],
            &Point3::new(0.03, 0.02, 1.0),
            &Point3::new(0.02, 0.035, 0.975),
            None,
        );
        element.assign_layout(&mut LayoutCursor::new(12));
        element
    }

    fn residual_at(element: &ContactPairElement, bodies: &Bodies, state: &[f64]) -> DVector<f64> {
        let mut trial = element.clone();
        let (block, _) = trial
            .assemble_residual(bodies, state, C, &ContactConfig::default())
            .unwrap();
        block.values().clone()
    }

    fn perturb(bodies: &Bodies, col: usize, delta: f64, position: bool) -> Bodies {
        let mut out = bodies.clone();
        let id = BodyId(u64::from(col >= 6));
        let body = out.get_mut(&id).unwrap();
        let j = col % 6;
        let mut unit = Vector3::zeros();
        unit[j % 3] = delta;
        match (position, j < 3) {
            (false, true) => body.twist.linear += unit,
            (false, false) => body.twist.angular += unit,
            (true, true) => body.pose = body.pose.perturbed(&unit, &Vector3::zeros()),
            (true, false) => body.pose = body.pose.perturbed(&Vector3::zeros(), &unit),
        }
        out
    }

    fn check_jacobian(element: &mut ContactPairElement, bodies: &Bodies, state: &[f64]) {
        let config = ContactConfig::default();
        let _ = element.assemble_residual(bodies, state, C, &config).unwrap();
        let jacobian = element.assemble_jacobian(bodies, state, C, &config).unwrap();
        let size = jacobian.values().nrows();
        let h = 1e-6;

        for col in 0..12 {
            let fd_velocity = (residual_at(element, &perturb(bodies, col, h, false), state)
                - residual_at(element, &perturb(bodies, col, -h, false), state))
                / (2.0 * h);
            let fd_position = (residual_at(element, &perturb(bodies, col, h, true), state)
                - residual_at(element, &perturb(bodies, col, -h, true), state))
                / (2.0 * h);
            let expected = -(fd_velocity + fd_position * C);
            for row in 0..size {
                assert_relative_eq!(
                    jacobian.get(row, col),
                    expected[row],
                    epsilon = 1e-4,
                    max_relative = 1e-6
                );
            }
        }

        for col in 12..size {
            let mut plus = state.to_vec();
            let mut minus = state.to_vec();
            plus[col] += h;
            minus[col] -= h;
            let expected = -(residual_at(element, bodies, &plus)
                - residual_at(element, bodies, &minus))
                / (2.0 * h);
            for row in 0..size {
                assert_relative_eq!(
                    jacobian.get(row, col),
                    expected[row],
                    epsilon = 1e-6,
                    max_relative = 1e-6
                );
            }
        }
    }

    #[test]
    fn test_frictionless_jacobian_matches_difference() {
        let bodies = bodies(None);
        let spec = MaterialPairSpec::frictionless(
            PowerLawViscoelastic::hertz(2e4, 15.0).with_reference_length(0.5),
        );
        let mut element = element(&spec, &bodies);
        let state = vec![0.0; 14];
        check_jacobian(&mut element, &bodies, &state);
        assert_eq!(element.points()[0].regime, Some(ContactRegime::Frictionless));
    }

    #[test]
    fn test_slip_jacobian_matches_difference() {
        let spin = SpinCompliance::new(
            Vector3::new(50.0, -100.0, 200.0),
            Vector3::new(4000.0, -2500.0, 300.0),
        );
        let bodies = bodies(Some(spin));
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 30.0))
            .with_friction(StribeckFriction::new(0.6, 0.4).with_stribeck_velocity(0.5), 0.5);
        let mut element = element(&spec, &bodies);
        let state = vec![0.0; 14];
        check_jacobian(&mut element, &bodies, &state);
        assert_eq!(element.points()[0].regime, Some(ContactRegime::Slip));

        let report = element.reports()[0];
        let trial_limit = report.normal_force
            * StribeckFriction::new(0.6, 0.4)
                .with_stribeck_velocity(0.5)
                .coefficient(report.tangential_velocity.norm());
        assert_relative_eq!(report.friction_force.norm(), trial_limit, max_relative = 1e-12);
    }

    #[test]
    fn test_stick_jacobian_matches_difference() {
        let bodies = bodies(None);
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 30.0))
            .with_friction(CoulombFriction::new(0.5), 0.5);
        let mut element = element(&spec, &bodies);
        let mut state = vec![0.0; 14];
        state[12] = 0.4;
        state[13] = -0.7;
        check_jacobian(&mut element, &bodies, &state);
        assert_eq!(element.points()[0].regime, Some(ContactRegime::NoSlip));
        assert_eq!(
            element.state(&element.points()[0].key).unwrap().stick,
            StickSlip::NoSlip
        );
    }

    #[test]
    fn test_separated_point_is_pinned() {
        let mut bodies = bodies(None);
        bodies.get_mut(&BodyId(1)).unwrap().pose.position.z = 2.5;
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0))
            .with_friction(CoulombFriction::new(0.5), 0.5);
        let mut element = element(&spec, &bodies);
        // Points were detected while overlapping; move body 2 away afterwards.
        bodies.get_mut(&BodyId(1)).unwrap().pose.position.z = 3.5;

        let state = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, -3.0];
        let (residual, status) = element
            .assemble_residual(&bodies, &state, C, &ContactConfig::default())
            .unwrap();
        assert_eq!(status, AssemblyStatus::Unchanged);
        assert!(residual.values().rows(0, 12).iter().all(|v| *v == 0.0));
        assert_eq!(residual.values()[12], -2.0);
        assert_eq!(residual.values()[13], 3.0);

        let jacobian = element
            .assemble_jacobian(&bodies, &state, C, &ContactConfig::default())
            .unwrap();
        assert_eq!(jacobian.get(12, 12), 1.0);
        assert_eq!(jacobian.get(13, 13), 1.0);
        assert_eq!(element.reports()[0].regime, ContactRegime::Inactive);
    }

    #[test]
    fn test_jacobian_before_residual_fails() {
        let bodies = bodies(None);
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0));
        let element = element(&spec, &bodies);
        let err = element
            .assemble_jacobian(&bodies, &[0.0; 14], C, &ContactConfig::default())
            .unwrap_err();
        assert!(matches!(err, ContactError::NotAssembled { .. }));
    }

    #[test]
    fn test_short_state_is_an_error() {
        let bodies = bodies(None);
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0));
        let mut element = element(&spec, &bodies);
        let err = element
            .assemble_residual(&bodies, &[0.0; 13], C, &ContactConfig::default())
            .unwrap_err();
        assert_eq!(err, ContactError::StateTooShort { index: 13, len: 13 });
    }

    #[test]
    fn test_state_follows_feature_not_position() {
        let bodies = bodies(None);
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 0.0))
            .with_friction(CoulombFriction::new(0.5), 0.5);
        let mut element = ContactPairElement::new(
            ShapePair::new(ShapeId(2), ShapeId(1)),
            BodyId(0),
            BodyId(1),
            &spec,
        );
        let b1 = &bodies[&BodyId(0)];
        let b2 = &bodies[&BodyId(1)];
        let p1 = Point3::new(0.03, 0.02, 1.0);
        let p2 = Point3::new(0.02, 0.035, 0.975);
        let far1 = Point3::new(0.5, 0.0, 3.0);
        let far2 = Point3::new(0.5, 0.0, 3.1);

        element.push_contact(b1, b2, &p1, &p2, Some(FeatureId::new(7)));
        element.push_contact(b1, b2, &far1, &far2, Some(FeatureId::new(9)));
        element.assign_layout(&mut LayoutCursor::new(12));
        let state = vec![0.0; 16];
        let (_, status) = element
            .assemble_residual(&bodies, &state, C, &ContactConfig::default())
            .unwrap();
        assert!(status.is_structural_change());

        // Same contacts, reported in the opposite order.
        element.clear_points();
        element.push_contact(b1, b2, &far1, &far2, Some(FeatureId::new(9)));
        element.push_contact(b1, b2, &p1, &p2, Some(FeatureId::new(7)));
        element.assign_layout(&mut LayoutCursor::new(12));
        let (_, status) = element
            .assemble_residual(&bodies, &state, C, &ContactConfig::default())
            .unwrap();
        assert_eq!(status, AssemblyStatus::Unchanged);

        let key = ContactKey::new(FeatureId::new(7), 0);
        assert_eq!(element.state(&key).unwrap().stick, StickSlip::NoSlip);
        assert_eq!(element.reports()[1].regime, ContactRegime::NoSlip);
        assert_eq!(element.reports()[0].regime, ContactRegime::Inactive);

        element.reset_states();
        let record = element.state(&key).unwrap();
        assert_eq!(record.stick, StickSlip::Undefined);
        assert!(record.signature.is_some());
    }

    #[test]
    fn test_residual_is_idempotent() {
        let spin = SpinCompliance::new(
            Vector3::new(50.0, -100.0, 200.0),
            Vector3::new(4000.0, -2500.0, 300.0),
        );
        let bodies = bodies(Some(spin));
        let spec = MaterialPairSpec::frictionless(LinearViscoelastic::new(1e4, 30.0))
            .with_friction(CoulombFriction::new(0.3), 0.5);
        let mut element = element(&spec, &bodies);
        let state = vec![0.0; 14];
        let config = ContactConfig::default();

        let (first, _) = element.assemble_residual(&bodies, &state, C, &config).unwrap();
        let jac_first = element.assemble_jacobian(&bodies, &state, C, &config).unwrap();
        let (second, status) = element.assemble_residual(&bodies, &state, C, &config).unwrap();
        let jac_second = element.assemble_jacobian(&bodies, &state, C, &config).unwrap();
        assert_eq!(status, AssemblyStatus::Unchanged);
        assert_eq!(first, second);
        assert_eq!(jac_first, jac_second);
    }
}
