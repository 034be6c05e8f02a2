//! Rigid-body dynamics of the serial arm.
//!
//! The model answers a single question for the controllers: given joint positions and
//! velocities, what are the mass matrix `M(q)` and the nonlinear bias `n(q, dq)` (Coriolis,
//! centrifugal and gravity torques)? Both are computed with recursive Newton-Euler
//! iterations over the chain; `M` is assembled one column at a time from unit joint
//! accelerations with velocity and gravity switched off.
//!
//! Nothing is cached between calls: every query recomputes the link poses from `q`.

use na::{Matrix3, Matrix6, Vector3};

use crate::error::ModelError;
use crate::kinematics::KinematicModel;
use crate::robot::{BodyDescription, JointVector, RobotDescription, DOF};

/// Mass matrix and bias vector at one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsSnapshot {
    pub mass_matrix: Matrix6<f64>,
    pub bias: JointVector,
}

/// Anything that can evaluate the joint-space equations of motion `M(q) ddq + n(q, dq) = tau`.
pub trait DynamicsProvider {
    fn compute_dynamics(&self, q: &JointVector, dq: &JointVector) -> DynamicsSnapshot;
}

impl<D: DynamicsProvider + ?Sized> DynamicsProvider for &D {
    fn compute_dynamics(&self, q: &JointVector, dq: &JointVector) -> DynamicsSnapshot {
        (**self).compute_dynamics(q, dq)
    }
}

/// Lumped inertia of everything carried by one link, in the zero-configuration frame.
#[derive(Debug, Clone)]
struct LinkInertia {
    mass: f64,
    /// Center of mass relative to the link base.
    com: Vector3<f64>,
    /// Inertia tensor about the center of mass.
    inertia: Matrix3<f64>,
}

impl LinkInertia {
    /// Merge several bodies into one, shifting their inertia to the common center of mass.
    fn combine<'a>(bodies: impl Iterator<Item = &'a BodyDescription> + Clone) -> Self {
        let mass: f64 = bodies.clone().map(|b| b.mass).sum();
        let com = bodies
            .clone()
            .fold(Vector3::zeros(), |acc, b| acc + b.com * b.mass)
            / mass;

        let inertia = bodies.fold(Matrix3::zeros(), |acc, b| {
            let d = b.com - com;
            acc + Matrix3::from_diagonal(&b.inertia)
                + (Matrix3::identity() * d.norm_squared() - d * d.transpose()) * b.mass
        });

        LinkInertia { mass, com, inertia }
    }
}

/// A rigid-body model of the arm, built once from a description and queried every control step.
#[derive(Debug, Clone)]
pub struct RigidBodyModel {
    kinematics: KinematicModel,
    links: Vec<LinkInertia>,
    armature: JointVector,
    gravity: Vector3<f64>,
}

impl RigidBodyModel {
    pub fn from_description(description: &RobotDescription) -> Result<Self, ModelError> {
        description.validate()?;

        let last = description.links.len() - 1;
        let links = description
            .links
            .iter()
            .enumerate()
            .map(|(i, l)| {
                // The tool is welded to the last link, so its inertia moves with it.
                let tool = if i == last {
                    description.end_effector.as_ref()
                } else {
                    None
                };
                LinkInertia::combine(std::iter::once(&l.body).chain(tool))
            })
            .collect();

        Ok(RigidBodyModel {
            kinematics: KinematicModel::from_description(description),
            links,
            armature: JointVector::from_iterator(description.links.iter().map(|l| l.armature)),
            gravity: description.gravity,
        })
    }

    pub fn kinematics(&self) -> &KinematicModel {
        &self.kinematics
    }

    /// Total mass of the moving links, tool included.
    pub fn total_mass(&self) -> f64 {
        self.links.iter().map(|l| l.mass).sum()
    }

    /// Joint torques needed to produce `ddq` at state `(q, dq)` under the given gravity,
    /// ignoring armature.
    pub fn inverse_dynamics(
        &self,
        q: &JointVector,
        dq: &JointVector,
        ddq: &JointVector,
        gravity: &Vector3<f64>,
    ) -> JointVector {
        let poses = self.kinematics.predict(q.as_slice());

        let mut axes = [Vector3::zeros(); DOF];
        let mut joint_positions = [Vector3::zeros(); DOF];
        let mut coms = [Vector3::zeros(); DOF];
        let mut forces = [Vector3::zeros(); DOF];
        let mut moments = [Vector3::zeros(); DOF];

        // Outward pass: velocities and accelerations of every link, and the net wrench
        // each link needs. Gravity enters as an upward acceleration of the base.
        let mut omega = Vector3::zeros();
        let mut omega_dot = Vector3::zeros();
        let mut accel = -gravity;
        let mut previous_position = self.kinematics.origin.translation.vector;

        for i in 0..DOF {
            let pose = &poses.link_base_positions[i];
            let position = pose.translation.vector;
            let rotation = pose.rotation.to_rotation_matrix();

            let r = position - previous_position;
            accel += omega_dot.cross(&r) + omega.cross(&omega.cross(&r));

            let axis = rotation * self.kinematics.links[i].axis.into_inner();
            let joint_rate = axis * dq[i];
            omega += joint_rate;
            omega_dot += axis * ddq[i] + omega.cross(&joint_rate);

            let link = &self.links[i];
            let com = rotation * link.com;
            let com_accel = accel + omega_dot.cross(&com) + omega.cross(&omega.cross(&com));
            let inertia = rotation.matrix() * link.inertia * rotation.matrix().transpose();

            axes[i] = axis;
            joint_positions[i] = position;
            coms[i] = com;
            forces[i] = com_accel * link.mass;
            moments[i] = inertia * omega_dot + omega.cross(&(inertia * omega));

            previous_position = position;
        }

        // Inward pass: accumulate wrenches from the tip down and project on the joint axes.
        let mut tau = JointVector::zeros();
        let mut force = Vector3::zeros();
        let mut moment = Vector3::zeros();

        for i in (0..DOF).rev() {
            let lever = if i + 1 < DOF {
                joint_positions[i + 1] - joint_positions[i]
            } else {
                Vector3::zeros()
            };
            moment = moments[i] + coms[i].cross(&forces[i]) + moment + lever.cross(&force);
            force += forces[i];
            tau[i] = axes[i].dot(&moment);
        }

        tau
    }

    /// Joint-space mass matrix, armature included.
    pub fn mass_matrix(&self, q: &JointVector) -> Matrix6<f64> {
        let zero = JointVector::zeros();
        let no_gravity = Vector3::zeros();

        let mut m = Matrix6::zeros();
        for j in 0..DOF {
            let mut unit = JointVector::zeros();
            unit[j] = 1.0;
            m.set_column(j, &self.inverse_dynamics(q, &zero, &unit, &no_gravity));
        }
        m += Matrix6::from_diagonal(&self.armature);

        // Newton-Euler columns are symmetric up to round-off.
        (m + m.transpose()) * 0.5
    }

    /// Coriolis, centrifugal and gravity torques.
    pub fn bias(&self, q: &JointVector, dq: &JointVector) -> JointVector {
        self.inverse_dynamics(q, dq, &JointVector::zeros(), &self.gravity)
    }

    /// Gravity torques alone.
    pub fn gravity_torque(&self, q: &JointVector) -> JointVector {
        self.bias(q, &JointVector::zeros())
    }

    /// Solve `M ddq = tau - n` for the joint accelerations.
    ///
    /// Returns `None` if the mass matrix is not numerically positive definite.
    pub fn forward_dynamics(
        &self,
        q: &JointVector,
        dq: &JointVector,
        tau: &JointVector,
    ) -> Option<JointVector> {
        let DynamicsSnapshot { mass_matrix, bias } = self.compute_dynamics(q, dq);
        mass_matrix.cholesky().map(|c| c.solve(&(tau - bias)))
    }
}

impl DynamicsProvider for RigidBodyModel {
    fn compute_dynamics(&self, q: &JointVector, dq: &JointVector) -> DynamicsSnapshot {
        DynamicsSnapshot {
            mass_matrix: self.mass_matrix(q),
            bias: self.bias(q, dq),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;

    fn model() -> RigidBodyModel {
        RigidBodyModel::from_description(&RobotDescription::ur5e()).unwrap()
    }

    fn sample_configurations() -> Vec<JointVector> {
        vec![
            JointVector::zeros(),
            JointVector::new(0.0, -0.785, 1.571, -0.785, 1.571, 0.0),
            JointVector::new(0.3, -1.2, 0.4, 2.0, -0.7, 1.1),
            JointVector::new(-2.5, 0.9, -2.2, 0.1, 3.0, -1.4),
        ]
    }

    #[test]
    fn mass_matrix_is_symmetric_positive_definite() {
        let model = model();
        for q in sample_configurations() {
            let m = model.mass_matrix(&q);
            assert_relative_eq!(m, m.transpose(), epsilon = 1e-12);
            assert!(m.cholesky().is_some(), "M not positive definite at {}", q);
            for i in 0..DOF {
                assert!(m[(i, i)] > 0.0);
            }
        }
    }

    #[test]
    fn forward_dynamics_inverts_inverse_dynamics() {
        let model = model();
        let dq = JointVector::new(0.4, -0.2, 0.9, -1.0, 0.3, 0.5);
        let ddq = JointVector::new(1.0, -2.0, 0.5, 3.0, -1.5, 0.25);
        for q in sample_configurations() {
            let snapshot = model.compute_dynamics(&q, &dq);
            let tau = snapshot.mass_matrix * ddq + snapshot.bias;
            let recovered = model.forward_dynamics(&q, &dq, &tau).unwrap();
            assert_relative_eq!(recovered, ddq, epsilon = 1e-8);
        }
    }

    #[test]
    fn pan_joint_carries_no_gravity_load() {
        // The first axis is vertical, so gravity cannot produce torque about it.
        let model = model();
        for q in sample_configurations() {
            assert_abs_diff_eq!(model.gravity_torque(&q)[0], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn stretched_arm_shoulder_load_matches_statics() {
        // At zero angles the arm lies along +x; the shoulder lift axis is +y.
        // A mass at +x under -z gravity needs a negative torque about +y to be held.
        let description = RobotDescription::ur5e();
        let model = RigidBodyModel::from_description(&description).unwrap();
        let tau = model.gravity_torque(&JointVector::zeros());

        let mut expected = 0.0;
        let mut base_x = 0.0;
        for (i, link) in description.links.iter().enumerate().skip(1) {
            let mut bodies = vec![&link.body];
            if i == DOF - 1 {
                bodies.extend(description.end_effector.iter());
            }
            for b in bodies {
                expected -= b.mass * 9.81 * (base_x + b.com.x);
            }
            base_x += link.offset.x;
        }
        assert_relative_eq!(tau[1], expected, epsilon = 1e-9);
    }

    #[test]
    fn velocity_terms_vanish_at_rest_without_gravity() {
        let model = model();
        let q = JointVector::new(0.3, -1.2, 0.4, 2.0, -0.7, 1.1);
        let zero = JointVector::zeros();
        let tau = model.inverse_dynamics(&q, &zero, &zero, &Vector3::zeros());
        assert_abs_diff_eq!(tau, zero, epsilon = 1e-12);
    }

    #[test]
    fn repeated_queries_are_identical() {
        let model = model();
        let q = JointVector::new(0.3, -1.2, 0.4, 2.0, -0.7, 1.1);
        let dq = JointVector::new(0.1, 0.2, -0.3, 0.4, -0.5, 0.6);
        assert_eq!(model.compute_dynamics(&q, &dq), model.compute_dynamics(&q, &dq));
    }

    #[test]
    fn heavier_tool_increases_mass() {
        let mut description = RobotDescription::ur5e();
        let light = RigidBodyModel::from_description(&description).unwrap();
        description.body_mut("end_effector").unwrap().mass = 4.0;
        let heavy = RigidBodyModel::from_description(&description).unwrap();
        assert_relative_eq!(heavy.total_mass() - light.total_mass(), 3.5, epsilon = 1e-12);

        let q = JointVector::new(0.0, -0.785, 1.571, -0.785, 1.571, 0.0);
        assert!(heavy.mass_matrix(&q)[(1, 1)] > light.mass_matrix(&q)[(1, 1)]);
    }
}
