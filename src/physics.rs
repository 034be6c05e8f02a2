use na::Matrix6;

use crate::dynamics::{DynamicsProvider, DynamicsSnapshot, RigidBodyModel};
use crate::error::{ModelError, SimulationError};
use crate::robot::{JointMap, JointVector, RobotDescription};

/// Joint speed below which dry friction is scaled down linearly instead of switching sign.
pub const FRICTION_VELOCITY: f64 = 1e-2;

/// The simulated plant: true state of the arm plus everything the controllers do not know
/// about (extra damping, dry friction, payload changes, actuator limits).
pub struct PhysicsWorld {
    description: RobotDescription,
    model: RigidBodyModel,
    pub q: JointVector,
    pub dq: JointVector,
    pub time: f64,
    pub timestep: f64,
    pub damping: JointVector,
    pub friction: JointVector,
    /// Symmetric bound on the applied torque, per joint.
    pub torque_limits: JointMap<f64>,
    last_applied: JointVector,
}

impl PhysicsWorld {
    pub fn new(description: RobotDescription, timestep: f64) -> Result<Self, ModelError> {
        let model = RigidBodyModel::from_description(&description)?;
        Ok(PhysicsWorld {
            description,
            model,
            q: JointVector::zeros(),
            dq: JointVector::zeros(),
            time: 0.0,
            timestep,
            damping: JointVector::zeros(),
            friction: JointVector::zeros(),
            torque_limits: JointMap::splat(f64::INFINITY),
            last_applied: JointVector::zeros(),
        })
    }

    pub fn model(&self) -> &RigidBodyModel {
        &self.model
    }

    /// Torque applied during the last step, after limiting.
    pub fn last_applied_torque(&self) -> &JointVector {
        &self.last_applied
    }

    /// Change the mass of a named body and rebuild the plant model around it.
    pub fn set_body_mass(&mut self, name: &str, mass: f64) -> Result<(), SimulationError> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(SimulationError::InvalidMass {
                body: name.to_string(),
                mass,
            });
        }
        let mut description = self.description.clone();
        description
            .body_mut(name)
            .ok_or_else(|| SimulationError::UnknownBody(name.to_string()))?
            .mass = mass;
        self.model = RigidBodyModel::from_description(&description)?;
        self.description = description;
        Ok(())
    }

    /// Passive joint torques: viscous damping plus smoothed dry friction.
    pub fn passive_torque(&self, dq: &JointVector) -> JointVector {
        let viscous = -self.damping.component_mul(dq);
        let dry = -self
            .friction
            .zip_map(dq, |f, v| f * (v / FRICTION_VELOCITY).clamp(-1.0, 1.0));
        viscous + dry
    }

    /// Derivative of the passive torque with respect to joint velocity, negated.
    fn passive_stiffness(&self, dq: &JointVector) -> JointVector {
        let dry = self.friction.zip_map(dq, |f, v| {
            if v.abs() < FRICTION_VELOCITY {
                f / FRICTION_VELOCITY
            } else {
                0.0
            }
        });
        self.damping + dry
    }

    /// Advance the world by one timestep with the given actuator torque.
    ///
    /// Semi-implicit Euler; the velocity update treats the passive terms implicitly so
    /// that stiff friction on light wrist joints does not blow up the integration.
    pub fn step(&mut self, tau: &JointVector) -> Result<(), SimulationError> {
        if !tau.iter().all(|t| t.is_finite()) {
            return Err(SimulationError::Diverged { time: self.time });
        }

        let h = self.timestep;
        let applied = self.torque_limits.clamp_symmetric(tau);

        let DynamicsSnapshot { mass_matrix, bias } = self.model.compute_dynamics(&self.q, &self.dq);
        let lhs = mass_matrix + Matrix6::from_diagonal(&self.passive_stiffness(&self.dq)) * h;
        let rhs = (applied - bias + self.passive_torque(&self.dq)) * h;

        let delta_v = lhs
            .cholesky()
            .ok_or(SimulationError::SingularMassMatrix { time: self.time })?
            .solve(&rhs);

        self.dq += delta_v;
        self.q += self.dq * h;
        self.time += h;
        self.last_applied = applied;

        if self.q.iter().chain(self.dq.iter()).all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err(SimulationError::Diverged { time: self.time })
        }
    }
}
