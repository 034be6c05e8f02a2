use serde::{Deserialize, Serialize};

use crate::control_strategies::DesiredTrajectory;
use crate::dynamics::{DynamicsProvider, DynamicsSnapshot};
use crate::robot::JointVector;

/// Computed-torque (feedback-linearizing) PD controller.
///
/// `tau = M(q) (ddq_des + kp e + kd de) + n(q, dq)`, with the same scalar gains on every joint.
/// With a perfect model the closed loop behaves like six decoupled mass-spring-dampers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseDynamicsController {
    pub kp: f64,
    pub kd: f64,
}

impl InverseDynamicsController {
    pub fn compute_torque<D: DynamicsProvider + ?Sized>(
        &self,
        model: &D,
        desired: &DesiredTrajectory,
        q: &JointVector,
        dq: &JointVector,
    ) -> JointVector {
        let (e, de) = desired.errors(q, dq);
        let DynamicsSnapshot { mass_matrix, bias } = model.compute_dynamics(q, dq);
        mass_matrix * (desired.acceleration + e * self.kp + de * self.kd) + bias
    }
}
