use serde::{Deserialize, Serialize};

use crate::control_strategies::{sat, BoundaryLayer, DesiredTrajectory};
use crate::dynamics::{DynamicsProvider, DynamicsSnapshot};
use crate::robot::JointVector;

/// Sliding mode controller with a saturated (boundary-layer) switching term.
///
/// The sliding variable is `s = de + lambda e`. The torque is the model-based
/// equivalent control plus a robust correction:
///
/// `tau = M(q) (ddq_des + lambda de) + n(q, dq) + k sat(s, phi)`
///
/// A thin boundary layer `phi` approaches the discontinuous `sign(s)` law and chatters;
/// a wide one is smooth but lets `s` settle anywhere inside the layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlidingModeController {
    /// Slope of the sliding surface.
    pub lambda: f64,
    /// Robust gain.
    pub k: f64,
}

/// Torque command along with the sliding variable it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingModeOutput {
    pub torque: JointVector,
    pub sliding: JointVector,
}

impl SlidingModeController {
    pub fn sliding_variable(&self, e: &JointVector, de: &JointVector) -> JointVector {
        de + e * self.lambda
    }

    pub fn compute_torque<D: DynamicsProvider + ?Sized>(
        &self,
        model: &D,
        desired: &DesiredTrajectory,
        q: &JointVector,
        dq: &JointVector,
        phi: BoundaryLayer,
    ) -> SlidingModeOutput {
        let (e, de) = desired.errors(q, dq);
        let s = self.sliding_variable(&e, &de);
        let DynamicsSnapshot { mass_matrix, bias } = model.compute_dynamics(q, dq);

        let torque = mass_matrix * (desired.acceleration + de * self.lambda)
            + bias
            + sat(&s, phi) * self.k;

        SlidingModeOutput { torque, sliding: s }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::control_strategies::test_util::FixedDynamics;
    use crate::dynamics::RigidBodyModel;
    use crate::robot::RobotDescription;

    const SMC: SlidingModeController = SlidingModeController { lambda: 10.0, k: 20.0 };

    fn phi(width: f64) -> BoundaryLayer {
        BoundaryLayer::new(width).unwrap()
    }

    #[test]
    fn zero_error_returns_bias_and_zero_sliding_variable() {
        let model = FixedDynamics::gravity_on_last_joint();
        let q_des = JointVector::new(0.0, -0.785, 1.571, -0.785, 1.571, 0.0);
        let desired = DesiredTrajectory::regulation(q_des);

        for width in &[1e-6, 0.2, 0.5, 1.0, 1e6] {
            let dq = JointVector::zeros();
            let out = SMC.compute_torque(&model, &desired, &q_des, &dq, phi(*width));
            assert_eq!(out.torque, JointVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 9.8));
            assert_eq!(out.sliding, JointVector::zeros());
        }
    }

    #[test]
    fn wide_layer_reduces_to_equivalent_control() {
        let model = RigidBodyModel::from_description(&RobotDescription::ur5e()).unwrap();
        let desired = DesiredTrajectory::regulation(JointVector::repeat(0.2));
        let q = JointVector::new(0.3, -1.2, 0.4, 2.0, -0.7, 1.1);
        let dq = JointVector::new(0.1, 0.2, -0.3, 0.4, -0.5, 0.6);

        let out = SMC.compute_torque(&model, &desired, &q, &dq, phi(1e12));
        let snapshot = model.compute_dynamics(&q, &dq);
        let equivalent = snapshot.mass_matrix * (-dq * SMC.lambda) + snapshot.bias;
        assert_relative_eq!(out.torque, equivalent, epsilon = 1e-9);
    }

    #[test]
    fn thin_layer_applies_full_robust_gain() {
        let model = FixedDynamics::gravity_on_last_joint();
        let desired = DesiredTrajectory::regulation(JointVector::zeros());
        // Position error only: s = lambda * e, de = 0.
        let q = JointVector::new(0.01, -0.01, 0.0, 0.02, -0.02, 0.0);
        let dq = JointVector::zeros();

        let out = SMC.compute_torque(&model, &desired, &q, &dq, phi(1e-9));
        let expected = JointVector::new(-20.0, 20.0, 0.0, -20.0, 20.0, 9.8);
        assert_relative_eq!(out.torque, expected, epsilon = 1e-12);
        assert_relative_eq!(out.sliding, -q * 10.0, epsilon = 1e-12);
    }

    #[test]
    fn sliding_variable_combines_errors() {
        let e = JointVector::new(1.0, 0.0, -1.0, 0.5, 0.0, 0.0);
        let de = JointVector::new(0.0, 1.0, 1.0, 0.0, -0.5, 0.0);
        assert_eq!(
            SMC.sliding_variable(&e, &de),
            JointVector::new(10.0, 1.0, -9.0, 5.0, -0.5, 0.0)
        );
    }

    #[test]
    fn identical_inputs_give_bit_identical_outputs() {
        let model = RigidBodyModel::from_description(&RobotDescription::ur5e()).unwrap();
        let desired = DesiredTrajectory::regulation(JointVector::repeat(0.5));
        let q = JointVector::new(0.3, -1.2, 0.4, 2.0, -0.7, 1.1);
        let dq = JointVector::new(0.1, 0.2, -0.3, 0.4, -0.5, 0.6);

        let first = SMC.compute_torque(&model, &desired, &q, &dq, phi(0.2));
        let second = SMC.compute_torque(&model, &desired, &q, &dq, phi(0.2));
        assert_eq!(first, second);
    }
}
