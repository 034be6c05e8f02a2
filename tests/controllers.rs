use approx::assert_abs_diff_eq;
use nalgebra::Matrix6;

use smc_tradeoff_experiment::control_strategies::{
    BoundaryLayer, DesiredTrajectory, InverseDynamicsController, SlidingModeController,
};
use smc_tradeoff_experiment::dynamics::{DynamicsProvider, DynamicsSnapshot, RigidBodyModel};
use smc_tradeoff_experiment::robot::{JointVector, RobotDescription};

/// Identity inertia with a constant 9.8 N·m load on the last joint only.
struct LastJointGravity;

impl DynamicsProvider for LastJointGravity {
    fn compute_dynamics(&self, _q: &JointVector, _dq: &JointVector) -> DynamicsSnapshot {
        DynamicsSnapshot {
            mass_matrix: Matrix6::identity(),
            bias: JointVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 9.8),
        }
    }
}

#[test]
fn both_controllers_only_compensate_gravity_at_the_target() {
    let target = JointVector::new(0.0, -0.7, 1.5, -0.7, 1.5, 0.0);
    let desired = DesiredTrajectory::regulation(target);
    let dq = JointVector::zeros();
    let expected = JointVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 9.8);

    let id = InverseDynamicsController { kp: 100.0, kd: 20.0 };
    assert_abs_diff_eq!(id.compute_torque(&LastJointGravity, &desired, &target, &dq), expected);

    let smc = SlidingModeController { lambda: 10.0, k: 20.0 };
    for phi in &[0.01, 0.2, 0.5, 1.0, 50.0] {
        let phi = BoundaryLayer::new(*phi).unwrap();
        let out = smc.compute_torque(&LastJointGravity, &desired, &target, &dq, phi);
        assert_abs_diff_eq!(out.torque, expected);
        assert_eq!(out.sliding, JointVector::zeros());
    }
}

#[test]
fn controllers_hold_the_arm_against_its_own_model() {
    let model = RigidBodyModel::from_description(&RobotDescription::ur5e()).unwrap();
    let q = JointVector::new(0.0, -0.785, 1.57, -0.785, 1.57, 0.0);
    let dq = JointVector::zeros();
    let desired = DesiredTrajectory::regulation(q);
    let gravity = model.compute_dynamics(&q, &dq).bias;

    let id = InverseDynamicsController { kp: 100.0, kd: 20.0 };
    assert_abs_diff_eq!(id.compute_torque(&model, &desired, &q, &dq), gravity, epsilon = 1e-9);

    let smc = SlidingModeController { lambda: 10.0, k: 20.0 };
    let out = smc.compute_torque(&model, &desired, &q, &dq, BoundaryLayer::new(0.5).unwrap());
    assert_abs_diff_eq!(out.torque, gravity, epsilon = 1e-9);
}

#[test]
fn sliding_mode_output_depends_only_on_its_inputs() {
    let model = RigidBodyModel::from_description(&RobotDescription::ur5e()).unwrap();
    let target = JointVector::new(0.0, -0.785, 1.57, -0.785, 1.57, 0.0);
    let desired = DesiredTrajectory::regulation(target);
    let q = JointVector::new(0.1, -0.2, 0.3, 0.0, 0.4, -0.1);
    let dq = JointVector::new(0.5, -0.5, 0.2, 0.0, 0.1, 0.3);
    let smc = SlidingModeController { lambda: 10.0, k: 20.0 };
    let phi = BoundaryLayer::new(0.2).unwrap();

    let first = smc.compute_torque(&model, &desired, &q, &dq, phi);
    let second = smc.compute_torque(&model, &desired, &q, &dq, phi);
    assert_eq!(first, second);
}
