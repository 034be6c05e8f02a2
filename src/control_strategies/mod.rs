//! Joint-torque controllers for regulating the arm to a fixed configuration.
//!
//! Both controllers are pure functions of the joint state, the dynamics model handed to
//! them, and their gains: they keep no state between calls.

use std::fmt;

use crate::robot::JointVector;

pub use inverse_dynamics::InverseDynamicsController;
pub use sliding_mode::{SlidingModeController, SlidingModeOutput};

pub mod inverse_dynamics;
pub mod sliding_mode;

/// A trait implemented by anything the simulator can call once per step to obtain joint torques.
pub trait ControllerStrategy {
    fn apply_controller(&mut self, q: &JointVector, dq: &JointVector, time: f64) -> JointVector;
}

impl<F> ControllerStrategy for F
where
    F: FnMut(&JointVector, &JointVector, f64) -> JointVector,
{
    fn apply_controller(&mut self, q: &JointVector, dq: &JointVector, time: f64) -> JointVector {
        self(q, dq, time)
    }
}

/// The reference the controllers regulate to.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredTrajectory {
    pub position: JointVector,
    pub velocity: JointVector,
    pub acceleration: JointVector,
}

impl DesiredTrajectory {
    /// A constant setpoint: zero desired velocity and acceleration.
    pub fn regulation(position: JointVector) -> Self {
        DesiredTrajectory {
            position,
            velocity: JointVector::zeros(),
            acceleration: JointVector::zeros(),
        }
    }

    /// Position and velocity errors `(q_des - q, dq_des - dq)`.
    pub fn errors(&self, q: &JointVector, dq: &JointVector) -> (JointVector, JointVector) {
        (self.position - q, self.velocity - dq)
    }
}

/// Width of the sliding-mode boundary layer. Always strictly positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BoundaryLayer(f64);

impl BoundaryLayer {
    pub fn new(phi: f64) -> Option<Self> {
        if phi > 0.0 && phi.is_finite() {
            Some(BoundaryLayer(phi))
        } else {
            None
        }
    }

    pub fn width(self) -> f64 {
        self.0
    }
}

impl fmt::Display for BoundaryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which controller drives a trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerKind {
    InverseDynamics,
    SlidingMode(BoundaryLayer),
}

impl ControllerKind {
    /// Short tag written to the results table.
    pub fn tag(&self) -> &'static str {
        match self {
            ControllerKind::InverseDynamics => "ID",
            ControllerKind::SlidingMode(_) => "SMC",
        }
    }

    pub fn boundary_layer(&self) -> Option<BoundaryLayer> {
        match self {
            ControllerKind::InverseDynamics => None,
            ControllerKind::SlidingMode(phi) => Some(*phi),
        }
    }

    /// File stem used for per-trial artifacts such as videos and traces.
    pub fn file_stem(&self) -> String {
        match self {
            ControllerKind::InverseDynamics => "ID".to_string(),
            ControllerKind::SlidingMode(phi) => format!("SMC_phi_{}", phi),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::InverseDynamics => write!(f, "ID"),
            ControllerKind::SlidingMode(phi) => write!(f, "SMC φ={}", phi),
        }
    }
}

/// Boundary-layer saturation `clamp(x / phi, -1, 1)`, applied element-wise.
pub fn sat(x: &JointVector, phi: BoundaryLayer) -> JointVector {
    x.map(|v| (v / phi.width()).clamp(-1.0, 1.0))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sat_is_bounded_and_linear_inside_the_layer() {
        let phi = BoundaryLayer::new(0.5).unwrap();
        let x = JointVector::new(-10.0, -0.5, -0.25, 0.0, 0.3, 1e9);
        let y = sat(&x, phi);
        assert_eq!(y, JointVector::new(-1.0, -1.0, -0.5, 0.0, 0.6, 1.0));
        for v in y.iter() {
            assert!((-1.0..=1.0).contains(v));
        }
    }

    #[test]
    fn sat_approaches_sign_for_thin_layers() {
        let phi = BoundaryLayer::new(1e-12).unwrap();
        let x = JointVector::new(-0.1, 0.1, 0.0, 2.0, -3.0, 1e-6);
        assert_eq!(sat(&x, phi), JointVector::new(-1.0, 1.0, 0.0, 1.0, -1.0, 1.0));
    }

    #[test]
    fn sat_passes_nan_through() {
        let phi = BoundaryLayer::new(0.2).unwrap();
        let x = JointVector::new(f64::NAN, 1.0, 0.0, 0.0, 0.0, 0.0);
        let y = sat(&x, phi);
        assert!(y[0].is_nan());
        assert_eq!(y[1], 1.0);
    }

    #[test]
    fn sat_vanishes_for_wide_layers() {
        let phi = BoundaryLayer::new(1e12).unwrap();
        let x = JointVector::new(-0.1, 0.1, 0.0, 2.0, -3.0, 1.0);
        assert!(sat(&x, phi).amax() < 1e-11);
    }

    #[test]
    fn boundary_layer_rejects_non_positive_widths() {
        assert!(BoundaryLayer::new(0.0).is_none());
        assert!(BoundaryLayer::new(-0.2).is_none());
        assert!(BoundaryLayer::new(f64::NAN).is_none());
        assert!(BoundaryLayer::new(f64::INFINITY).is_none());
        assert_eq!(BoundaryLayer::new(0.2).unwrap().width(), 0.2);
    }

    #[test]
    fn controller_kind_names() {
        let smc = ControllerKind::SlidingMode(BoundaryLayer::new(0.5).unwrap());
        assert_eq!(ControllerKind::InverseDynamics.tag(), "ID");
        assert_eq!(smc.tag(), "SMC");
        assert_eq!(smc.file_stem(), "SMC_phi_0.5");
        assert_eq!(ControllerKind::InverseDynamics.file_stem(), "ID");
        assert_eq!(smc.to_string(), "SMC φ=0.5");
        assert_eq!(ControllerKind::InverseDynamics.boundary_layer(), None);
    }

    #[test]
    fn closures_are_controller_strategies() {
        let mut calls = 0;
        let mut ctrl = |q: &JointVector, _dq: &JointVector, _t: f64| {
            calls += 1;
            -q
        };
        let tau = ctrl.apply_controller(&JointVector::repeat(1.0), &JointVector::zeros(), 0.0);
        assert_eq!(tau, JointVector::repeat(-1.0));
        assert_eq!(calls, 1);
    }
}
