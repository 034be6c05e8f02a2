//! Named per-joint values for the six-joint arm.
//!
//! Configuration is much easier to read with joint names than with numerical indices,
//! while the dynamics code works on plain `Vector6`. This module converts between the two.

use na::{Scalar, Vector6};
use serde::{Deserialize, Serialize};

/// Number of actuated joints of the arm.
pub const DOF: usize = 6;

//region JointMap

/// A struct with one entry for every revolute joint of the arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointMap<T> {
    pub shoulder_pan: T,
    pub shoulder_lift: T,
    pub elbow: T,
    pub wrist_1: T,
    pub wrist_2: T,
    pub wrist_3: T,
}

impl<T: Clone> JointMap<T> {
    /// The same value for every joint.
    pub fn splat(value: T) -> Self {
        JointMap {
            shoulder_pan: value.clone(),
            shoulder_lift: value.clone(),
            elbow: value.clone(),
            wrist_1: value.clone(),
            wrist_2: value.clone(),
            wrist_3: value,
        }
    }
}

impl<N: Scalar> From<Vector6<N>> for JointMap<N> {
    fn from(v: Vector6<N>) -> Self {
        JointMap::from(&v)
    }
}

impl<N: Scalar> From<&Vector6<N>> for JointMap<N> {
    fn from(v: &Vector6<N>) -> Self {
        JointMap {
            shoulder_pan: v[0].clone(),
            shoulder_lift: v[1].clone(),
            elbow: v[2].clone(),
            wrist_1: v[3].clone(),
            wrist_2: v[4].clone(),
            wrist_3: v[5].clone(),
        }
    }
}

impl<N: Scalar> From<JointMap<N>> for Vector6<N> {
    fn from(m: JointMap<N>) -> Self {
        Vector6::new(
            m.shoulder_pan,
            m.shoulder_lift,
            m.elbow,
            m.wrist_1,
            m.wrist_2,
            m.wrist_3,
        )
    }
}

//endregion

//region JointVector

/// Joint-space vector: positions, velocities, accelerations or torques.
pub type JointVector = Vector6<f64>;

impl JointMap<f64> {
    /// Clamp every component of `v` to `[-limit, limit]` of the matching joint.
    ///
    /// NaN components stay NaN.
    pub fn clamp_symmetric(&self, v: &JointVector) -> JointVector {
        let limits: JointVector = (*self).into();
        v.zip_map(&limits, |x, lim| x.clamp(-lim, lim))
    }
}

//endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_conversion_keeps_chain_order() {
        let v = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let map = JointMap::from(v);
        assert_eq!(map.shoulder_pan, 1.0);
        assert_eq!(map.wrist_3, 6.0);
        let back: Vector6<f64> = map.into();
        assert_eq!(back, v);
    }

    #[test]
    fn clamp_symmetric_respects_each_joint() {
        let limits = JointMap {
            shoulder_pan: 1.0,
            shoulder_lift: 2.0,
            elbow: 3.0,
            wrist_1: 0.5,
            wrist_2: 0.5,
            wrist_3: 0.5,
        };
        let clamped =
            limits.clamp_symmetric(&Vector6::new(5.0, -5.0, 2.5, -0.1, 0.7, -0.7));
        assert_eq!(clamped, Vector6::new(1.0, -2.0, 2.5, -0.1, 0.5, -0.5));
    }

    #[test]
    fn clamp_symmetric_keeps_nan() {
        let limits = JointMap::splat(f64::INFINITY);
        let mut v = Vector6::repeat(3.0);
        v[2] = f64::NAN;
        let clamped = limits.clamp_symmetric(&v);
        assert!(clamped[2].is_nan());
        assert_eq!(clamped[0], 3.0);
    }
}
