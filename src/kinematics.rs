//! A module containing a simplified datatype that represents kinematic models,
//! a stripped-down representation of a robot arm.

use na::{Isometry3, Point3, Translation3, Unit, Vector3};

use crate::robot::RobotDescription;

/// A link in a KinematicModel, assumed to consist of an axis of rotation
/// as well as a translation.
#[derive(Debug, Clone)]
pub struct KinematicLink {
    pub offset: Vector3<f64>,
    pub axis: Unit<Vector3<f64>>,
}

/// A simple kinematic chain model, consisting of a single origin and a set of revolute links.
///
/// The `origin` field is effectively an "anchor" where the base of the chain is attached in space.
///
/// Then, each link contains an 'offset' and an 'axis' field. The axis is the direction of the axis
/// around which the link rotates, and the offset is the vector from the base to the tip of the link
/// when at 0 angle.
#[derive(Debug, Clone)]
pub struct KinematicModel {
    pub origin: Isometry3<f64>,
    pub links: Vec<KinematicLink>,
}

pub struct PredictedPositions {
    pub link_base_positions: Vec<Isometry3<f64>>,
    pub tip_position: Isometry3<f64>,
}

impl KinematicModel {
    pub fn from_description(description: &RobotDescription) -> Self {
        KinematicModel {
            origin: Isometry3::from_parts(
                Translation3::from(description.origin),
                na::UnitQuaternion::identity(),
            ),
            links: description
                .links
                .iter()
                .map(|l| KinematicLink {
                    offset: l.offset,
                    axis: Unit::new_normalize(l.axis),
                })
                .collect(),
        }
    }

    /// Predict the global pose of the base of every kinematic link, and of the tip.
    pub fn predict(&self, angles: &[f64]) -> PredictedPositions {
        let mut last_tip_position = self.origin;

        let mut base_positions = Vec::with_capacity(self.links.len());

        for (a, l) in angles.iter().zip(self.links.iter()) {
            let base_pos =
                last_tip_position * Isometry3::new(Vector3::zeros(), l.axis.into_inner() * *a);
            last_tip_position = base_pos * Translation3::from(l.offset);
            base_positions.push(base_pos);
        }

        PredictedPositions {
            link_base_positions: base_positions,
            tip_position: last_tip_position,
        }
    }

    /// Global positions of every joint followed by the tip, handy for drawing the arm.
    pub fn joint_points(&self, angles: &[f64]) -> Vec<Point3<f64>> {
        let predicted = self.predict(angles);
        let origin = Point3::origin();
        predicted
            .link_base_positions
            .iter()
            .map(|p| p * origin)
            .chain(std::iter::once(predicted.tip_position * origin))
            .collect()
    }
}
