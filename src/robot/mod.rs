//! This mod contains the "standard robot arm": a six-joint serial manipulator
//! with UR5e proportions, plus the machinery to load other arms from JSON.
//!
//! A description follows the same chain convention as the kinematic model: every link
//! rotates about `axis` at its base, and `offset` points from that base to the next
//! joint. All vectors are expressed in the world-aligned frame of the zero configuration.

use std::fs;
use std::path::Path;

use na::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

pub use joint_map::{JointMap, JointVector, DOF};

pub mod joint_map;

/// Inertial properties of a single rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescription {
    pub name: String,
    pub mass: f64,
    /// Center of mass relative to the base of the link that carries the body.
    pub com: Vector3<f64>,
    /// Principal moments of inertia about the center of mass.
    pub inertia: Vector3<f64>,
}

/// A revolute link of the serial chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub joint: String,
    pub axis: Vector3<f64>,
    pub offset: Vector3<f64>,
    /// Reflected rotor inertia, added to the diagonal of the mass matrix.
    #[serde(default)]
    pub armature: f64,
    pub body: BodyDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDescription {
    pub name: String,
    /// Position of the first joint relative to the world origin.
    pub origin: Vector3<f64>,
    pub gravity: Vector3<f64>,
    pub links: Vec<LinkDescription>,
    /// Tool rigidly attached to the last link.
    #[serde(default)]
    pub end_effector: Option<BodyDescription>,
}

fn body(name: &str, mass: f64, com: [f64; 3], inertia: [f64; 3]) -> BodyDescription {
    BodyDescription {
        name: name.to_string(),
        mass,
        com: Vector3::from(com),
        inertia: Vector3::from(inertia),
    }
}

fn link(joint: &str, axis: [f64; 3], offset: [f64; 3], body: BodyDescription) -> LinkDescription {
    LinkDescription {
        joint: joint.to_string(),
        axis: Vector3::from(axis),
        offset: Vector3::from(offset),
        armature: 0.1,
        body,
    }
}

impl RobotDescription {
    /// The built-in UR5e arm, stretched out along +x at zero angles, with a light tool.
    pub fn ur5e() -> Self {
        RobotDescription {
            name: "ur5e".to_string(),
            origin: Vector3::new(0.0, 0.0, 0.163),
            gravity: Vector3::new(0.0, 0.0, -9.81),
            links: vec![
                link(
                    "shoulder_pan",
                    [0.0, 0.0, 1.0],
                    [0.0, 0.138, 0.0],
                    body("shoulder_link", 3.7, [0.0, 0.0, 0.0], [0.010267, 0.010267, 0.00666]),
                ),
                link(
                    "shoulder_lift",
                    [0.0, 1.0, 0.0],
                    [0.425, -0.131, 0.0],
                    body(
                        "upper_arm_link",
                        8.393,
                        [0.2125, 0.0, 0.0],
                        [0.0151074, 0.133886, 0.133886],
                    ),
                ),
                link(
                    "elbow",
                    [0.0, 1.0, 0.0],
                    [0.392, 0.0, 0.0],
                    body(
                        "forearm_link",
                        2.275,
                        [0.196, 0.0, 0.0],
                        [0.004095, 0.0311796, 0.0311796],
                    ),
                ),
                link(
                    "wrist_1",
                    [0.0, 1.0, 0.0],
                    [0.0, 0.127, 0.0],
                    body(
                        "wrist_1_link",
                        1.219,
                        [0.0, 0.127, 0.0],
                        [0.0025599, 0.0025599, 0.0021942],
                    ),
                ),
                link(
                    "wrist_2",
                    [0.0, 0.0, -1.0],
                    [0.0, 0.0, -0.1],
                    body(
                        "wrist_2_link",
                        1.219,
                        [0.0, 0.0, -0.1],
                        [0.0025599, 0.0025599, 0.0021942],
                    ),
                ),
                link(
                    "wrist_3",
                    [0.0, 1.0, 0.0],
                    [0.0, 0.1, 0.0],
                    body(
                        "wrist_3_link",
                        0.1889,
                        [0.0, 0.0771, 0.0],
                        [9.89041e-5, 1.321e-4, 9.89041e-5],
                    ),
                ),
            ],
            end_effector: Some(body("end_effector", 0.5, [0.0, 0.13, 0.0], [1e-3, 1e-3, 1e-3])),
        }
    }

    /// Load and validate a description from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let description: RobotDescription = serde_json::from_str(&text)?;
        description.validate()?;
        Ok(description)
    }

    /// Check that the description can be turned into a dynamics model.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.links.len() != DOF {
            return Err(ModelError::JointCount {
                expected: DOF,
                found: self.links.len(),
            });
        }

        if !all_finite(&self.origin) || !all_finite(&self.gravity) {
            return Err(ModelError::InvalidBody {
                body: self.name.clone(),
                message: "origin and gravity must be finite".to_string(),
            });
        }

        for link in &self.links {
            if !all_finite(&link.axis) || link.axis.norm() < 1e-9 {
                return Err(ModelError::InvalidJoint {
                    joint: link.joint.clone(),
                    message: format!("axis {:?} is not a usable direction", link.axis.as_slice()),
                });
            }
            if !all_finite(&link.offset) {
                return Err(ModelError::InvalidJoint {
                    joint: link.joint.clone(),
                    message: "offset must be finite".to_string(),
                });
            }
            if !(link.armature >= 0.0 && link.armature.is_finite()) {
                return Err(ModelError::InvalidJoint {
                    joint: link.joint.clone(),
                    message: format!("armature {} must be finite and non-negative", link.armature),
                });
            }
            link.body.validate()?;
        }

        if let Some(tool) = &self.end_effector {
            tool.validate()?;
        }

        Ok(())
    }

    /// Find a link body or the tool by name.
    pub fn body_mut(&mut self, name: &str) -> Option<&mut BodyDescription> {
        self.links
            .iter_mut()
            .map(|l| &mut l.body)
            .chain(self.end_effector.iter_mut())
            .find(|b| b.name == name)
    }

    pub fn body(&self, name: &str) -> Option<&BodyDescription> {
        self.links
            .iter()
            .map(|l| &l.body)
            .chain(self.end_effector.iter())
            .find(|b| b.name == name)
    }
}

impl BodyDescription {
    fn validate(&self) -> Result<(), ModelError> {
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(ModelError::InvalidBody {
                body: self.name.clone(),
                message: format!("mass {} must be positive and finite", self.mass),
            });
        }
        if !all_finite(&self.com) {
            return Err(ModelError::InvalidBody {
                body: self.name.clone(),
                message: "center of mass must be finite".to_string(),
            });
        }
        if !all_finite(&self.inertia) || self.inertia.iter().any(|i| *i < 0.0) {
            return Err(ModelError::InvalidBody {
                body: self.name.clone(),
                message: format!(
                    "inertia {:?} must be finite and non-negative",
                    self.inertia.as_slice()
                ),
            });
        }
        Ok(())
    }
}

fn all_finite(v: &Vector3<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
