//! The simulator: owns the plant, calls the controller once per integration step, and
//! optionally shows or records what happens.

use std::path::PathBuf;

use na::Point3;
use tracing::{debug, info};

use crate::control_strategies::ControllerStrategy;
use crate::error::SimulationError;
use crate::physics::PhysicsWorld;
use crate::robot::{JointMap, JointVector, RobotDescription};

#[cfg(feature = "video")]
use crate::video::FrameRecorder;

/// Camera and video settings. The frame rate only affects recording, never the control rate.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    pub record: bool,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub timestep: f64,
    pub headless: bool,
    pub video: VideoConfig,
    pub initial_position: JointVector,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            timestep: 0.002,
            headless: true,
            video: VideoConfig {
                record: false,
                fps: 30.0,
                width: 640,
                height: 480,
                path: PathBuf::from("video.mp4"),
            },
            initial_position: JointVector::zeros(),
        }
    }
}

pub struct Simulator {
    physics: PhysicsWorld,
    config: SimulatorConfig,
    reference: Option<JointVector>,
}

impl Simulator {
    pub fn new(
        description: RobotDescription,
        config: SimulatorConfig,
    ) -> Result<Self, SimulationError> {
        let mut physics = PhysicsWorld::new(description, config.timestep)?;
        physics.q = config.initial_position;
        Ok(Simulator {
            physics,
            config,
            reference: None,
        })
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn set_joint_damping(&mut self, damping: JointVector) {
        self.physics.damping = damping;
    }

    pub fn set_joint_friction(&mut self, friction: JointVector) {
        self.physics.friction = friction;
    }

    pub fn set_torque_limits(&mut self, limits: JointMap<f64>) {
        self.physics.torque_limits = limits;
    }

    pub fn modify_body_mass(&mut self, body: &str, mass: f64) -> Result<(), SimulationError> {
        self.physics.set_body_mass(body, mass)?;
        debug!(body, mass, "body mass overridden");
        Ok(())
    }

    /// Configuration drawn as a ghost arm in the viewer.
    pub fn set_reference_pose(&mut self, q: JointVector) {
        self.reference = Some(q);
    }

    fn reference_points(&self) -> Vec<Point3<f64>> {
        self.reference
            .map(|q| self.physics.model().kinematics().joint_points(q.as_slice()))
            .unwrap_or_default()
    }

    /// Run for `duration` seconds of simulated time.
    ///
    /// The controller is called exactly once per integration step, with the state at the
    /// start of that step; its torque is applied for the whole step.
    pub fn run<C: ControllerStrategy + ?Sized>(
        &mut self,
        duration: f64,
        controller: &mut C,
    ) -> Result<(), SimulationError> {
        let steps = (duration / self.physics.timestep).round() as usize;
        let mut recorder = FrameRecorder::start(
            &self.config,
            self.physics.model().kinematics().clone(),
            self.reference_points(),
        )?;

        info!(steps, timestep = self.physics.timestep, "simulation started");

        for _ in 0..steps {
            let tau =
                controller.apply_controller(&self.physics.q, &self.physics.dq, self.physics.time);
            self.physics.step(&tau)?;

            if let Some(rec) = recorder.as_mut() {
                rec.capture(&self.physics)?;
            }
        }

        if let Some(rec) = recorder {
            rec.finish()?;
        }

        info!(time = self.physics.time, "simulation finished");
        Ok(())
    }
}

/// Stand-in used when the crate is built without the `video` feature: any request to show
/// or record is an error, everything else is a no-op.
#[cfg(not(feature = "video"))]
struct FrameRecorder;

#[cfg(not(feature = "video"))]
impl FrameRecorder {
    fn start(
        config: &SimulatorConfig,
        _kinematics: crate::kinematics::KinematicModel,
        _reference: Vec<Point3<f64>>,
    ) -> Result<Option<Self>, SimulationError> {
        if config.video.record || !config.headless {
            Err(SimulationError::VideoUnsupported)
        } else {
            Ok(None)
        }
    }

    fn capture(&mut self, _physics: &PhysicsWorld) -> Result<(), SimulationError> {
        Ok(())
    }

    fn finish(self) -> Result<(), SimulationError> {
        Ok(())
    }
}
