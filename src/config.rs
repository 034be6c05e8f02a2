//! Experiment configuration: constants of the reference run, overridable from JSON and
//! from the command line.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::control_strategies::{
    BoundaryLayer, ControllerKind, InverseDynamicsController, SlidingModeController,
};
use crate::error::ExperimentError;
use crate::robot::{JointMap, JointVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Simulated duration of every trial, in seconds.
    pub sim_time: f64,
    pub timestep: f64,
    pub fps: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub record_video: bool,
    pub headless: bool,

    pub inverse_dynamics: InverseDynamicsController,
    pub sliding_mode: SlidingModeController,
    /// Boundary-layer widths, one SMC trial each.
    pub boundary_layers: Vec<f64>,

    pub target: JointMap<f64>,
    pub initial_position: JointMap<f64>,

    // Perturbations applied to the simulated arm only; the controllers' model never sees them.
    pub joint_damping: JointMap<f64>,
    pub joint_friction: JointMap<f64>,
    pub torque_limits: JointMap<f64>,
    pub end_effector_body: String,
    pub end_effector_mass: f64,

    pub output_dir: PathBuf,
    pub results_file: String,
    pub plot_file: String,
    pub video_dir: PathBuf,
    pub save_traces: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            sim_time: 10.0,
            timestep: 0.002,
            fps: 30.0,
            frame_width: 640,
            frame_height: 480,
            record_video: false,
            headless: true,

            inverse_dynamics: InverseDynamicsController { kp: 100.0, kd: 20.0 },
            sliding_mode: SlidingModeController { lambda: 10.0, k: 20.0 },
            boundary_layers: vec![0.2, 0.5, 1.0],

            target: JointMap {
                shoulder_pan: 0.0,
                shoulder_lift: -FRAC_PI_4,
                elbow: FRAC_PI_2,
                wrist_1: -FRAC_PI_4,
                wrist_2: FRAC_PI_2,
                wrist_3: 0.0,
            },
            initial_position: JointMap::splat(0.0),

            joint_damping: JointMap {
                shoulder_pan: 0.5,
                shoulder_lift: 0.5,
                elbow: 0.5,
                wrist_1: 0.1,
                wrist_2: 0.1,
                wrist_3: 0.1,
            },
            joint_friction: JointMap {
                shoulder_pan: 1.5,
                shoulder_lift: 0.5,
                elbow: 0.5,
                wrist_1: 0.1,
                wrist_2: 0.1,
                wrist_3: 0.1,
            },
            torque_limits: JointMap {
                shoulder_pan: 150.0,
                shoulder_lift: 150.0,
                elbow: 150.0,
                wrist_1: 28.0,
                wrist_2: 28.0,
                wrist_3: 28.0,
            },
            end_effector_body: "end_effector".to_string(),
            end_effector_mass: 4.0,

            output_dir: PathBuf::from("."),
            results_file: "tradeoff_results.csv".to_string(),
            plot_file: "tradeoff_plot.png".to_string(),
            video_dir: PathBuf::from("logs/videos"),
            save_traces: false,
        }
    }
}

impl ExperimentConfig {
    /// Read a configuration from JSON; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ExperimentError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ExperimentError::Config(format!("{}: {}", path.display(), e)))?;
        let config: ExperimentConfig = serde_json::from_str(&text)
            .map_err(|e| ExperimentError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(ExperimentError::Config(format!("{} must be positive, got {}", name, v)))
            }
        };

        positive("timestep", self.timestep)?;
        positive("sim_time", self.sim_time)?;
        positive("fps", self.fps)?;
        positive("kp", self.inverse_dynamics.kp)?;
        positive("kd", self.inverse_dynamics.kd)?;
        positive("lambda", self.sliding_mode.lambda)?;
        positive("k", self.sliding_mode.k)?;
        positive("end_effector_mass", self.end_effector_mass)?;
        let limits: JointVector = self.torque_limits.into();
        if limits.iter().any(|l| l.is_nan() || *l <= 0.0) {
            return Err(ExperimentError::Config(format!(
                "torque limits must be positive, got {:?}",
                self.torque_limits
            )));
        }

        if self.sim_time < self.timestep {
            return Err(ExperimentError::Config(format!(
                "sim_time {} is shorter than one timestep {}",
                self.sim_time, self.timestep
            )));
        }

        self.controller_kinds().map(|_| ())
    }

    /// The trial set: one inverse dynamics trial, then one sliding mode trial per width.
    pub fn controller_kinds(&self) -> Result<Vec<ControllerKind>, ExperimentError> {
        let mut kinds = vec![ControllerKind::InverseDynamics];
        for phi in &self.boundary_layers {
            let layer = BoundaryLayer::new(*phi).ok_or_else(|| {
                ExperimentError::Config(format!(
                    "boundary layer width must be positive, got {}",
                    phi
                ))
            })?;
            kinds.push(ControllerKind::SlidingMode(layer));
        }
        Ok(kinds)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(&self.results_file)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_dir.join(&self.plot_file)
    }

    pub fn video_path(&self, kind: &ControllerKind) -> PathBuf {
        self.output_dir
            .join(&self.video_dir)
            .join(format!("{}.mp4", kind.file_stem()))
    }

    pub fn trace_path(&self, kind: &ControllerKind) -> PathBuf {
        self.output_dir
            .join("logs")
            .join("traces")
            .join(format!("{}.csv", kind.file_stem()))
    }
}
