//! The experiment driver: one simulated trial per controller configuration, each reduced
//! to a tracking-accuracy and a chattering figure.
//!
//! Trials run strictly one after the other. Each gets a fresh simulator, and the only
//! state a trial writes to is the log sink handed to it.

use std::fs;

use na::{DVector, Matrix6xX};
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::control_strategies::{ControllerKind, DesiredTrajectory};
use crate::dynamics::{DynamicsProvider, RigidBodyModel};
use crate::error::{ExperimentError, ReportError, SimulationError};
use crate::report;
use crate::robot::{JointVector, RobotDescription};
use crate::simulation::{Simulator, SimulatorConfig, VideoConfig};

/// One row of the trial log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: f64,
    pub position: JointVector,
    pub desired: JointVector,
    /// Sliding variable; zero for inverse dynamics trials.
    pub sliding: JointVector,
}

/// Receives one entry per simulation step.
pub trait LogSink {
    fn record(&mut self, entry: LogEntry);
}

/// Append-only in-memory trial log.
#[derive(Debug, Default)]
pub struct TrialLog {
    entries: Vec<LogEntry>,
}

impl LogSink for TrialLog {
    fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

impl TrialLog {
    pub fn new() -> Self {
        TrialLog::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to column-per-step arrays once the trial is over.
    pub fn freeze(self) -> TrialSeries {
        let n = self.entries.len();
        let e = &self.entries;
        TrialSeries {
            time: DVector::from_iterator(n, e.iter().map(|x| x.time)),
            position: Matrix6xX::from_fn(n, |r, c| e[c].position[r]),
            desired: Matrix6xX::from_fn(n, |r, c| e[c].desired[r]),
            sliding: Matrix6xX::from_fn(n, |r, c| e[c].sliding[r]),
        }
    }
}

/// A frozen trial log: one column per simulation step.
#[derive(Debug, Clone)]
pub struct TrialSeries {
    pub time: DVector<f64>,
    pub position: Matrix6xX<f64>,
    pub desired: Matrix6xX<f64>,
    pub sliding: Matrix6xX<f64>,
}

impl TrialSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Euclidean norm of the position error at every step.
    pub fn tracking_error_norms(&self) -> DVector<f64> {
        let diff = &self.position - &self.desired;
        DVector::from_iterator(self.len(), diff.column_iter().map(|c| c.norm()))
    }

    /// Euclidean norm of the sliding variable at every step.
    pub fn sliding_norms(&self) -> DVector<f64> {
        DVector::from_iterator(self.len(), self.sliding.column_iter().map(|c| c.norm()))
    }
}

fn mean(v: &DVector<f64>) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.mean()
    }
}

/// Scalar summary of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialMetrics {
    /// Mean Euclidean norm of the position error.
    pub rmse: f64,
    /// Mean Euclidean norm of the sliding variable; zero for inverse dynamics.
    pub chattering: f64,
}

impl TrialMetrics {
    pub fn from_series(kind: &ControllerKind, series: &TrialSeries) -> Self {
        let chattering = match kind {
            ControllerKind::InverseDynamics => 0.0,
            ControllerKind::SlidingMode(_) => mean(&series.sliding_norms()),
        };
        TrialMetrics {
            rmse: mean(&series.tracking_error_norms()),
            chattering,
        }
    }
}

/// A row of the results table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsRecord {
    pub controller: ControllerKind,
    pub rmse: f64,
    pub chattering: f64,
}

impl MetricsRecord {
    pub fn new(controller: ControllerKind, metrics: TrialMetrics) -> Self {
        MetricsRecord {
            controller,
            rmse: metrics.rmse,
            chattering: metrics.chattering,
        }
    }
}

/// Build a simulator for one trial with the fixed perturbations of the experiment.
fn make_simulator(
    config: &ExperimentConfig,
    description: &RobotDescription,
    kind: &ControllerKind,
) -> Result<Simulator, SimulationError> {
    let sim_config = SimulatorConfig {
        timestep: config.timestep,
        headless: config.headless,
        video: VideoConfig {
            record: config.record_video,
            fps: config.fps,
            width: config.frame_width,
            height: config.frame_height,
            path: config.video_path(kind),
        },
        initial_position: config.initial_position.into(),
    };

    let mut sim = Simulator::new(description.clone(), sim_config)?;
    sim.set_joint_damping(config.joint_damping.into());
    sim.set_joint_friction(config.joint_friction.into());
    sim.set_torque_limits(config.torque_limits);
    sim.modify_body_mass(&config.end_effector_body, config.end_effector_mass)?;
    sim.set_reference_pose(config.target.into());
    Ok(sim)
}

/// Run one trial, sending every step to `sink`.
///
/// `model` is the controllers' view of the arm. The simulated arm is built separately from
/// `description` and then perturbed, so the two deliberately disagree.
pub fn run_trial<D, S>(
    config: &ExperimentConfig,
    description: &RobotDescription,
    model: &D,
    kind: ControllerKind,
    sink: &mut S,
) -> Result<(), SimulationError>
where
    D: DynamicsProvider + ?Sized,
    S: LogSink + ?Sized,
{
    let mut sim = make_simulator(config, description, &kind)?;
    let desired = DesiredTrajectory::regulation(config.target.into());
    let id = config.inverse_dynamics;
    let smc = config.sliding_mode;

    let mut controller = |q: &JointVector, dq: &JointVector, time: f64| {
        let (torque, sliding) = match kind {
            ControllerKind::InverseDynamics => {
                (id.compute_torque(model, &desired, q, dq), JointVector::zeros())
            }
            ControllerKind::SlidingMode(phi) => {
                let out = smc.compute_torque(model, &desired, q, dq, phi);
                (out.torque, out.sliding)
            }
        };
        sink.record(LogEntry {
            time,
            position: *q,
            desired: desired.position,
            sliding,
        });
        torque
    };

    info!(controller = %kind, duration = config.sim_time, "trial started");
    sim.run(config.sim_time, &mut controller)
}

/// Widths whose chattering exceeds that of a wider layer, as `(narrower, wider)` pairs.
///
/// A thinner boundary layer is expected not to increase mean ‖s‖. Violations are a
/// regression signal, not an error: dynamics noise can perturb the ordering.
pub fn tradeoff_ordering_violations(records: &[MetricsRecord]) -> Vec<(f64, f64)> {
    let mut smc: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.controller.boundary_layer().map(|phi| (phi.width(), r.chattering)))
        .collect();
    smc.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut violations = Vec::new();
    for (i, narrow) in smc.iter().enumerate() {
        for wide in &smc[i + 1..] {
            if narrow.1 > wide.1 {
                violations.push((narrow.0, wide.0));
            }
        }
    }
    violations
}

/// Run the whole trial set: one inverse dynamics trial and one sliding mode trial per
/// boundary-layer width. Any failure aborts the experiment.
pub fn run_experiment(
    config: &ExperimentConfig,
    description: &RobotDescription,
) -> Result<Vec<MetricsRecord>, ExperimentError> {
    config.validate()?;
    let kinds = config.controller_kinds()?;

    // Without a model no controller can run, so this happens before the first trial.
    let model = RigidBodyModel::from_description(description)?;

    if config.record_video {
        let dir = config.output_dir.join(&config.video_dir);
        fs::create_dir_all(&dir).map_err(|source| ReportError::Io { path: dir, source })?;
    }

    let mut records = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let mut log = TrialLog::new();
        run_trial(config, description, &model, kind, &mut log).map_err(|source| {
            ExperimentError::Trial {
                trial: kind.to_string(),
                source,
            }
        })?;

        let series = log.freeze();
        let metrics = TrialMetrics::from_series(&kind, &series);
        info!(
            controller = %kind,
            steps = series.len(),
            rmse = metrics.rmse,
            chattering = metrics.chattering,
            "trial finished"
        );

        if config.save_traces {
            report::write_trace(&series, &config.trace_path(&kind))?;
        }

        records.push(MetricsRecord::new(kind, metrics));
    }

    for (narrow, wide) in tradeoff_ordering_violations(&records) {
        warn!(
            narrow,
            wide,
            "thinner boundary layer chattered more than a wider one; possible regression"
        );
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::control_strategies::BoundaryLayer;

    fn entry(time: f64, position: JointVector, sliding: JointVector) -> LogEntry {
        LogEntry {
            time,
            position,
            desired: JointVector::zeros(),
            sliding,
        }
    }

    #[test]
    fn metrics_are_means_of_norms() {
        let mut log = TrialLog::new();
        log.record(entry(
            0.0,
            JointVector::new(3.0, 4.0, 0.0, 0.0, 0.0, 0.0),
            JointVector::repeat(0.0),
        ));
        log.record(entry(
            0.1,
            JointVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            JointVector::new(0.0, 2.0, 0.0, 0.0, 0.0, 0.0),
        ));
        assert_eq!(log.len(), 2);

        let series = log.freeze();
        let smc = ControllerKind::SlidingMode(BoundaryLayer::new(0.2).unwrap());
        let metrics = TrialMetrics::from_series(&smc, &series);
        assert_relative_eq!(metrics.rmse, 3.0);
        assert_relative_eq!(metrics.chattering, 1.0);

        let id = TrialMetrics::from_series(&ControllerKind::InverseDynamics, &series);
        assert_relative_eq!(id.rmse, 3.0);
        assert_eq!(id.chattering, 0.0);
    }

    #[test]
    fn empty_log_gives_zero_metrics() {
        let series = TrialLog::new().freeze();
        assert!(series.is_empty());
        let metrics = TrialMetrics::from_series(&ControllerKind::InverseDynamics, &series);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.chattering, 0.0);
    }

    #[test]
    fn freeze_keeps_step_order() {
        let mut log = TrialLog::new();
        for i in 0..5 {
            log.record(entry(i as f64, JointVector::repeat(i as f64), JointVector::zeros()));
        }
        let series = log.freeze();
        assert_eq!(series.len(), 5);
        assert_eq!(series.time[3], 3.0);
        assert_eq!(series.position[(2, 4)], 4.0);
    }

    fn record(phi: f64, chattering: f64) -> MetricsRecord {
        MetricsRecord {
            controller: ControllerKind::SlidingMode(BoundaryLayer::new(phi).unwrap()),
            rmse: 0.1,
            chattering,
        }
    }

    #[test]
    fn ordering_violations_are_detected() {
        let id = MetricsRecord {
            controller: ControllerKind::InverseDynamics,
            rmse: 0.1,
            chattering: 0.0,
        };
        let monotone = [id, record(1.0, 0.3), record(0.2, 0.1), record(0.5, 0.2)];
        assert!(tradeoff_ordering_violations(&monotone).is_empty());

        let broken = [id, record(0.2, 0.5), record(0.5, 0.2), record(1.0, 0.3)];
        assert_eq!(tradeoff_ordering_violations(&broken), vec![(0.2, 0.5), (0.2, 1.0)]);
    }

    #[test]
    fn inverse_dynamics_trial_logs_every_step_with_zero_sliding() {
        let config = ExperimentConfig {
            sim_time: 0.05,
            ..ExperimentConfig::default()
        };
        let description = RobotDescription::ur5e();
        let model = RigidBodyModel::from_description(&description).unwrap();
        let mut log = TrialLog::new();
        let kind = ControllerKind::InverseDynamics;
        run_trial(&config, &description, &model, kind, &mut log).unwrap();

        assert_eq!(log.len(), 25);
        let series = log.freeze();
        assert_eq!(series.sliding.amax(), 0.0);
        assert_eq!(series.time[0], 0.0);
    }
}
