//! Error types for the experiment. Every error here is fatal to the run:
//! nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the rigid-body model from a robot description.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read robot description {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed robot description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected {expected} joints, description has {found}")]
    JointCount { expected: usize, found: usize },

    #[error("body {body}: {message}")]
    InvalidBody { body: String, message: String },

    #[error("joint {joint}: {message}")]
    InvalidJoint { joint: String, message: String },
}

/// Errors raised by the simulator while setting up or running a trial.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no body named {0:?} in the simulated robot")]
    UnknownBody(String),

    #[error("invalid mass {mass} for body {body:?}")]
    InvalidMass { body: String, mass: f64 },

    #[error("mass matrix lost positive definiteness at t = {time:.4} s")]
    SingularMassMatrix { time: f64 },

    #[error("simulation diverged at t = {time:.4} s (non-finite joint state)")]
    Diverged { time: f64 },

    #[error("rebuilding the plant model failed: {0}")]
    Model(#[from] ModelError),

    #[error("video recording failed: {0}")]
    Video(String),

    #[error("video recording requested, but this build lacks the `video` feature")]
    VideoUnsupported,
}

/// Errors raised while persisting or loading results.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("results table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("results table {path}, row {row}: {message}")]
    Malformed {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("plot {path}: {message}")]
    Plot { path: PathBuf, message: String },

    #[error("cannot create output directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for a full experiment run.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("trial {trial} failed: {source}")]
    Trial {
        trial: String,
        #[source]
        source: SimulationError,
    },

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("invalid experiment configuration: {0}")]
    Config(String),
}
