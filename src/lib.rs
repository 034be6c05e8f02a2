//! Joint-space regulation of a six-joint arm under inverse dynamics and sliding mode control,
//! and the robustness versus chattering trade-off of the boundary-layer width.

pub mod config;
pub mod control_strategies;
pub mod dynamics;
pub mod error;
pub mod experiment;
#[cfg(feature = "video")]
pub mod graphics;
pub mod kinematics;
pub mod physics;
pub mod report;
pub mod robot;
pub mod simulation;
#[cfg(feature = "video")]
pub mod video;

extern crate nalgebra as na;
