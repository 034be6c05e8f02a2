//! Frame capture for simulated trials.
//!
//! Frames are rendered with kiss3d at a fixed rate in simulated time, dumped as numbered
//! PNG files, and stitched into an MP4 by `ffmpeg` when the trial ends.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use na::Point3;
use tracing::{debug, info};

use crate::error::SimulationError;
use crate::graphics::Graphics;
use crate::kinematics::KinematicModel;
use crate::physics::PhysicsWorld;
use crate::simulation::SimulatorConfig;

struct Recording {
    frames_dir: PathBuf,
    video_path: PathBuf,
    frame_index: usize,
}

/// Drives the viewer during a run and optionally records what it shows.
pub struct FrameRecorder {
    graphics: Graphics,
    kinematics: KinematicModel,
    reference: Vec<Point3<f64>>,
    recording: Option<Recording>,
    fps: f64,
    next_frame_time: f64,
}

impl FrameRecorder {
    /// Open a viewer if the configuration asks for one, either to show or to record.
    pub fn start(
        config: &SimulatorConfig,
        kinematics: KinematicModel,
        reference: Vec<Point3<f64>>,
    ) -> Result<Option<Self>, SimulationError> {
        if !config.video.record && config.headless {
            return Ok(None);
        }

        let recording = if config.video.record {
            // Fail before the trial rather than after it.
            require_encoder(FFMPEG)?;
            let frames_dir = frames_dir_for(&config.video.path);
            prepare_frames_dir(&frames_dir)?;
            Some(Recording {
                frames_dir,
                video_path: config.video.path.clone(),
                frame_index: 0,
            })
        } else {
            None
        };

        let graphics = Graphics::init(
            "Joint-space regulation",
            config.video.width,
            config.video.height,
            config.headless,
        );

        Ok(Some(FrameRecorder {
            graphics,
            kinematics,
            reference,
            recording,
            fps: config.video.fps,
            next_frame_time: 0.0,
        }))
    }

    /// Render (and save) a frame if the simulated clock has reached the next frame time.
    pub fn capture(&mut self, physics: &PhysicsWorld) -> Result<(), SimulationError> {
        if physics.time + 1e-9 < self.next_frame_time {
            return Ok(());
        }
        self.next_frame_time += 1.0 / self.fps;

        let arm = self.kinematics.joint_points(physics.q.as_slice());
        if !self.graphics.draw_frame(&arm, &self.reference) {
            debug!("viewer window closed, continuing headless");
        }

        if let Some(rec) = self.recording.as_mut() {
            let path = rec.frames_dir.join(format!("frame_{:06}.png", rec.frame_index));
            self.graphics.snap(&path).map_err(SimulationError::Video)?;
            rec.frame_index += 1;
        }
        Ok(())
    }

    /// Encode the captured frames, if any.
    pub fn finish(self) -> Result<(), SimulationError> {
        debug!(frames = self.graphics.frames_drawn(), "viewer finished");
        if let Some(rec) = self.recording {
            info!(frames = rec.frame_index, path = %rec.video_path.display(), "encoding video");
            encode_mp4_with_ffmpeg(&rec.frames_dir, self.fps, &rec.video_path)?;
        }
        Ok(())
    }
}

fn frames_dir_for(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video_path.with_file_name(format!("{}_frames", stem))
}

fn prepare_frames_dir(frames_dir: &Path) -> Result<(), SimulationError> {
    let io_err = |e: std::io::Error| {
        SimulationError::Video(format!("{}: {}", frames_dir.display(), e))
    };
    fs::create_dir_all(frames_dir).map_err(io_err)?;

    // Clean old frames.
    for entry in fs::read_dir(frames_dir).map_err(io_err)? {
        let p = entry.map_err(io_err)?.path();
        if p.is_file() {
            fs::remove_file(p).map_err(io_err)?;
        }
    }
    Ok(())
}

const FFMPEG: &str = "ffmpeg";

fn require_encoder(program: &str) -> Result<(), SimulationError> {
    match Command::new(program).arg("-version").output() {
        Ok(_) => Ok(()),
        Err(e) => Err(SimulationError::Video(format!(
            "{} not found on PATH, cannot encode video: {}",
            program, e
        ))),
    }
}

fn encode_mp4_with_ffmpeg(
    frames_dir: &Path,
    fps: f64,
    out_mp4: &Path,
) -> Result<(), SimulationError> {
    let input_pattern = frames_dir.join("frame_%06d.png");

    let status = Command::new(FFMPEG)
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg("-framerate")
        .arg(format!("{}", fps))
        .arg("-i")
        .arg(input_pattern.to_string_lossy().as_ref())
        .arg("-c:v")
        .arg("libx264")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg(out_mp4.to_string_lossy().as_ref())
        .status()
        .map_err(|e| SimulationError::Video(format!("failed to run ffmpeg: {}", e)))?;

    if !status.success() {
        return Err(SimulationError::Video(format!(
            "ffmpeg exited with {} while encoding {}",
            status,
            out_mp4.display()
        )));
    }

    fs::remove_dir_all(frames_dir)
        .map_err(|e| SimulationError::Video(format!("{}: {}", frames_dir.display(), e)))?;
    info!(path = %out_mp4.display(), "video written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_live_next_to_the_video() {
        assert_eq!(
            frames_dir_for(Path::new("logs/videos/SMC_phi_0.2.mp4")),
            PathBuf::from("logs/videos/SMC_phi_0.2_frames")
        );
    }

    #[test]
    fn missing_encoder_is_an_error() {
        assert!(matches!(
            require_encoder("no-such-video-encoder-on-path"),
            Err(SimulationError::Video(_))
        ));
    }
}
