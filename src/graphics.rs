//! module concerning most graphic-related aspects of the simulator.

use std::path::Path;

use kiss3d::camera::ArcBall;
use kiss3d::light::Light;
use kiss3d::window::Window;
use na::{Point3, Vector3};

/// Struct containing data necessary for visualisation of the simulation.
pub struct Graphics {
    pub window: Window,
    camera: ArcBall,
    frames_drawn: u64,
    trace: Trace,
}

impl Graphics {
    /// Initialize the visualisation with some default settings.
    /// A headless window is never shown but can still be rendered and captured.
    pub fn init(title: &str, width: u32, height: u32, headless: bool) -> Graphics {
        let mut window = if headless {
            Window::new_hidden(title)
        } else {
            Window::new_with_size(title, width, height)
        };
        window.set_light(Light::StickToCamera);
        window.set_background_color(1.0, 1.0, 1.0);

        let mut camera = ArcBall::new(Point3::new(1.6, -1.8, 1.2), Point3::new(0.3, 0.0, 0.35));
        camera.set_up_axis(Vector3::z());

        Graphics {
            window,
            camera,
            frames_drawn: 0,
            trace: Trace { points: vec![] },
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Draw a frame showing the arm (joint points chained from base to tip) and the
    /// target pose, processing any window input as well.
    ///
    /// Returns false once the window has been closed.
    pub fn draw_frame(&mut self, arm: &[Point3<f64>], target: &[Point3<f64>]) -> bool {
        self.frames_drawn += 1;

        let arm: Vec<Point3<f32>> = arm.iter().map(to_render).collect();
        let target: Vec<Point3<f32>> = target.iter().map(to_render).collect();

        if let Some(tip) = arm.last() {
            self.trace.points.push(*tip);
        }

        draw_polyline(&mut self.window, &target, &Point3::new(0.2, 0.7, 0.2));
        draw_polyline(&mut self.window, &arm, &Point3::new(0.1, 0.2, 0.8));
        self.trace.draw(&mut self.window);

        // Floor cross at the base.
        let floor = 0.5;
        self.window.draw_line(
            &Point3::new(-floor, 0.0, 0.0),
            &Point3::new(floor, 0.0, 0.0),
            &Point3::new(0.6, 0.6, 0.6),
        );
        self.window.draw_line(
            &Point3::new(0.0, -floor, 0.0),
            &Point3::new(0.0, floor, 0.0),
            &Point3::new(0.6, 0.6, 0.6),
        );

        self.window.render_with_camera(&mut self.camera)
    }

    /// Save the last rendered frame as an image.
    pub fn snap(&self, path: &Path) -> Result<(), String> {
        self.window.snap_image().save(path).map_err(|e| e.to_string())
    }
}

fn to_render(p: &Point3<f64>) -> Point3<f32> {
    Point3::new(p.x as f32, p.y as f32, p.z as f32)
}

fn draw_polyline(window: &mut Window, points: &[Point3<f32>], color: &Point3<f32>) {
    for pair in points.windows(2) {
        window.draw_line(&pair[0], &pair[1], color);
    }
}

/// History of the tool tip, drawn as a red curve.
struct Trace {
    points: Vec<Point3<f32>>,
}

impl Trace {
    fn draw(&self, window: &mut Window) {
        draw_polyline(window, &self.points, &Point3::new(1.0, 0.0, 0.0));
    }
}
