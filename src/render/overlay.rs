//! Mirrored camera feed with the hand skeleton and status drawn on top.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Error;
use opencv::core::{Mat, MatTraitConst, Point, Rect, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::imgproc;

use crate::camera::frame::Frame;
use crate::gesture::landmarks::{Finger, HandPose, WRIST};
use crate::pipeline::pipeline::DetectionState;
use crate::utils::image::{mirror_horizontally, mirror_point};

const BONE_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const JOINT_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
const TEXT_COLOR: (f64, f64, f64) = (255.0, 255.0, 255.0);
const BANNER_COLOR: (f64, f64, f64) = (40.0, 40.0, 200.0);

fn bgr(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0, color.1, color.2, 0.0)
}

/// Destination of rendered canvases.
pub trait RenderSurface {
    fn present(&mut self, canvas: &Mat) -> Result<(), Error>;
}

/// An OpenCV highgui window. The host must keep pumping `highgui::wait_key` for it to repaint.
pub struct HighGuiWindow {
    name: String,
}

impl HighGuiWindow {
    pub fn new(name: &str) -> Result<Self, Error> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(HighGuiWindow {
            name: name.to_string(),
        })
    }
}

impl RenderSurface for HighGuiWindow {
    fn present(&mut self, canvas: &Mat) -> Result<(), Error> {
        highgui::imshow(&self.name, canvas)?;
        Ok(())
    }
}

impl Drop for HighGuiWindow {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.name);
    }
}

/// Keeps a copy of the last presented canvas for hosts that composite it themselves.
#[derive(Clone, Default)]
pub struct LatestCanvas {
    canvas: Rc<RefCell<Mat>>,
    presented: Rc<RefCell<usize>>,
}

impl LatestCanvas {
    pub fn new() -> Self {
        LatestCanvas::default()
    }

    /// with_canvas gives read access to the last presented canvas.
    pub fn with_canvas<R>(&self, f: impl FnOnce(&Mat) -> R) -> R {
        f(&self.canvas.borrow())
    }

    pub fn presented(&self) -> usize {
        *self.presented.borrow()
    }
}

impl RenderSurface for LatestCanvas {
    fn present(&mut self, canvas: &Mat) -> Result<(), Error> {
        canvas.copy_to(&mut *self.canvas.borrow_mut())?;
        *self.presented.borrow_mut() += 1;
        Ok(())
    }
}

pub struct OverlayRenderer {
    surface: Box<dyn RenderSurface>,
    canvas: Mat,
    size: (i32, i32),
}

impl OverlayRenderer {
    /// new creates a renderer; `size` is used for status screens until the first frame arrives.
    pub fn new(surface: Box<dyn RenderSurface>, size: (i32, i32)) -> Self {
        OverlayRenderer {
            surface,
            canvas: Mat::default(),
            size,
        }
    }

    /// render draws the mirrored frame, the hand skeleton if any, and the confirmed label.
    ///
    /// # Arguments
    /// * `frame` - camera frame, unmirrored
    /// * `hand` - first detected hand, in frame pixel space
    /// * `label` - currently confirmed sign
    ///
    /// # Returns
    /// * `Result<(), Error>`
    pub fn render(
        &mut self,
        frame: &Frame,
        hand: Option<&HandPose>,
        label: Option<&str>,
    ) -> Result<(), Error> {
        self.size = (frame.width(), frame.height());
        mirror_horizontally(frame.image(), &mut self.canvas)?;
        if let Some(hand) = hand {
            draw_skeleton(&mut self.canvas, hand, frame.width())?;
        }
        if let Some(label) = label {
            draw_banner(&mut self.canvas, label, bgr(BONE_COLOR))?;
        }
        self.surface.present(&self.canvas)
    }

    /// render_status draws a placeholder screen for the states without a live feed.
    pub fn render_status(&mut self, state: &DetectionState) -> Result<(), Error> {
        let (width, height) = self.size;
        self.canvas = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        match state {
            DetectionState::Idle => draw_centered(&mut self.canvas, "Camera off - press C")?,
            DetectionState::Loading => {
                draw_centered(&mut self.canvas, "Loading recognition model...")?
            }
            DetectionState::Active => draw_centered(&mut self.canvas, "Waiting for camera...")?,
            DetectionState::Error(message) => {
                draw_banner(&mut self.canvas, message, bgr(BANNER_COLOR))?;
                draw_centered(&mut self.canvas, "Press R to retry")?;
            }
        }
        self.surface.present(&self.canvas)
    }
}

fn draw_skeleton(canvas: &mut Mat, hand: &HandPose, width: i32) -> Result<(), Error> {
    let point = |idx: usize| {
        let landmark = hand.landmark(idx);
        mirror_point(landmark.x, landmark.y, width)
    };

    for finger in Finger::ALL {
        let mut from = point(WRIST);
        for idx in finger.joints() {
            let to = point(idx);
            imgproc::line(canvas, from, to, bgr(BONE_COLOR), 2, imgproc::LINE_AA, 0)?;
            from = to;
        }
    }
    for idx in 0..hand.landmarks().len() {
        imgproc::circle(canvas, point(idx), 4, bgr(JOINT_COLOR), imgproc::FILLED, imgproc::LINE_AA, 0)?;
    }
    Ok(())
}

fn draw_banner(canvas: &mut Mat, text: &str, color: Scalar) -> Result<(), Error> {
    let width = canvas.cols();
    imgproc::rectangle(canvas, Rect::new(0, 0, width, 40), color, imgproc::FILLED, imgproc::LINE_8, 0)?;
    imgproc::put_text(
        canvas,
        text,
        Point::new(10, 28),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        bgr(TEXT_COLOR),
        2,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}

fn draw_centered(canvas: &mut Mat, text: &str) -> Result<(), Error> {
    let mut baseline = 0;
    let size = imgproc::get_text_size(text, imgproc::FONT_HERSHEY_SIMPLEX, 0.8, 2, &mut baseline)?;
    let origin = Point::new(
        (canvas.cols() - size.width) / 2,
        (canvas.rows() + size.height) / 2,
    );
    imgproc::put_text(
        canvas,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        bgr(TEXT_COLOR),
        2,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}
