//! Camera intrinsics data

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Physical units the focal length is displayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraUnits {
    #[default]
    Millimeters,
    Pixels,
}

/// Pinhole camera with a polynomial radial distortion model.
///
/// `focal` is in pixels on the long edge of the sensor; the principal point
/// is in pixels with the origin in the corner of the frame. `pixel_aspect`
/// affects the y axis only: consumers scale principal y and the image height
/// by `1 / pixel_aspect` before handing the values to the distortion kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub focal: f32,
    pub principal: Vec2,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub pixel_aspect: f32,
    /// Physical sensor width in millimeters
    pub sensor_width: f32,
    pub units: CameraUnits,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            focal: 24.0 * 35.0, // roughly a 24mm lens on default sensor, in pixels
            principal: Vec2::ZERO,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            pixel_aspect: 1.0,
            sensor_width: 35.0,
            units: CameraUnits::Millimeters,
        }
    }
}

impl CameraIntrinsics {
    /// Inverse pixel aspect, the factor applied to y-axis quantities.
    pub fn aspy(&self) -> f32 {
        1.0 / self.pixel_aspect
    }

    /// Principal point offset from frame center as a normalized shift pair.
    /// Both axes divide by the width, which is how the shift convention of
    /// the render camera works.
    pub fn shift(&self, width: u32, height: u32) -> (f32, f32) {
        let shift_x = (0.5 * width as f32 - self.principal.x) / width as f32;
        let shift_y = (0.5 * height as f32 - self.principal.y) / width as f32;
        (shift_x, shift_y)
    }
}
