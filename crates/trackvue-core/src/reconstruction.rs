//! Reconstructed camera motion

use std::cell::Cell;

use bitflags::bitflags;
use glam::Mat4;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ReconstructionFlags: u8 {
        /// A solve has completed and the camera array is valid
        const RECONSTRUCTED = 1 << 0;
    }
}

/// Camera pose solved for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedCamera {
    pub frame: i32,
    /// Camera-to-world pose
    pub mat: Mat4,
    /// Reprojection error at this frame
    pub error: f32,
}

/// Result of a motion solve: per-frame camera poses sorted by frame.
///
/// The array is replaced wholesale when a solve finishes; lookups go through
/// a cursor hint for amortized O(1) access on monotone queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reconstruction {
    cameras: Vec<ReconstructedCamera>,
    #[serde(skip)]
    last_camera: Cell<usize>,
    pub flags: ReconstructionFlags,
    /// Overall reprojection error of the solve
    pub error: f32,
}

impl Reconstruction {
    pub fn cameras(&self) -> &[ReconstructedCamera] {
        &self.cameras
    }

    pub fn is_reconstructed(&self) -> bool {
        self.flags.contains(ReconstructionFlags::RECONSTRUCTED)
    }

    /// Replace the camera array. Cameras are sorted by frame on the way in.
    pub fn set_cameras(&mut self, mut cameras: Vec<ReconstructedCamera>) {
        cameras.sort_by_key(|camera| camera.frame);
        self.cameras = cameras;
        self.last_camera.set(0);
    }

    pub fn clear(&mut self) {
        self.cameras.clear();
        self.last_camera.set(0);
        self.flags = ReconstructionFlags::empty();
        self.error = 0.0;
    }

    pub(crate) fn cameras_mut(&mut self) -> &mut [ReconstructedCamera] {
        &mut self.cameras
    }

    fn camera_index(&self, frame: i32, nearest: bool) -> Option<usize> {
        let cameras = &self.cameras;
        if cameras.is_empty() {
            return None;
        }

        if frame < cameras[0].frame {
            return if nearest { Some(0) } else { None };
        }
        if frame > cameras[cameras.len() - 1].frame {
            return if nearest { Some(cameras.len() - 1) } else { None };
        }

        let mut a = 0i64;
        let hint = self.last_camera.get();
        if hint < cameras.len() {
            a = hint as i64;
        }

        let direction: i64 = if cameras[a as usize].frame >= frame { -1 } else { 1 };

        while a >= 0 && (a as usize) < cameras.len() {
            let cfra = cameras[a as usize].frame;

            // the requested frame may have been "skipped" by the solver
            if direction > 0 && cfra > frame {
                return if nearest { Some(a as usize - 1) } else { None };
            }
            if direction < 0 && cfra < frame {
                return if nearest { Some(a as usize) } else { None };
            }

            if cfra == frame {
                self.last_camera.set(a as usize);
                return Some(a as usize);
            }

            a += direction;
        }

        None
    }

    /// Camera solved exactly at `frame`, if the solver emitted one.
    pub fn camera_for_frame(&self, frame: i32) -> Option<&ReconstructedCamera> {
        self.camera_index(frame, false).map(|i| &self.cameras[i])
    }

    /// Camera pose at `frame`, interpolating between the two neighboring
    /// solved frames and clamping to the nearest pose outside the solved
    /// range. Identity when nothing was reconstructed.
    pub fn camera_interpolate(&self, frame: i32) -> Mat4 {
        let Some(index) = self.camera_index(frame, true) else {
            return Mat4::IDENTITY;
        };

        let camera = &self.cameras[index];
        if camera.frame != frame && index > 0 && index < self.cameras.len() - 1 {
            let next = &self.cameras[index + 1];
            let t = (frame - camera.frame) as f32 / (next.frame - camera.frame) as f32;
            blend_mat4(camera.mat, next.mat, t)
        } else {
            camera.mat
        }
    }
}

/// Blend two affine poses: rotation by quaternion slerp, translation and
/// scale componentwise.
pub fn blend_mat4(a: Mat4, b: Mat4, t: f32) -> Mat4 {
    let (scale_a, rot_a, loc_a) = a.to_scale_rotation_translation();
    let (scale_b, rot_b, loc_b) = b.to_scale_rotation_translation();

    Mat4::from_scale_rotation_translation(
        scale_a.lerp(scale_b, t),
        rot_a.slerp(rot_b, t),
        loc_a.lerp(loc_b, t),
    )
}
