//! Radial lens distortion kernel
//!
//! Polynomial radial model with coefficients k1..k3 around the principal
//! point. The kernel caches the intrinsics it was last updated with; any
//! intrinsics change requires an [`DistortionKernel::update`] before the
//! next warp.

use glam::{DVec2, IVec2, Vec2};
use rayon::prelude::*;

use trackvue_core::CameraIntrinsics;

use crate::buffer::ImageBuf;

/// Perimeter sampling step of
/// [`max_undistortion_delta_across_bound`], in pixels
const BOUND_COORD_DELTA: i32 = 5;

#[derive(Debug, Clone)]
pub struct DistortionKernel {
    focal: f64,
    principal: DVec2,
    k1: f64,
    k2: f64,
    k3: f64,
    /// Calibration image size the intrinsics refer to
    image_width: f64,
    image_height: f64,
    threads: usize,
}

impl Default for DistortionKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl DistortionKernel {
    /// Identity kernel: unit focal, no distortion.
    pub fn new() -> Self {
        Self {
            focal: 1.0,
            principal: DVec2::ZERO,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            image_width: 1.0,
            image_height: 1.0,
            threads: 1,
        }
    }

    pub fn from_camera(
        camera: &CameraIntrinsics,
        calibration_width: u32,
        calibration_height: u32,
    ) -> Self {
        let mut kernel = Self::new();
        kernel.update(camera, calibration_width, calibration_height);
        kernel
    }

    /// Refresh the cached intrinsics. The pixel aspect folds into the
    /// y axis: principal y and the calibration height are pre-scaled by
    /// `1 / pixel_aspect`.
    pub fn update(
        &mut self,
        camera: &CameraIntrinsics,
        calibration_width: u32,
        calibration_height: u32,
    ) {
        let aspy = camera.aspy() as f64;

        self.focal = camera.focal as f64;
        self.principal = DVec2::new(
            camera.principal.x as f64,
            camera.principal.y as f64 * aspy,
        );
        self.k1 = camera.k1 as f64;
        self.k2 = camera.k2 as f64;
        self.k3 = camera.k3 as f64;
        self.image_width = calibration_width as f64;
        self.image_height = calibration_height as f64 * aspy;
    }

    /// Worker threads used by the buffer warps. Only safe to change while
    /// no warp is running.
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    /// Forward radial model on normalized camera coordinates.
    fn apply_radial(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let coeff = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        (x * coeff, y * coeff)
    }

    /// Map undistorted image coordinates to distorted image coordinates.
    pub fn distort_image_point(&self, x: f64, y: f64) -> (f64, f64) {
        let nx = (x - self.principal.x) / self.focal;
        let ny = (y - self.principal.y) / self.focal;
        let (dx, dy) = self.apply_radial(nx, ny);
        (
            dx * self.focal + self.principal.x,
            dy * self.focal + self.principal.y,
        )
    }

    /// Map distorted image coordinates to undistorted image coordinates;
    /// the radial model is inverted numerically by fixed-point iteration.
    pub fn undistort_image_point(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = (x - self.principal.x) / self.focal;
        let dy = (y - self.principal.y) / self.focal;

        let mut ux = dx;
        let mut uy = dy;
        for _ in 0..20 {
            let r2 = ux * ux + uy * uy;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let coeff = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            ux = dx / coeff;
            uy = dy / coeff;
        }

        (
            ux * self.focal + self.principal.x,
            uy * self.focal + self.principal.y,
        )
    }

    fn warp_buffer(
        &self,
        ibuf: &ImageBuf,
        overscan: f32,
        map: impl Fn(f64, f64) -> (f64, f64) + Sync,
    ) -> ImageBuf {
        let width = ibuf.width();
        let height = ibuf.height();
        let overscan = overscan as f64;

        // the visible part of the output covers the calibrated image; with
        // overscan the canvas extends past it on every side
        let w = width as f64 / (1.0 + overscan);
        let h = height as f64 / (1.0 + overscan);
        let aspx = w / self.image_width;
        let aspy = h / self.image_height;

        let compute_row = |y: u32| -> Vec<[f32; 4]> {
            (0..width)
                .map(|x| {
                    let src_x = (x as f64 - 0.5 * overscan * w) / aspx;
                    let src_y = (y as f64 - 0.5 * overscan * h) / aspy;

                    let (warp_x, warp_y) = map(src_x, src_y);

                    let sample_x = warp_x * aspx + 0.5 * overscan * w;
                    let sample_y = warp_y * aspy + 0.5 * overscan * h;

                    ibuf.sample_bilinear(sample_x as f32, sample_y as f32)
                })
                .collect()
        };

        let rows: Vec<Vec<[f32; 4]>> = if self.threads > 1 && height > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .expect("failed to build distortion thread pool");
            pool.install(|| (0..height).into_par_iter().map(compute_row).collect())
        } else {
            (0..height).map(compute_row).collect()
        };

        let mut result = if ibuf.is_float() {
            ImageBuf::new_float(width, height)
        } else {
            ImageBuf::new_byte(width, height)
        };

        for (y, row) in rows.iter().enumerate() {
            for (x, rgba) in row.iter().enumerate() {
                result.set_pixel(x as u32, y as u32, *rgba);
            }
        }

        result
    }

    /// Undistort a whole frame: every output pixel samples the distorted
    /// source at its forward-distorted position.
    pub fn undistort_buffer(&self, ibuf: &ImageBuf, overscan: f32) -> ImageBuf {
        self.warp_buffer(ibuf, overscan, |x, y| self.distort_image_point(x, y))
    }

    /// Distort a whole frame (inverse of [`Self::undistort_buffer`]).
    pub fn distort_buffer(&self, ibuf: &ImageBuf, overscan: f32) -> ImageBuf {
        self.warp_buffer(ibuf, overscan, |x, y| self.undistort_image_point(x, y))
    }
}

/// Forward-distort a single point given in image space with the camera's
/// own aspect convention (the principal y is pre-scaled by `aspy`).
pub fn distort_v2(camera: &CameraIntrinsics, co: Vec2) -> Vec2 {
    let kernel = DistortionKernel::from_camera(camera, 0, 0);
    let aspy = camera.aspy() as f64;

    // normalize against the aspect-corrected principal point
    let x = (co.x as f64 - camera.principal.x as f64) / camera.focal as f64;
    let y = (co.y as f64 - camera.principal.y as f64 * aspy) / camera.focal as f64;

    let (dx, dy) = kernel.apply_radial(x, y);
    Vec2::new(
        (dx * camera.focal as f64 + camera.principal.x as f64) as f32,
        (dy * camera.focal as f64 + camera.principal.y as f64 * aspy) as f32,
    )
}

/// Invert the radial model for a single image-space point.
pub fn undistort_v2(camera: &CameraIntrinsics, co: Vec2) -> Vec2 {
    let kernel = DistortionKernel::from_camera(camera, 0, 0);
    let (x, y) = kernel.undistort_image_point(co.x as f64, co.y as f64);
    Vec2::new(x as f32, y as f32)
}

/// Undistort a frame using the camera intrinsics at the given calibration
/// size.
pub fn undistort_frame(
    camera: &CameraIntrinsics,
    ibuf: &ImageBuf,
    calibration_width: u32,
    calibration_height: u32,
    overscan: f32,
) -> ImageBuf {
    DistortionKernel::from_camera(camera, calibration_width, calibration_height)
        .undistort_buffer(ibuf, overscan)
}

/// Distort a frame using the camera intrinsics at the given calibration
/// size.
pub fn distort_frame(
    camera: &CameraIntrinsics,
    ibuf: &ImageBuf,
    calibration_width: u32,
    calibration_height: u32,
    overscan: f32,
) -> ImageBuf {
    DistortionKernel::from_camera(camera, calibration_width, calibration_height)
        .distort_buffer(ibuf, overscan)
}

/// Largest componentwise displacement undistortion causes anywhere on the
/// boundary of `rect`, sampled every few pixels plus the exact corners.
pub fn max_undistortion_delta_across_bound(
    camera: &CameraIntrinsics,
    rect_min: IVec2,
    rect_max: IVec2,
) -> Vec2 {
    let mut delta = Vec2::splat(f32::MIN);

    let mut check = |x: i32, y: i32| {
        let pos = Vec2::new(x as f32, y as f32);
        let warped = undistort_v2(camera, pos);
        delta.x = delta.x.max((pos.x - warped.x).abs());
        delta.y = delta.y.max((pos.y - warped.y).abs());
    };

    let mut x = rect_min.x;
    loop {
        let clamped = x.min(rect_max.x);
        check(clamped, rect_min.y);
        check(clamped, rect_max.y);
        if clamped >= rect_max.x {
            break;
        }
        x += BOUND_COORD_DELTA;
    }

    let mut y = rect_min.y;
    loop {
        let clamped = y.min(rect_max.y);
        check(rect_min.x, clamped);
        check(rect_max.x, clamped);
        if clamped >= rect_max.y {
            break;
        }
        y += BOUND_COORD_DELTA;
    }

    delta
}
