//! Pluggable bundle-adjustment solver interface

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;

use glam::{DMat4, DVec3};

use trackvue_core::{RefineFlags, Result};

/// One 2D observation handed to the solver: pixel position of a track on a
/// frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverMarker {
    pub frame: i32,
    pub track: usize,
    pub x: f64,
    pub y: f64,
}

/// The full correspondence set of a solve.
#[derive(Debug, Clone, Default)]
pub struct SolverTracks {
    markers: Vec<SolverMarker>,
}

impl SolverTracks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: i32, track: usize, x: f64, y: f64) {
        self.markers.push(SolverMarker { frame, track, x, y });
    }

    pub fn markers(&self) -> &[SolverMarker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Camera intrinsics as the solver consumes them (aspect pre-applied).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntrinsicsOptions {
    pub focal_length: f64,
    pub principal_x: f64,
    pub principal_y: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub image_width: f64,
    pub image_height: f64,
}

/// Solve configuration.
#[derive(Debug, Clone)]
pub struct ReconstructionOptions {
    /// Let the solver choose the initialization keyframes; the chosen pair
    /// is written back here
    pub select_keyframes: bool,
    pub keyframe1: i32,
    pub keyframe2: i32,
    pub refine_intrinsics: RefineFlags,
    pub success_threshold: f64,
    pub use_fallback_reconstruction: bool,
}

/// Everything a finished solve exposes back to the driver.
#[derive(Debug, Clone, Default)]
pub struct SolvedReconstruction {
    /// Refined intrinsics, if the solver adjusted them
    pub intrinsics: IntrinsicsOptions,
    /// Per-frame camera pose and reprojection error
    cameras: BTreeMap<i32, (DMat4, f64)>,
    /// Per-track 3D point and reprojection error
    points: HashMap<usize, (DVec3, f64)>,
    /// Total reprojection error
    pub error: f64,
}

impl SolvedReconstruction {
    pub fn new(intrinsics: IntrinsicsOptions, error: f64) -> Self {
        Self {
            intrinsics,
            error,
            ..Default::default()
        }
    }

    pub fn insert_camera(&mut self, frame: i32, mat: DMat4, error: f64) {
        self.cameras.insert(frame, (mat, error));
    }

    pub fn insert_point(&mut self, track: usize, position: DVec3, error: f64) {
        self.points.insert(track, (position, error));
    }

    pub fn camera_for_frame(&self, frame: i32) -> Option<DMat4> {
        self.cameras.get(&frame).map(|(mat, _)| *mat)
    }

    pub fn error_for_frame(&self, frame: i32) -> f64 {
        self.cameras.get(&frame).map(|(_, error)| *error).unwrap_or(0.0)
    }

    pub fn point_for_track(&self, track: usize) -> Option<DVec3> {
        self.points.get(&track).map(|(position, _)| *position)
    }

    pub fn error_for_track(&self, track: usize) -> f64 {
        self.points.get(&track).map(|(_, error)| *error).unwrap_or(0.0)
    }

    pub fn reprojection_error(&self) -> f64 {
        self.error
    }
}

/// Progress reporting callback: fraction done plus a status message.
pub type ProgressFn<'a> = dyn FnMut(f64, &str) + 'a;

/// The bundle adjuster. Solving blocks; the stop flag is advisory and only
/// the solver may honor it.
pub trait ReconstructionSolver {
    /// Full camera (or object) motion solve.
    fn solve(
        &self,
        tracks: &SolverTracks,
        intrinsics: &IntrinsicsOptions,
        options: &mut ReconstructionOptions,
        progress: &mut ProgressFn<'_>,
        stop: &AtomicBool,
    ) -> Result<SolvedReconstruction>;

    /// Rotation-only solve for tripod shots.
    fn solve_modal(
        &self,
        tracks: &SolverTracks,
        intrinsics: &IntrinsicsOptions,
        options: &mut ReconstructionOptions,
        progress: &mut ProgressFn<'_>,
        stop: &AtomicBool,
    ) -> Result<SolvedReconstruction>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_tracks_accumulate() {
        let mut tracks = SolverTracks::new();
        tracks.insert(1, 0, 10.0, 20.0);
        tracks.insert(2, 0, 11.0, 21.0);
        tracks.insert(1, 1, 50.0, 60.0);

        assert_eq!(tracks.markers().len(), 3);
        assert_eq!(tracks.markers()[2].track, 1);
    }

    #[test]
    fn test_solved_reconstruction_lookups() {
        let mut solved = SolvedReconstruction::default();
        solved.insert_camera(5, DMat4::IDENTITY, 0.4);
        solved.insert_point(2, DVec3::new(1.0, 2.0, 3.0), 0.2);

        assert!(solved.camera_for_frame(5).is_some());
        assert!(solved.camera_for_frame(6).is_none());
        assert!((solved.error_for_frame(5) - 0.4).abs() < 1e-12);
        assert_eq!(solved.point_for_track(2).unwrap().x, 1.0);
        assert!(solved.point_for_track(0).is_none());
    }
}
