//! Reconstruction driver: from 2D tracks to cameras and 3D points

use std::sync::atomic::AtomicBool;

use glam::Mat4;
use tracing::{debug, warn};

use trackvue_core::{
    MotionFlags, ObjectFlags, ReconstructedCamera, ReconstructionFlags, RefineFlags, Result,
    TrackId, Tracking, TracksMap, TrackvueError,
};

use crate::solver::{
    IntrinsicsOptions, ProgressFn, ReconstructionOptions, ReconstructionSolver,
    SolvedReconstruction, SolverTracks,
};

/// Tracks that have enabled markers at both initialization keyframes.
fn count_tracks_on_both_keyframes(tracking: &Tracking, object_index: usize) -> usize {
    let object = &tracking.objects[object_index];
    let (frame1, frame2) = (object.keyframe1, object.keyframe2);

    tracking
        .object_tracks(object_index)
        .iter()
        .filter(|track| {
            track.has_enabled_marker_at(frame1) && track.has_enabled_marker_at(frame2)
        })
        .count()
}

/// Early check that a reconstruction can be attempted at all.
///
/// Solving from two fixed keyframes needs at least eight tracks visible at
/// both; automatic keyframe selection and tripod solves need no pre-check.
pub fn reconstruction_check(tracking: &Tracking, object_index: usize) -> Result<()> {
    if tracking.settings.motion_flags.contains(MotionFlags::MODAL) {
        return Ok(());
    }

    if !tracking
        .settings
        .reconstruction_flags
        .contains(trackvue_core::ReconstructionSettingsFlags::KEYFRAME_SELECTION)
    {
        let found = count_tracks_on_both_keyframes(tracking, object_index);
        if found < 8 {
            return Err(TrackvueError::NotEnoughKeyframeTracks { found });
        }
    }

    Ok(())
}

/// Snapshot of everything a solve needs, detached from the live session.
pub struct ReconstructContext {
    object_name: String,
    is_camera: bool,
    modal: bool,
    select_keyframes: bool,
    keyframe1: i32,
    keyframe2: i32,
    refine_flags: RefineFlags,
    success_threshold: f64,
    use_fallback: bool,

    intrinsics: IntrinsicsOptions,
    tracks: SolverTracks,
    /// Solver track index → session track identity
    track_ids: Vec<TrackId>,
    tracks_map: TracksMap<()>,

    sfra: i32,
    efra: i32,

    reprojection_error: f64,
    solved: Option<SolvedReconstruction>,
}

impl ReconstructContext {
    /// Copy the object's tracks and build the normalized correspondence
    /// set. `width`/`height` are the calibration frame size.
    pub fn new(
        tracking: &Tracking,
        object_index: usize,
        keyframe1: i32,
        keyframe2: i32,
        width: u32,
        height: u32,
    ) -> Self {
        let object = &tracking.objects[object_index];
        let camera = &tracking.camera;
        let aspy = camera.aspy() as f64;

        let mut tracks_map = TracksMap::new(&object.name, object.is_camera());
        let mut tracks = SolverTracks::new();
        let mut track_ids = Vec::new();

        let mut sfra = i32::MAX;
        let mut efra = i32::MIN;

        for (index, track) in tracking.object_tracks(object_index).iter().enumerate() {
            let markers = track.markers();

            let first = markers.iter().position(|marker| !marker.is_disabled());
            let last = markers.iter().rposition(|marker| !marker.is_disabled());

            if let Some(first) = first {
                if first + 1 < markers.len() {
                    sfra = sfra.min(markers[first].frame);
                }
            }
            if let Some(last) = last {
                efra = efra.max(markers[last].frame);
            }

            for marker in markers {
                if !marker.is_disabled() {
                    tracks.insert(
                        marker.frame,
                        index,
                        ((marker.pos.x + track.offset.x) * width as f32) as f64,
                        ((marker.pos.y + track.offset.y) * height as f32) as f64 * aspy,
                    );
                }
            }

            track_ids.push(track.id);
            tracks_map.insert(track, ());
        }

        let refine_flags = if object.flags.contains(ObjectFlags::CAMERA) {
            tracking.settings.refine_intrinsics
        } else {
            RefineFlags::empty()
        };

        Self {
            object_name: object.name.clone(),
            is_camera: object.is_camera(),
            modal: tracking.settings.motion_flags.contains(MotionFlags::MODAL),
            select_keyframes: tracking
                .settings
                .reconstruction_flags
                .contains(trackvue_core::ReconstructionSettingsFlags::KEYFRAME_SELECTION),
            keyframe1,
            keyframe2,
            refine_flags,
            success_threshold: tracking.settings.reconstruction_success_threshold as f64,
            use_fallback: tracking
                .settings
                .reconstruction_flags
                .contains(trackvue_core::ReconstructionSettingsFlags::FALLBACK_RECONSTRUCTION),
            intrinsics: IntrinsicsOptions {
                focal_length: camera.focal as f64,
                principal_x: camera.principal.x as f64,
                principal_y: camera.principal.y as f64 * aspy,
                k1: camera.k1 as f64,
                k2: camera.k2 as f64,
                k3: camera.k3 as f64,
                image_width: width as f64,
                image_height: height as f64 * aspy,
            },
            tracks,
            track_ids,
            tracks_map,
            sfra,
            efra,
            reprojection_error: 0.0,
            solved: None,
        }
    }

    pub fn frame_range(&self) -> (i32, i32) {
        (self.sfra, self.efra)
    }

    /// Run the solver. Blocks for the whole solve; `stop` is advisory and
    /// only the solver may honor it.
    pub fn solve(
        &mut self,
        solver: &dyn ReconstructionSolver,
        stop: &AtomicBool,
        progress: &mut ProgressFn<'_>,
    ) -> Result<()> {
        let mut options = ReconstructionOptions {
            select_keyframes: self.select_keyframes,
            keyframe1: self.keyframe1,
            keyframe2: self.keyframe2,
            refine_intrinsics: self.refine_flags,
            success_threshold: self.success_threshold,
            use_fallback_reconstruction: self.use_fallback,
        };

        let solved = if self.modal {
            solver.solve_modal(&self.tracks, &self.intrinsics, &mut options, progress, stop)?
        } else {
            solver.solve(&self.tracks, &self.intrinsics, &mut options, progress, stop)?
        };

        if self.select_keyframes {
            // remember the keyframes the solver actually used
            self.keyframe1 = options.keyframe1;
            self.keyframe2 = options.keyframe2;
        }

        self.reprojection_error = solved.reprojection_error();
        self.solved = Some(solved);

        Ok(())
    }

    /// Copy the solve results back into the live session.
    ///
    /// The first retrieved camera pose becomes the world origin: its
    /// inverse is folded into every camera and every bundle, so object
    /// tracks share a consistent frame with the camera track. Per-track
    /// and per-frame gaps are non-fatal degradations; an unsolved context
    /// returns false and leaves the previous reconstruction intact.
    pub fn finish(&self, tracking: &mut Tracking) -> bool {
        self.tracks_map.merge(tracking);
        tracking.dopesheet_tag_update();

        let Some(solved) = self.solved.as_ref() else {
            return false;
        };

        let Some((object_index, _)) = tracking.object_get_named(&self.object_name) else {
            return false;
        };

        if self.select_keyframes {
            let object = &mut tracking.objects[object_index];
            object.keyframe1 = self.keyframe1;
            object.keyframe2 = self.keyframe2;
        }

        // refined intrinsics, undoing the aspect factor on principal y
        let aspy = tracking.camera.aspy() as f64;
        tracking.camera.focal = solved.intrinsics.focal_length as f32;
        tracking.camera.principal.x = solved.intrinsics.principal_x as f32;
        tracking.camera.principal.y = (solved.intrinsics.principal_y / aspy) as f32;
        tracking.camera.k1 = solved.intrinsics.k1 as f32;
        tracking.camera.k2 = solved.intrinsics.k2 as f32;
        tracking.camera.k3 = solved.intrinsics.k3 as f32;

        let mut ok = true;

        // per-frame cameras, re-origined to the first solved frame
        let mut cameras = Vec::new();
        let mut origin_inverse: Option<Mat4> = None;

        for frame in self.sfra..=self.efra {
            let Some(pose) = solved.camera_for_frame(frame) else {
                warn!(frame, "no camera for frame");
                ok = false;
                continue;
            };

            let mut mat = pose.as_mat4();
            match origin_inverse {
                None => {
                    origin_inverse = Some(mat.inverse());
                    mat = Mat4::IDENTITY;
                }
                Some(inverse) => {
                    mat = inverse * mat;
                }
            }

            cameras.push(ReconstructedCamera {
                frame,
                mat,
                error: solved.error_for_frame(frame) as f32,
            });
        }

        // per-track bundles, in the same re-origined space
        for (index, id) in self.track_ids.iter().enumerate() {
            let Some(track) = tracking.track_get_mut(*id) else {
                continue;
            };

            match solved.point_for_track(index) {
                Some(position) => {
                    let mut position = position.as_vec3();
                    if let Some(inverse) = origin_inverse {
                        position = inverse.transform_point3(position);
                    }
                    track.bundle_pos = Some(position);
                    track.error = solved.error_for_track(index) as f32;
                }
                None => {
                    track.bundle_pos = None;
                    warn!(track = %track.name, "no bundle for track");
                    ok = false;
                }
            }
        }

        let reconstruction = tracking.object_reconstruction_mut(object_index);
        reconstruction.set_cameras(cameras);
        reconstruction.error = self.reprojection_error as f32;
        reconstruction.flags |= ReconstructionFlags::RECONSTRUCTED;

        debug!(
            object = %self.object_name,
            error = self.reprojection_error,
            "reconstruction finished"
        );

        ok
    }
}
