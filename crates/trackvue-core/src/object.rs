//! Tracking session: objects, track lists and their lifecycle

use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::CameraIntrinsics;
use crate::dopesheet::Dopesheet;
use crate::error::{Result, TrackvueError};
use crate::marker::Marker;
use crate::reconstruction::Reconstruction;
use crate::settings::TrackingSettings;
use crate::stabilization::Stabilization;
use crate::track::{unique_name, Track, TrackArea, TrackFlags, TrackId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ObjectFlags: u8 {
        /// The distinguished camera object; its tracks and reconstruction
        /// live on the session itself
        const CAMERA = 1 << 0;
    }
}

/// A rigid body whose motion is reconstructed: either the camera or a
/// tracked object. The camera object shares the session-level track list
/// and reconstruction; other objects own theirs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingObject {
    pub name: String,
    pub flags: ObjectFlags,
    /// Scale of the object's reconstructed motion relative to the camera
    pub scale: f32,
    /// Initialization keyframes for the solver
    pub keyframe1: i32,
    pub keyframe2: i32,

    pub tracks: Vec<Track>,
    pub reconstruction: Reconstruction,
}

impl TrackingObject {
    pub fn is_camera(&self) -> bool {
        self.flags.contains(ObjectFlags::CAMERA)
    }
}

/// The ground-truth container of all tracking data for one clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracking {
    /// Track list of the camera object
    pub tracks: Vec<Track>,
    /// Reconstruction of the camera object
    pub reconstruction: Reconstruction,

    pub objects: Vec<TrackingObject>,
    /// Index of the active object in `objects`
    pub active_object: usize,
    /// Active track, re-resolved by id against the active list
    pub active_track: Option<TrackId>,

    pub camera: CameraIntrinsics,
    pub settings: TrackingSettings,
    pub stabilization: Stabilization,

    #[serde(skip)]
    pub dopesheet: Dopesheet,

    next_track_id: u64,
}

impl Default for Tracking {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracking {
    /// Fresh session with default settings and the camera object.
    pub fn new() -> Self {
        let mut tracking = Self {
            tracks: Vec::new(),
            reconstruction: Reconstruction::default(),
            objects: Vec::new(),
            active_object: 0,
            active_track: None,
            camera: CameraIntrinsics::default(),
            settings: TrackingSettings::default(),
            stabilization: Stabilization::default(),
            dopesheet: Dopesheet::default(),
            next_track_id: 1,
        };

        tracking.object_add("Camera");

        tracking
    }

    /// Hand out a fresh track identity. Every track entering the session
    /// (add, paste, detection) must go through this.
    pub fn allocate_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;
        id
    }

    /* ---------------------------- objects ---------------------------- */

    /// Add a tracking object; the first object is always the camera.
    pub fn object_add(&mut self, name: &str) -> usize {
        let mut object = TrackingObject {
            name: name.to_string(),
            flags: ObjectFlags::empty(),
            scale: 1.0,
            keyframe1: 1,
            keyframe2: 30,
            tracks: Vec::new(),
            reconstruction: Reconstruction::default(),
        };

        if self.objects.is_empty() {
            object.name = "Camera".to_string();
            object.flags |= ObjectFlags::CAMERA;
        }

        object.name = unique_name(
            self.objects.iter().map(|o| o.name.as_str()),
            &object.name,
            "Object",
        );

        self.objects.push(object);
        self.active_object = self.objects.len() - 1;
        self.dopesheet_tag_update();

        self.active_object
    }

    /// Delete a tracking object. The camera object cannot be deleted.
    pub fn object_delete(&mut self, index: usize) -> Result<()> {
        let object = self
            .objects
            .get(index)
            .ok_or_else(|| TrackvueError::ObjectNotFound(index.to_string()))?;

        if object.is_camera() {
            return Err(TrackvueError::CameraObjectDelete);
        }

        if let Some(active) = self.active_track {
            if object.tracks.iter().any(|track| track.id == active) {
                self.active_track = None;
            }
        }

        self.objects.remove(index);
        self.active_object = index.saturating_sub(1);
        self.dopesheet_tag_update();

        Ok(())
    }

    pub fn object_get_named(&self, name: &str) -> Option<(usize, &TrackingObject)> {
        self.objects
            .iter()
            .enumerate()
            .find(|(_, object)| object.name == name)
    }

    pub fn camera_object(&self) -> Option<&TrackingObject> {
        self.objects.iter().find(|object| object.is_camera())
    }

    pub fn object_get_active(&self) -> &TrackingObject {
        &self.objects[self.active_object]
    }

    /* -------------------------- track lists -------------------------- */

    /// Track list of the given object; the camera object maps to the
    /// session-level list.
    pub fn object_tracks(&self, index: usize) -> &[Track] {
        if self.objects[index].is_camera() {
            &self.tracks
        } else {
            &self.objects[index].tracks
        }
    }

    pub fn object_tracks_mut(&mut self, index: usize) -> &mut Vec<Track> {
        if self.objects[index].is_camera() {
            &mut self.tracks
        } else {
            &mut self.objects[index].tracks
        }
    }

    pub fn object_reconstruction(&self, index: usize) -> &Reconstruction {
        if self.objects[index].is_camera() {
            &self.reconstruction
        } else {
            &self.objects[index].reconstruction
        }
    }

    pub fn object_reconstruction_mut(&mut self, index: usize) -> &mut Reconstruction {
        if self.objects[index].is_camera() {
            &mut self.reconstruction
        } else {
            &mut self.objects[index].reconstruction
        }
    }

    pub fn active_tracks(&self) -> &[Track] {
        self.object_tracks(self.active_object)
    }

    pub fn active_tracks_mut(&mut self) -> &mut Vec<Track> {
        self.object_tracks_mut(self.active_object)
    }

    pub fn active_reconstruction(&self) -> &Reconstruction {
        self.object_reconstruction(self.active_object)
    }

    /* ---------------------------- tracks ----------------------------- */

    /// Create a track named "Track" (deduplicated) with one marker at the
    /// given frame-unified position; pattern and search sizes come from the
    /// session defaults scaled by the frame dimensions.
    pub fn track_add(
        &mut self,
        object_index: usize,
        pos: Vec2,
        frame: i32,
        frame_width: u32,
        frame_height: u32,
    ) -> TrackId {
        let settings = &self.settings;

        let half_pattern = settings.default_pattern_size as f32 / 2.0;
        let half_search = settings.default_search_size as f32 / 2.0;
        let pat = Vec2::new(
            half_pattern / frame_width as f32,
            half_pattern / frame_height as f32,
        );
        let search = Vec2::new(
            half_search / frame_width as f32,
            half_search / frame_height as f32,
        );

        let id = self.allocate_track_id();
        let mut track = Track::new(id, "Track");
        track.motion_model = self.settings.default_motion_model;
        track.pattern_match = self.settings.default_pattern_match;
        track.algorithm_flags = self.settings.default_algorithm_flags;
        track.flags = self.settings.default_flags;
        track.minimum_correlation = self.settings.default_minimum_correlation;
        track.margin = self.settings.default_margin;
        track.frames_limit = self.settings.default_frames_limit;

        track.marker_insert(Marker::with_regions(frame, pos, pat, search));

        let tracks = self.object_tracks_mut(object_index);
        track.name = unique_name(
            tracks.iter().map(|t| t.name.as_str()),
            &track.name,
            "Track",
        );
        tracks.push(track);

        self.dopesheet_tag_update();

        id
    }

    pub fn track_get_named<'a>(&'a self, object_index: usize, name: &str) -> Option<&'a Track> {
        self.object_tracks(object_index)
            .iter()
            .find(|track| track.name == name)
    }

    /// Look a track up by id across all objects.
    pub fn track_get(&self, id: TrackId) -> Option<&Track> {
        (0..self.objects.len())
            .flat_map(|index| self.object_tracks(index).iter())
            .find(|track| track.id == id)
    }

    pub fn track_get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        if let Some(track) = self.tracks.iter_mut().find(|t| t.id == id) {
            return Some(track);
        }
        self.objects
            .iter_mut()
            .flat_map(|object| object.tracks.iter_mut())
            .find(|track| track.id == id)
    }

    /// The `index`-th track that has a bundle, counted across all objects
    /// (1-based).
    pub fn track_get_indexed(&self, index: usize) -> Option<&Track> {
        let mut current = 1;
        for object_index in 0..self.objects.len() {
            for track in self.object_tracks(object_index) {
                if track.has_bundle() {
                    if current == index {
                        return Some(track);
                    }
                    current += 1;
                }
            }
        }
        None
    }

    /// Active track, validated to still live in the active list.
    pub fn track_get_active(&self) -> Option<&Track> {
        let id = self.active_track?;
        self.active_tracks().iter().find(|track| track.id == id)
    }

    /// Select the track's areas; without `extend`, deselect every other
    /// visible track in the list first.
    pub fn track_select(&mut self, object_index: usize, id: TrackId, area: TrackArea, extend: bool) {
        let tracks = self.object_tracks_mut(object_index);

        if extend {
            if let Some(track) = tracks.iter_mut().find(|t| t.id == id) {
                track.flag_set(area, TrackFlags::SELECT);
            }
            return;
        }

        for track in tracks.iter_mut() {
            if track.flags.contains(TrackFlags::HIDDEN) {
                continue;
            }
            track.flag_clear(TrackArea::ALL, TrackFlags::SELECT);
            if track.id == id {
                track.flag_set(area, TrackFlags::SELECT);
            }
        }
    }

    pub fn track_deselect(&mut self, object_index: usize, id: TrackId, area: TrackArea) {
        if let Some(track) = self
            .object_tracks_mut(object_index)
            .iter_mut()
            .find(|t| t.id == id)
        {
            track.flag_clear(area, TrackFlags::SELECT);
        }
    }

    /// Merge `src` into `dst` (see [`crate::track::join_markers`]) and drop
    /// `src` from the list.
    pub fn tracks_join(&mut self, object_index: usize, dst: TrackId, src: TrackId) -> Result<()> {
        if dst == src {
            return Err(TrackvueError::TrackNotFound(format!("{src:?}")));
        }

        let tracks = self.object_tracks(object_index);
        let src_pos = tracks
            .iter()
            .position(|t| t.id == src)
            .ok_or_else(|| TrackvueError::TrackNotFound(format!("{src:?}")))?;
        tracks
            .iter()
            .position(|t| t.id == dst)
            .ok_or_else(|| TrackvueError::TrackNotFound(format!("{dst:?}")))?;

        let tracks = self.object_tracks_mut(object_index);
        let src_track = tracks.remove(src_pos);
        let dst_track = tracks
            .iter_mut()
            .find(|t| t.id == dst)
            .expect("destination track was just located");
        dst_track.join(&src_track);

        if self.active_track == Some(src) {
            self.active_track = Some(dst);
        }

        debug!(dst = ?dst, src = ?src, "joined tracks");
        self.dopesheet_tag_update();

        Ok(())
    }

    /* ------------------------- invalidation -------------------------- */

    /// Invalidate everything derived from marker data.
    pub fn tag_update(&mut self) {
        self.dopesheet_tag_update();
        self.stabilization.tag_update();
    }

    /* ------------------------ reconstruction ------------------------- */

    /// Camera pose at `frame` for the given object, interpolated between
    /// solved frames and scaled for non-camera objects.
    pub fn camera_interpolate(&self, object_index: usize, frame: i32) -> Mat4 {
        let mut mat = self.object_reconstruction(object_index).camera_interpolate(frame);

        let object = &self.objects[object_index];
        if !object.is_camera() {
            mat *= Mat4::from_scale(Vec3::splat(1.0 / object.scale));
        }

        mat
    }

    /// Apply a scale to all reconstructed cameras and bundles of every
    /// object, re-anchoring everything on the scaled first camera position.
    pub fn reconstruction_apply_scale(&mut self, scale: Vec3) {
        for index in 0..self.objects.len() {
            let reconstruction = self.object_reconstruction_mut(index);

            let first_camera_delta = reconstruction
                .cameras()
                .first()
                .map(|camera| camera.mat.w_axis.truncate() * scale)
                .unwrap_or(Vec3::ZERO);

            for camera in reconstruction.cameras_mut() {
                let translation = camera.mat.w_axis.truncate() * scale - first_camera_delta;
                camera.mat.w_axis = translation.extend(camera.mat.w_axis.w);
            }

            for track in self.object_tracks_mut(index) {
                if let Some(bundle) = track.bundle_pos.as_mut() {
                    *bundle = *bundle * scale - first_camera_delta;
                }
            }
        }
    }
}
