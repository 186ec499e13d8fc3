//! Tracks and the per-track sorted marker store

use std::cell::Cell;

use bitflags::bitflags;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::marker::{Marker, MarkerFlags};

/// Stable identity of a track within one tracking session.
///
/// Snapshots ([`crate::TracksMap`]) and the active/rotation track references
/// hold ids instead of indices, so they survive list reordering and merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

bitflags! {
    /// Track state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TrackFlags: u16 {
        const SELECT = 1 << 0;
        const HIDDEN = 1 << 1;
        const LOCKED = 1 << 2;
        /// Track contributes to 2D stabilization
        const USE_2D_STAB = 1 << 3;
        const DISABLE_RED = 1 << 4;
        const DISABLE_GREEN = 1 << 5;
        const DISABLE_BLUE = 1 << 6;
        const PREVIEW_GRAYSCALE = 1 << 7;
    }
}

bitflags! {
    /// Tracker algorithm switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct AlgorithmFlags: u8 {
        /// Run a brute-force search before refinement
        const USE_BRUTE = 1 << 0;
        /// Normalize patch intensities against lighting changes
        const USE_NORMALIZATION = 1 << 1;
        /// Weight the reference patch by the track's mask layer
        const USE_MASK = 1 << 2;
    }
}

bitflags! {
    /// Which part of a track an operation applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct TrackArea: u8 {
        const POINT = 1 << 0;
        const PAT = 1 << 1;
        const SEARCH = 1 << 2;
        const ALL = Self::POINT.bits() | Self::PAT.bits() | Self::SEARCH.bits();
    }
}

/// Motion model the tracker kernel fits between reference and destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionModel {
    Translation,
    TranslationRotation,
    TranslationScale,
    TranslationRotationScale,
    Affine,
    Homography,
}

/// Which frame the reference patch is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternMatch {
    /// Match against the nearest keyframed marker's frame
    Keyframe,
    /// Match against the previous frame, re-sampling the reference each step
    PreviousFrame,
}

/// Action for [`Track::path_clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearAction {
    /// Clear the path after the reference frame
    Remained,
    /// Clear the path before the reference frame
    UpTo,
    /// Keep only the marker at the reference frame
    All,
}

/// One polygonal stroke of a track's mask layer, points in marker space
/// (offsets from the marker position, frame-unified units).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskStroke {
    pub points: Vec<Vec2>,
}

/// Polygonal mask layer. Tracks use it to weight the reference pattern;
/// feature detection uses a clip-level layer (frame-unified points) to
/// include or exclude regions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskLayer {
    pub strokes: Vec<MaskStroke>,
}

impl MaskLayer {
    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|stroke| stroke.points.is_empty())
    }
}

/// A tracked feature: the time-ordered marker array plus matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Unique within the owning track list
    pub name: String,

    /// Sorted strictly ascending by frame
    markers: Vec<Marker>,
    /// Cursor hint for amortized O(1) lookups on monotone queries
    #[serde(skip)]
    last_marker: Cell<usize>,

    pub flags: TrackFlags,
    /// Selection state of the pattern area
    pub pat_flags: TrackFlags,
    /// Selection state of the search area
    pub search_flags: TrackFlags,

    pub motion_model: MotionModel,
    pub pattern_match: PatternMatch,
    pub algorithm_flags: AlgorithmFlags,
    /// Minimum acceptable correlation between warped reference and result
    pub minimum_correlation: f32,
    /// Distance from frame borders inside which tracking stops, in pixels
    pub margin: i32,
    pub frames_limit: i32,

    /// Offset applied to marker positions when delivered to consumers
    pub offset: Vec2,

    /// Reconstructed 3D position, set by a successful solve
    pub bundle_pos: Option<Vec3>,
    /// Average reprojection error of the bundle
    pub error: f32,

    /// Optional mask layer weighting the pattern
    pub mask: Option<MaskLayer>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            markers: Vec::new(),
            last_marker: Cell::new(0),
            flags: TrackFlags::empty(),
            pat_flags: TrackFlags::empty(),
            search_flags: TrackFlags::empty(),
            motion_model: MotionModel::Translation,
            pattern_match: PatternMatch::Keyframe,
            algorithm_flags: AlgorithmFlags::USE_BRUTE,
            minimum_correlation: 0.75,
            margin: 0,
            frames_limit: 0,
            offset: Vec2::ZERO,
            bundle_pos: None,
            error: 0.0,
            mask: None,
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn has_bundle(&self) -> bool {
        self.bundle_pos.is_some()
    }

    /// A track counts as selected when any of its areas is.
    pub fn is_selected(&self) -> bool {
        (self.flags | self.pat_flags | self.search_flags).contains(TrackFlags::SELECT)
    }

    /// Set `flag` on the given areas of the track.
    pub fn flag_set(&mut self, area: TrackArea, flag: TrackFlags) {
        if area.contains(TrackArea::POINT) {
            self.flags |= flag;
        }
        if area.contains(TrackArea::PAT) {
            self.pat_flags |= flag;
        }
        if area.contains(TrackArea::SEARCH) {
            self.search_flags |= flag;
        }
    }

    /// Clear `flag` from the given areas of the track.
    pub fn flag_clear(&mut self, area: TrackArea, flag: TrackFlags) {
        if area.contains(TrackArea::POINT) {
            self.flags -= flag;
        }
        if area.contains(TrackArea::PAT) {
            self.pat_flags -= flag;
        }
        if area.contains(TrackArea::SEARCH) {
            self.search_flags -= flag;
        }
    }

    fn marker_index_nearest(&self, frame: i32) -> Option<usize> {
        if self.markers.is_empty() {
            return None;
        }

        // approximate pre-first frame queries with the first marker
        if frame < self.markers[0].frame {
            return Some(0);
        }

        let mut a = self.markers.len() - 1;
        let hint = self.last_marker.get();
        if hint < self.markers.len() {
            a = hint;
        }

        if self.markers[a].frame <= frame {
            while a < self.markers.len() && self.markers[a].frame <= frame {
                if self.markers[a].frame == frame {
                    self.last_marker.set(a);
                    return Some(a);
                }
                a += 1;
            }
            Some(a - 1)
        } else {
            while self.markers[a].frame >= frame {
                if self.markers[a].frame == frame {
                    self.last_marker.set(a);
                    return Some(a);
                }
                if a == 0 {
                    break;
                }
                a -= 1;
            }
            Some(a)
        }
    }

    /// Marker at `frame`, or the nearest marker from the left side, or the
    /// first marker when the query precedes the whole range. `None` only for
    /// a track without markers.
    pub fn marker_get(&self, frame: i32) -> Option<&Marker> {
        self.marker_index_nearest(frame).map(|i| &self.markers[i])
    }

    /// Marker exactly at `frame`.
    pub fn marker_get_exact(&self, frame: i32) -> Option<&Marker> {
        self.marker_get(frame).filter(|m| m.frame == frame)
    }

    pub fn marker_get_exact_mut(&mut self, frame: i32) -> Option<&mut Marker> {
        let index = self.marker_index_nearest(frame)?;
        if self.markers[index].frame == frame {
            Some(&mut self.markers[index])
        } else {
            None
        }
    }

    pub fn has_marker_at(&self, frame: i32) -> bool {
        self.marker_get_exact(frame).is_some()
    }

    pub fn has_enabled_marker_at(&self, frame: i32) -> bool {
        self.marker_get_exact(frame).is_some_and(|m| !m.is_disabled())
    }

    /// Insert a marker keeping the array sorted; an existing marker at the
    /// same frame is replaced.
    pub fn marker_insert(&mut self, marker: Marker) -> &Marker {
        match self.markers.binary_search_by_key(&marker.frame, |m| m.frame) {
            Ok(index) => {
                self.markers[index] = marker;
                self.last_marker.set(index);
                &self.markers[index]
            }
            Err(index) => {
                self.markers.insert(index, marker);
                self.last_marker.set(index);
                &self.markers[index]
            }
        }
    }

    /// Ensure a marker exists at `frame`: the nearest marker is duplicated
    /// there when the exact frame has none.
    pub fn marker_ensure(&mut self, frame: i32) -> &Marker {
        let index = match self.marker_index_nearest(frame) {
            Some(index) if self.markers[index].frame == frame => index,
            Some(index) => {
                let marker = self.markers[index].at_frame(frame);
                self.marker_insert(marker);
                self.marker_index_nearest(frame)
                    .expect("marker was just inserted")
            }
            None => panic!("marker_ensure on a track without markers"),
        };
        &self.markers[index]
    }

    pub fn marker_delete(&mut self, frame: i32) {
        if let Ok(index) = self.markers.binary_search_by_key(&frame, |m| m.frame) {
            self.markers.remove(index);
            self.last_marker.set(0);
        }
    }

    /// Place a disabled marker right before or after `reference`.
    ///
    /// When a marker already exists at the target frame, it is only replaced
    /// with `overwrite`.
    pub fn insert_disabled(&mut self, reference: &Marker, before: bool, overwrite: bool) {
        let mut marker = *reference;
        marker.flags.remove(MarkerFlags::TRACKED);
        marker.flags.insert(MarkerFlags::DISABLED);
        marker.frame += if before { -1 } else { 1 };

        if overwrite || !self.has_marker_at(marker.frame) {
            self.marker_insert(marker);
        }
    }

    /// Clear the tracked path around `ref_frame`; the surviving segment is
    /// bracketed with disabled markers.
    pub fn path_clear(&mut self, ref_frame: i32, action: ClearAction) {
        match action {
            ClearAction::Remained => {
                if let Some(pos) = self.markers.iter().skip(1).position(|m| m.frame > ref_frame) {
                    self.markers.truncate(pos + 1);
                }
                if let Some(last) = self.markers.last().copied() {
                    self.insert_disabled(&last, false, true);
                }
            }
            ClearAction::UpTo => {
                let keep_from = self
                    .markers
                    .iter()
                    .rposition(|m| m.frame <= ref_frame);
                if let Some(index) = keep_from {
                    self.markers.drain(..index);
                }
                if let Some(first) = self.markers.first().copied() {
                    self.insert_disabled(&first, true, true);
                }
            }
            ClearAction::All => {
                if let Some(marker) = self.marker_get(ref_frame).copied() {
                    self.markers.clear();
                    self.marker_insert(marker);
                    self.insert_disabled(&marker, true, true);
                    self.insert_disabled(&marker, false, true);
                }
            }
        }
        self.last_marker.set(0);
    }

    /// Position at a possibly fractional frame. Interpolates only between
    /// markers on consecutive integer frames; otherwise the left neighbor is
    /// used as-is. The track offset is applied to the result.
    pub fn subframe_position(&self, frame: f32) -> Option<Vec2> {
        let index = self.marker_index_nearest(frame as i32)?;
        let marker = &self.markers[index];

        let pos = match self.markers.get(index + 1) {
            Some(next) if next.frame == marker.frame + 1 => {
                let fac = (frame - frame.trunc()) / (next.frame - marker.frame) as f32;
                marker.pos.lerp(next.pos, fac)
            }
            _ => marker.pos,
        };

        Some(pos + self.offset)
    }
}

/// Merge the marker arrays of two tracks into one sorted sequence.
///
/// Frames present in only one track keep that marker; where one side is
/// disabled, the enabled side wins; where both are enabled, the overlapping
/// run of consecutive frames is blended with a linear ramp so the joined
/// path has no jump. The ramp is inverted when `dst` had no enabled marker
/// right before the run, so the blend always flows away from the
/// pre-existing path.
pub fn join_markers(dst: &Track, src: &Track) -> Vec<Marker> {
    let src_markers = src.markers();
    let dst_markers = dst.markers();

    let mut joined = Vec::with_capacity(src_markers.len() + dst_markers.len());
    let (mut a, mut b) = (0usize, 0usize);

    while a < src_markers.len() || b < dst_markers.len() {
        if b >= dst_markers.len() {
            joined.push(src_markers[a]);
            a += 1;
        } else if a >= src_markers.len() {
            joined.push(dst_markers[b]);
            b += 1;
        } else if src_markers[a].frame < dst_markers[b].frame {
            joined.push(src_markers[a]);
            a += 1;
        } else if src_markers[a].frame > dst_markers[b].frame {
            joined.push(dst_markers[b]);
            b += 1;
        } else if !src_markers[a].is_disabled() && !dst_markers[b].is_disabled() {
            // Both tracks are enabled on this frame: blend across the whole
            // run where they stay enabled and contiguous.
            let start_frame = src_markers[a].frame;
            let inverse = b == 0
                || dst_markers[b - 1].is_disabled()
                || dst_markers[b - 1].frame != start_frame - 1;

            let (start_a, start_b) = (a, b);
            let mut frame = start_frame;
            let mut len = 0usize;
            while a < src_markers.len() && b < dst_markers.len() {
                if src_markers[a].is_disabled() || dst_markers[b].is_disabled() {
                    break;
                }
                if src_markers[a].frame != frame || dst_markers[b].frame != frame {
                    break;
                }
                frame += 1;
                len += 1;
                a += 1;
                b += 1;
            }

            a = start_a;
            b = start_b;

            for j in 0..len {
                let mut fac = 0.5;
                if len > 1 {
                    fac = j as f32 / (len - 1) as f32;
                }
                if inverse {
                    fac = 1.0 - fac;
                }

                let mut marker = dst_markers[b];
                marker.pos = dst_markers[b].pos.lerp(src_markers[a].pos, fac);
                joined.push(marker);
                a += 1;
                b += 1;
            }
        } else {
            // src disabled (or both): keep dst; dst disabled: take src
            if !src_markers[a].is_disabled() {
                joined.push(src_markers[a]);
            } else {
                joined.push(dst_markers[b]);
            }
            a += 1;
            b += 1;
        }
    }

    joined
}

impl Track {
    /// Replace this track's markers with the result of [`join_markers`]
    /// against `src`.
    pub fn join(&mut self, src: &Track) {
        self.markers = join_markers(self, src);
        self.last_marker.set(0);
    }

    /// Replace the whole marker array. Markers are re-sorted to keep the
    /// strictly-ascending invariant.
    pub fn set_markers(&mut self, mut markers: Vec<Marker>) {
        markers.sort_by_key(|m| m.frame);
        markers.dedup_by_key(|m| m.frame);
        self.markers = markers;
        self.last_marker.set(0);
    }
}

/// Pick a name that does not collide with `taken`, disambiguating with a
/// dotted numeric suffix ("Track", "Track.001", ...).
pub fn unique_name<'a>(taken: impl Iterator<Item = &'a str>, desired: &str, fallback: &str) -> String {
    let desired = if desired.is_empty() { fallback } else { desired };
    let taken: Vec<&str> = taken.collect();

    if !taken.contains(&desired) {
        return desired.to_string();
    }

    // strip an existing ".###" suffix so "Track.001" renames to "Track.002"
    let stem = match desired.rsplit_once('.') {
        Some((stem, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => {
            stem
        }
        _ => desired,
    };

    for counter in 1u32.. {
        let candidate = format!("{stem}.{counter:03}");
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with_frames(frames: &[i32]) -> Track {
        let mut track = Track::new(TrackId(1), "Track");
        for &frame in frames {
            track.marker_insert(Marker::new(frame, Vec2::new(0.5, 0.5)));
        }
        track
    }

    fn assert_sorted(track: &Track) {
        for pair in track.markers().windows(2) {
            assert!(pair[0].frame < pair[1].frame, "markers out of order");
        }
    }

    #[test]
    fn test_marker_get_nearest() {
        let track = track_with_frames(&[5, 10, 20]);

        assert_eq!(track.marker_get(7).unwrap().frame, 5);
        assert_eq!(track.marker_get(10).unwrap().frame, 10);
        assert_eq!(track.marker_get(25).unwrap().frame, 20);
        assert_eq!(track.marker_get(3).unwrap().frame, 5);
    }

    #[test]
    fn test_marker_get_uses_cursor_bidirectionally() {
        let track = track_with_frames(&[1, 2, 3, 4, 5, 10, 20]);

        // walk forward then jump back; cursor must not confuse lookups
        for frame in [1, 2, 3, 10, 20, 4, 1, 20] {
            assert_eq!(track.marker_get(frame).unwrap().frame, frame);
        }
    }

    #[test]
    fn test_marker_insert_replaces_same_frame() {
        let mut track = track_with_frames(&[5, 10]);
        let mut replacement = Marker::new(10, Vec2::new(0.9, 0.9));
        replacement.flags = MarkerFlags::TRACKED;
        track.marker_insert(replacement);

        assert_eq!(track.markers().len(), 2);
        assert_eq!(track.marker_get_exact(10).unwrap().pos, Vec2::new(0.9, 0.9));
        assert_sorted(&track);
    }

    #[test]
    fn test_marker_insert_keeps_sorted() {
        let mut track = Track::new(TrackId(1), "Track");
        for frame in [10, 2, 7, 1, 30, 4] {
            track.marker_insert(Marker::new(frame, Vec2::ZERO));
        }
        assert_sorted(&track);
        assert_eq!(track.markers().len(), 6);
    }

    #[test]
    fn test_marker_ensure() {
        let mut track = track_with_frames(&[5, 10]);
        assert_eq!(track.marker_ensure(10).frame, 10);
        assert_eq!(track.markers().len(), 2);

        let ensured = *track.marker_ensure(7);
        assert_eq!(ensured.frame, 7);
        assert_eq!(ensured.pos, track.marker_get_exact(5).unwrap().pos);
        assert_eq!(track.markers().len(), 3);
        assert_sorted(&track);
    }

    #[test]
    fn test_marker_delete() {
        let mut track = track_with_frames(&[5, 10, 20]);
        track.marker_delete(10);
        assert_eq!(track.markers().len(), 2);
        assert!(!track.has_marker_at(10));

        track.marker_delete(5);
        track.marker_delete(20);
        assert!(track.markers().is_empty());
        assert!(track.marker_get(5).is_none());
    }

    #[test]
    fn test_path_clear_remained() {
        let mut track = track_with_frames(&[1, 2, 3, 4, 5]);
        track.path_clear(3, ClearAction::Remained);

        let frames: Vec<i32> = track.markers().iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![1, 2, 3, 4]);
        assert!(track.marker_get_exact(4).unwrap().is_disabled());
        assert_sorted(&track);
    }

    #[test]
    fn test_path_clear_upto() {
        let mut track = track_with_frames(&[1, 2, 3, 4, 5]);
        track.path_clear(3, ClearAction::UpTo);

        let frames: Vec<i32> = track.markers().iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![2, 3, 4, 5]);
        assert!(track.marker_get_exact(2).unwrap().is_disabled());
    }

    #[test]
    fn test_path_clear_all_brackets_with_disabled() {
        let mut track = track_with_frames(&[1, 2, 3, 4, 5]);
        track.path_clear(3, ClearAction::All);

        let frames: Vec<i32> = track.markers().iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![2, 3, 4]);
        assert!(track.marker_get_exact(2).unwrap().is_disabled());
        assert!(!track.marker_get_exact(3).unwrap().is_disabled());
        assert!(track.marker_get_exact(4).unwrap().is_disabled());
    }

    #[test]
    fn test_subframe_position_interpolates_consecutive() {
        let mut track = Track::new(TrackId(1), "Track");
        track.marker_insert(Marker::new(1, Vec2::new(0.0, 0.0)));
        track.marker_insert(Marker::new(2, Vec2::new(1.0, 1.0)));
        track.marker_insert(Marker::new(5, Vec2::new(0.2, 0.2)));

        let pos = track.subframe_position(1.5).unwrap();
        assert!((pos - Vec2::new(0.5, 0.5)).length() < 1e-6);

        // gap between 2 and 5: no interpolation, left neighbor wins
        let pos = track.subframe_position(2.5).unwrap();
        assert!((pos - Vec2::new(1.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_subframe_position_applies_offset() {
        let mut track = track_with_frames(&[1]);
        track.offset = Vec2::new(0.1, -0.1);
        let pos = track.subframe_position(1.0).unwrap();
        assert!((pos - Vec2::new(0.6, 0.4)).length() < 1e-6);
    }

    #[test]
    fn test_join_blend_segment() {
        // dst enabled on 1..5 at (0,0); src enabled on 3..7 at (1,1)
        let mut dst = Track::new(TrackId(1), "dst");
        for frame in 1..=5 {
            dst.marker_insert(Marker::new(frame, Vec2::ZERO));
        }
        let mut src = Track::new(TrackId(2), "src");
        for frame in 3..=7 {
            src.marker_insert(Marker::new(frame, Vec2::ONE));
        }

        let joined = join_markers(&dst, &src);
        let positions: Vec<(i32, f32)> = joined.iter().map(|m| (m.frame, m.pos.x)).collect();

        assert_eq!(
            positions,
            vec![
                (1, 0.0),
                (2, 0.0),
                (3, 0.0),
                (4, 0.5),
                (5, 1.0),
                (6, 1.0),
                (7, 1.0)
            ]
        );
    }

    #[test]
    fn test_join_blend_inverse_when_dst_breaks_before_segment() {
        let mut dst = Track::new(TrackId(1), "dst");
        for frame in 1..=5 {
            let mut marker = Marker::new(frame, Vec2::ZERO);
            if frame == 2 {
                marker.flags |= MarkerFlags::DISABLED;
            }
            dst.marker_insert(marker);
        }
        let mut src = Track::new(TrackId(2), "src");
        for frame in 3..=7 {
            src.marker_insert(Marker::new(frame, Vec2::ONE));
        }

        let joined = join_markers(&dst, &src);
        let blend: Vec<f32> = joined
            .iter()
            .filter(|m| (3..=5).contains(&m.frame))
            .map(|m| m.pos.x)
            .collect();

        assert_eq!(blend, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_join_prefers_enabled_marker() {
        let mut dst = Track::new(TrackId(1), "dst");
        let mut disabled = Marker::new(3, Vec2::ZERO);
        disabled.flags |= MarkerFlags::DISABLED;
        dst.marker_insert(disabled);

        let mut src = Track::new(TrackId(2), "src");
        src.marker_insert(Marker::new(3, Vec2::ONE));

        let joined = join_markers(&dst, &src);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].pos, Vec2::ONE);

        // both disabled: dst wins
        let mut src_disabled = Marker::new(3, Vec2::ONE);
        src_disabled.flags |= MarkerFlags::DISABLED;
        let mut src2 = Track::new(TrackId(3), "src2");
        src2.marker_insert(src_disabled);

        let joined = join_markers(&dst, &src2);
        assert_eq!(joined[0].pos, Vec2::ZERO);
    }

    #[test]
    fn test_unique_name() {
        let names = ["Track", "Track.001"];
        assert_eq!(
            unique_name(names.iter().copied(), "Track", "Track"),
            "Track.002"
        );
        assert_eq!(
            unique_name(names.iter().copied(), "Feature", "Track"),
            "Feature"
        );
        assert_eq!(unique_name(names.iter().copied(), "", "Track"), "Track.002");
    }
}
