//! The per-frame 2D tracking pipeline

use glam::DVec2;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, warn};

use trackvue_core::{
    coordinate, Marker, MarkerFlags, Track, TrackFlags, Tracking, TracksMap,
};
use trackvue_image::{sampler, ImageBuf};

use crate::frames::FrameSource;
use crate::kernel::{Patch, TrackRegionOptions, TrackerKernel};

/// Per-track scratch state: the reference marker and its search patch.
#[derive(Debug, Default)]
pub struct TrackContext {
    reference_marker: Option<Marker>,
    /// Grayscale search window of the reference frame
    search_area: Option<(Vec<f32>, u32, u32)>,
    /// Rasterized mask weighting the reference pattern
    mask: Option<Vec<f32>>,
}

/// One tracking run over the selected tracks of the active object.
///
/// The context snapshots everything it needs up front, so the user can keep
/// editing the clip while [`TrackingContext::step`] runs; results flow back
/// through [`TrackingContext::sync`].
pub struct TrackingContext {
    backwards: bool,
    first_time: bool,
    /// Frame cursor in scene space
    user_frame: i32,
    /// Frame the UI should display after a sync
    sync_frame: i32,
    frames_tracked: u32,
    tracks_map: TracksMap<TrackContext>,
}

impl TrackingContext {
    /// Snapshot the selected, unlocked, visible tracks that have an enabled
    /// marker at the cursor frame.
    pub fn new(
        tracking: &Tracking,
        source: &dyn FrameSource,
        frame: i32,
        backwards: bool,
    ) -> Self {
        let object = tracking.object_get_active();
        let mut tracks_map = TracksMap::new(&object.name, object.is_camera());

        let clip_frame = source.scene_to_clip(frame);
        for track in tracking.active_tracks() {
            if !track.is_selected()
                || track
                    .flags
                    .intersects(TrackFlags::LOCKED | TrackFlags::HIDDEN)
            {
                continue;
            }

            let enabled = track
                .marker_get(clip_frame)
                .is_some_and(|marker| !marker.is_disabled());
            if enabled {
                tracks_map.insert(track, TrackContext::default());
            }
        }

        debug!(
            tracks = tracks_map.len(),
            frame, backwards, "tracking context created"
        );

        Self {
            backwards,
            first_time: true,
            user_frame: frame,
            sync_frame: frame,
            frames_tracked: 0,
            tracks_map,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks_map.is_empty()
    }

    pub fn frames_tracked(&self) -> u32 {
        self.frames_tracked
    }

    /// Track every snapshot track one frame further. Returns false when
    /// nothing was tracked (no tracks, or the destination frame failed to
    /// load).
    pub fn step(&mut self, source: &dyn FrameSource, kernel: &dyn TrackerKernel) -> bool {
        if self.tracks_map.is_empty() {
            return false;
        }

        let frame_delta = if self.backwards { -1 } else { 1 };
        let curfra = source.scene_to_clip(self.user_frame);

        self.user_frame += frame_delta;

        let Some(destination_ibuf) = source.frame(curfra + frame_delta) else {
            warn!(frame = curfra + frame_delta, "destination frame failed to load");
            return false;
        };

        let frame_width = destination_ibuf.width();
        let frame_height = destination_ibuf.height();

        let backwards = self.backwards;
        let first_time = self.first_time;

        // marker insertion mutates a track's marker array; one critical
        // section per step serializes those writes
        let insert_lock = Mutex::new(());

        let tracked_any: Vec<bool> = self
            .tracks_map
            .entries_mut()
            .par_iter_mut()
            .map(|(track, track_context)| {
                let Some(marker) = track.marker_get_exact(curfra).copied() else {
                    return false;
                };
                if marker.is_disabled() {
                    return false;
                }

                // markers too close to the frame border are not tracked
                if !check_marker_margin(track, &marker, frame_width, frame_height) {
                    return false;
                }

                let need_readjust = match track.pattern_match {
                    trackvue_core::PatternMatch::Keyframe => first_time,
                    trackvue_core::PatternMatch::PreviousFrame => true,
                };

                if need_readjust
                    && !update_reference(
                        track,
                        track_context,
                        source,
                        &marker,
                        curfra,
                        backwards,
                        frame_width,
                        frame_height,
                    )
                {
                    // reference frame failed to load
                    return false;
                }

                let mut dst_points = [DVec2::ZERO; 5];
                let tracked = run_tracker(
                    &destination_ibuf,
                    track,
                    track_context,
                    &marker,
                    kernel,
                    &mut dst_points,
                );

                {
                    let _guard = insert_lock.lock();
                    insert_new_marker(
                        track,
                        &marker,
                        curfra,
                        backwards,
                        first_time,
                        tracked,
                        frame_width,
                        frame_height,
                        &dst_points,
                    );
                }

                true
            })
            .collect();

        self.first_time = false;
        self.frames_tracked += 1;

        tracked_any.into_iter().any(|tracked| tracked)
    }

    /// Merge the snapshot back into the live session and move the
    /// synchronized frame cursor one frame behind the working cursor, so
    /// the UI follows the tracked frames.
    pub fn sync(&mut self, tracking: &mut Tracking) {
        self.tracks_map.merge(tracking);

        self.sync_frame = if self.backwards {
            self.user_frame + 1
        } else {
            self.user_frame - 1
        };

        tracking.dopesheet_tag_update();
    }

    /// Frame the clip cursor should show after the last [`Self::sync`].
    pub fn sync_frame(&self) -> i32 {
        self.sync_frame
    }
}

/// Margin between the marker and the frame border below which tracking is
/// skipped: half the larger pattern dimension, or the track's margin
/// setting if that is larger.
fn check_marker_margin(
    track: &Track,
    marker: &Marker,
    frame_width: u32,
    frame_height: u32,
) -> bool {
    let (pat_min, pat_max) = marker.pattern_bounds();
    let dim = pat_max - pat_min;
    let half_dim = dim.x.max(dim.y) / 2.0;

    let margin_x = half_dim.max(track.margin as f32 / frame_width as f32);
    let margin_y = half_dim.max(track.margin as f32 / frame_height as f32);

    marker.pos.x >= margin_x
        && marker.pos.x <= 1.0 - margin_x
        && marker.pos.y >= margin_y
        && marker.pos.y <= 1.0 - margin_y
}

/// Which marker a track matches against, and from which frame.
fn reference_marker(track: &Track, curfra: i32, backwards: bool) -> Option<Marker> {
    match track.pattern_match {
        trackvue_core::PatternMatch::Keyframe => keyframed_marker(track, curfra, backwards),
        trackvue_core::PatternMatch::PreviousFrame => track.marker_get(curfra).copied(),
    }
}

/// Nearest keyframed marker, walking from the current frame against the
/// tracking direction. Falls back to the first marker of the current
/// tracked segment when no user-placed marker exists.
fn keyframed_marker(track: &Track, curfra: i32, backwards: bool) -> Option<Marker> {
    let markers = track.markers();
    let start = track.marker_get(curfra)?;
    let mut index = markers
        .binary_search_by_key(&start.frame, |m| m.frame)
        .ok()? as i64;

    let mut fallback: Option<usize> = None;

    while index >= 0 && (index as usize) < markers.len() {
        let next = if backwards { index + 1 } else { index - 1 };
        let current = &markers[index as usize];
        let next_marker = (next >= 0 && (next as usize) < markers.len())
            .then(|| &markers[next as usize]);

        let mut is_keyframed = false;
        if !current.is_disabled() {
            // remember the boundary of the current tracked segment in case
            // no real keyframe exists
            if next_marker.is_some_and(|marker| marker.is_disabled()) && fallback.is_none() {
                fallback = Some(index as usize);
            }

            is_keyframed |= !current.flags.contains(MarkerFlags::TRACKED);
        }

        if is_keyframed {
            return Some(*current);
        }

        index = next;
    }

    fallback.map(|index| markers[index])
}

/// Reload the reference patch for a track, and the mask weighting it, cut
/// for the current marker. False when the reference frame image is
/// unavailable.
#[allow(clippy::too_many_arguments)]
fn update_reference(
    track: &Track,
    track_context: &mut TrackContext,
    source: &dyn FrameSource,
    marker: &Marker,
    curfra: i32,
    backwards: bool,
    frame_width: u32,
    frame_height: u32,
) -> bool {
    let Some(reference) = reference_marker(track, curfra, backwards) else {
        return false;
    };
    let Some(reference_ibuf) = source.frame(reference.frame) else {
        return false;
    };

    track_context.search_area = sampler::search_grayscale(&reference_ibuf, track, &reference);
    track_context.reference_marker = Some(reference);
    track_context.mask = sampler::tracker_mask(frame_width, frame_height, track, marker);

    track_context.search_area.is_some()
}

/// Sample the destination search area and run the tracker kernel. True on
/// success, with the warped points in `dst_points`.
fn run_tracker(
    destination_ibuf: &ImageBuf,
    track: &Track,
    track_context: &TrackContext,
    marker: &Marker,
    kernel: &dyn TrackerKernel,
    dst_points: &mut [DVec2; 5],
) -> bool {
    let Some(reference) = track_context.reference_marker.as_ref() else {
        return false;
    };
    let Some((reference_pixels, ref_width, ref_height)) = track_context.search_area.as_ref()
    else {
        return false;
    };

    // track into the same search dimension the current marker has; all
    // markers of a tracked segment share the search size, which is close
    // enough to what is needed
    let Some((destination_pixels, dst_width, dst_height)) =
        sampler::search_grayscale(destination_ibuf, track, marker)
    else {
        return false;
    };

    let frame_width = destination_ibuf.width();
    let frame_height = destination_ibuf.height();

    let src = coordinate::marker_coords_for_tracking(frame_width, frame_height, reference);
    let dst = coordinate::marker_coords_for_tracking(frame_width, frame_height, marker);

    let src_x = [src[0].x, src[1].x, src[2].x, src[3].x, src[4].x];
    let src_y = [src[0].y, src[1].y, src[2].y, src[3].y, src[4].y];
    let mut dst_x = [dst[0].x, dst[1].x, dst[2].x, dst[3].x, dst[4].x];
    let mut dst_y = [dst[0].y, dst[1].y, dst[2].y, dst[3].y, dst[4].y];

    let options = TrackRegionOptions::from_track(track);

    let result = kernel.track_region(
        &options,
        Patch::new(reference_pixels, *ref_width, *ref_height),
        Patch::new(&destination_pixels, dst_width, dst_height),
        track_context.mask.as_deref(),
        &src_x,
        &src_y,
        &mut dst_x,
        &mut dst_y,
    );

    if result.is_none() {
        return false;
    }

    for i in 0..5 {
        dst_points[i] = DVec2::new(dst_x[i], dst_y[i]);
    }
    true
}

/// Scale the search area of the new marker by the change of the pattern
/// bbox extent between the two markers.
fn scale_marker_search(old_marker: &Marker, new_marker: &mut Marker) {
    let (old_min, old_max) = old_marker.pattern_bounds();
    let (new_min, new_max) = new_marker.pattern_bounds();

    let scale_x = (new_max.x - new_min.x) / (old_max.x - old_min.x);
    let scale_y = (new_max.y - new_min.y) / (old_max.y - old_min.y);

    new_marker.search_min.x *= scale_x;
    new_marker.search_min.y *= scale_y;
    new_marker.search_max.x *= scale_x;
    new_marker.search_max.y *= scale_y;
}

/// Insert the marker a tracking step produced, keeping every tracked
/// segment bracketed by disabled markers.
#[allow(clippy::too_many_arguments)]
fn insert_new_marker(
    track: &mut Track,
    old_marker: &Marker,
    curfra: i32,
    backwards: bool,
    first_time: bool,
    tracked: bool,
    frame_width: u32,
    frame_height: u32,
    dst_points: &[DVec2; 5],
) {
    let frame_delta = if backwards { -1 } else { 1 };
    let nextfra = curfra + frame_delta;

    let mut new_marker = *old_marker;

    if tracked {
        coordinate::set_marker_coords_from_tracking(
            frame_width,
            frame_height,
            &mut new_marker,
            dst_points,
        );
        new_marker.flags |= MarkerFlags::TRACKED;
        new_marker.frame = nextfra;

        scale_marker_search(old_marker, &mut new_marker);

        if first_time {
            // open the currently tracked segment with a disabled marker
            // unless a marker already sits there
            track.insert_disabled(old_marker, !backwards, false);
        }

        track.marker_insert(new_marker);

        // the tracked segment always ends in a disabled marker
        track.insert_disabled(&new_marker, backwards, false);
    } else {
        new_marker.frame = nextfra;
        new_marker.flags |= MarkerFlags::DISABLED;

        track.marker_insert(new_marker);
    }
}

/// Re-track a single marker from its reference frame and overwrite it in
/// place. Refuses to refine a marker against itself (e.g. a keyframed
/// marker whose reference resolves to its own frame).
pub fn refine_marker(
    track: &mut Track,
    frame: i32,
    backwards: bool,
    source: &dyn FrameSource,
    kernel: &dyn TrackerKernel,
) -> bool {
    let (frame_width, frame_height) = source.size();

    // normal tracking references the current frame for keyframed markers;
    // for refining we want the adjacent frame instead, so the reference
    // walk starts one frame over
    let reference_frame = if backwards { frame + 1 } else { frame - 1 };
    let Some(reference) = reference_marker(track, reference_frame, backwards) else {
        return false;
    };

    if reference.frame == frame {
        // cannot refine with self
        return false;
    }

    let Some(reference_ibuf) = source.frame(reference.frame) else {
        return false;
    };
    let Some(destination_ibuf) = source.frame(frame) else {
        return false;
    };

    let Some(marker) = track.marker_get_exact(frame).copied() else {
        return false;
    };

    let track_context = TrackContext {
        search_area: sampler::search_grayscale(&reference_ibuf, track, &reference),
        reference_marker: Some(reference),
        mask: sampler::tracker_mask(frame_width, frame_height, track, &marker),
    };
    if track_context.search_area.is_none() {
        return false;
    }

    let mut dst_points = [DVec2::ZERO; 5];
    let tracked = run_tracker(
        &destination_ibuf,
        track,
        &track_context,
        &marker,
        kernel,
        &mut dst_points,
    );

    if tracked {
        let mut refined = marker;
        coordinate::set_marker_coords_from_tracking(
            frame_width,
            frame_height,
            &mut refined,
            &dst_points,
        );
        refined.flags |= MarkerFlags::TRACKED;
        track.marker_insert(refined);
    }

    tracked
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use trackvue_core::TrackId;

    fn marker_at(frame: i32, pos: Vec2) -> Marker {
        Marker::with_regions(frame, pos, Vec2::splat(0.05), Vec2::splat(0.1))
    }

    #[test]
    fn test_margin_check() {
        let mut track = Track::new(TrackId(1), "Track");
        track.margin = 0;

        // pattern half-extent is 0.05, so the effective margin is 0.05
        let inside = marker_at(1, Vec2::new(0.5, 0.5));
        assert!(check_marker_margin(&track, &inside, 100, 100));

        let near_border = marker_at(1, Vec2::new(0.02, 0.5));
        assert!(!check_marker_margin(&track, &near_border, 100, 100));

        // explicit pixel margin dominates when larger
        track.margin = 20;
        let inside_but_margined = marker_at(1, Vec2::new(0.1, 0.5));
        assert!(!check_marker_margin(&track, &inside_but_margined, 100, 100));
    }

    #[test]
    fn test_keyframed_marker_walks_to_user_placed() {
        let mut track = Track::new(TrackId(1), "Track");
        track.marker_insert(marker_at(1, Vec2::new(0.5, 0.5)));
        for frame in 2..=5 {
            let mut marker = marker_at(frame, Vec2::new(0.5, 0.5));
            marker.flags |= MarkerFlags::TRACKED;
            track.marker_insert(marker);
        }

        let keyed = keyframed_marker(&track, 5, false).unwrap();
        assert_eq!(keyed.frame, 1);
    }

    #[test]
    fn test_keyframed_marker_falls_back_to_segment_start() {
        let mut track = Track::new(TrackId(1), "Track");
        // frame 1 disabled, 2..5 tracked: no true keyframe exists
        let mut disabled = marker_at(1, Vec2::new(0.5, 0.5));
        disabled.flags |= MarkerFlags::DISABLED;
        track.marker_insert(disabled);
        for frame in 2..=5 {
            let mut marker = marker_at(frame, Vec2::new(0.5, 0.5));
            marker.flags |= MarkerFlags::TRACKED;
            track.marker_insert(marker);
        }

        let keyed = keyframed_marker(&track, 5, false).unwrap();
        assert_eq!(keyed.frame, 2);
    }

    #[test]
    fn test_scale_marker_search() {
        let old_marker = marker_at(1, Vec2::new(0.5, 0.5));
        let mut new_marker = old_marker;
        // pattern doubled in x
        for corner in &mut new_marker.pattern_corners {
            corner.x *= 2.0;
        }

        scale_marker_search(&old_marker, &mut new_marker);

        assert!((new_marker.search_max.x - 0.2).abs() < 1e-6);
        assert!((new_marker.search_max.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_insert_new_marker_brackets_segment() {
        let mut track = Track::new(TrackId(1), "Track");
        let marker = marker_at(5, Vec2::new(0.5, 0.5));
        track.marker_insert(marker);

        let points = coordinate::marker_coords_for_tracking(100, 100, &marker);

        insert_new_marker(&mut track, &marker, 5, false, true, true, 100, 100, &points);

        // disabled marker before the segment, tracked marker at 6,
        // disabled terminator at 7
        assert!(track.marker_get_exact(4).unwrap().is_disabled());
        let tracked = track.marker_get_exact(6).unwrap();
        assert!(tracked.flags.contains(MarkerFlags::TRACKED));
        assert!(!tracked.is_disabled());
        assert!(track.marker_get_exact(7).unwrap().is_disabled());
    }

    #[test]
    fn test_insert_new_marker_failed_track_disables_next() {
        let mut track = Track::new(TrackId(1), "Track");
        let marker = marker_at(5, Vec2::new(0.5, 0.5));
        track.marker_insert(marker);

        insert_new_marker(
            &mut track,
            &marker,
            5,
            false,
            false,
            false,
            100,
            100,
            &[DVec2::ZERO; 5],
        );

        assert!(track.marker_get_exact(6).unwrap().is_disabled());
    }
}
