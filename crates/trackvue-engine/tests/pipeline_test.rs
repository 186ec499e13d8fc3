//! End-to-end tracking and reconstruction over synthetic footage

use std::sync::atomic::AtomicBool;

use glam::{DMat4, DVec3, Vec2, Vec3};
use trackvue_core::*;
use trackvue_engine::*;
use trackvue_image::ImageBuf;

/// A 100×100 frame with a bright 3×3 dot on a dim background.
fn frame_with_dot(x: u32, y: u32) -> ImageBuf {
    let mut buf = ImageBuf::new_float(100, 100);
    for py in 0..100 {
        for px in 0..100 {
            buf.set_pixel(px, py, [0.1, 0.1, 0.1, 1.0]);
        }
    }
    for dy in 0..3 {
        for dx in 0..3 {
            buf.set_pixel(x + dx - 1, y + dy - 1, [1.0, 1.0, 1.0, 1.0]);
        }
    }
    buf
}

/// Dot drifting right by 2px per frame, starting at (50, 50) on frame 1.
fn drifting_sequence(frames: i32) -> SequenceSource {
    let mut source = SequenceSource::new(100, 100);
    for frame in 1..=frames {
        let x = 50 + (frame - 1) as u32 * 2;
        source.insert(frame, frame_with_dot(x, 50));
    }
    source
}

fn session_with_selected_track() -> (Tracking, TrackId) {
    let mut tracking = Tracking::new();
    let id = tracking.track_add(0, Vec2::new(0.5, 0.5), 1, 100, 100);
    tracking.track_select(0, id, TrackArea::ALL, true);
    (tracking, id)
}

#[test]
fn test_tracking_follows_drifting_dot() {
    let source = drifting_sequence(6);
    let (mut tracking, id) = session_with_selected_track();

    let mut context = TrackingContext::new(&tracking, &source, 1, false);
    assert_eq!(context.len(), 1);

    for _ in 0..4 {
        assert!(context.step(&source, &BruteForceTracker));
    }
    context.sync(&mut tracking);

    let track = tracking.track_get(id).unwrap();
    for frame in 2..=5 {
        let marker = track.marker_get_exact(frame).unwrap();
        assert!(marker.flags.contains(MarkerFlags::TRACKED), "frame {frame}");
        assert!(!marker.is_disabled());

        let expected_x = 0.5 + (frame - 1) as f32 * 0.02;
        assert!(
            (marker.pos.x - expected_x).abs() < 0.015,
            "frame {frame}: {} vs {expected_x}",
            marker.pos.x
        );
        assert!((marker.pos.y - 0.5).abs() < 0.015);
    }
}

#[test]
fn test_tracked_segment_is_bracketed_by_disabled_markers() {
    let source = drifting_sequence(4);
    let (mut tracking, id) = session_with_selected_track();

    let mut context = TrackingContext::new(&tracking, &source, 1, false);
    assert!(context.step(&source, &BruteForceTracker));
    assert!(context.step(&source, &BruteForceTracker));
    context.sync(&mut tracking);

    let track = tracking.track_get(id).unwrap();
    // segment opened with a disabled marker before the keyframe
    assert!(track.marker_get_exact(0).unwrap().is_disabled());
    // and terminated with one after the last tracked frame
    assert!(track.marker_get_exact(4).unwrap().is_disabled());
}

#[test]
fn test_step_fails_without_destination_frame() {
    let source = drifting_sequence(2);
    let (tracking, _) = session_with_selected_track();

    let mut context = TrackingContext::new(&tracking, &source, 1, false);
    assert!(context.step(&source, &BruteForceTracker));
    // frame 3 does not exist
    assert!(!context.step(&source, &BruteForceTracker));
}

#[test]
fn test_backwards_tracking() {
    let mut source = SequenceSource::new(100, 100);
    for frame in 1..=5 {
        let x = 50 + (5 - frame) as u32 * 2;
        source.insert(frame, frame_with_dot(x, 50));
    }

    let mut tracking = Tracking::new();
    let id = tracking.track_add(0, Vec2::new(0.5, 0.5), 5, 100, 100);
    tracking.track_select(0, id, TrackArea::ALL, true);

    let mut context = TrackingContext::new(&tracking, &source, 5, true);
    assert!(context.step(&source, &BruteForceTracker));
    assert!(context.step(&source, &BruteForceTracker));
    context.sync(&mut tracking);

    let track = tracking.track_get(id).unwrap();
    let marker = track.marker_get_exact(4).unwrap();
    assert!(marker.flags.contains(MarkerFlags::TRACKED));
    assert!((marker.pos.x - 0.52).abs() < 0.015);
    // bracket on the backwards side
    assert!(track.marker_get_exact(2).unwrap().is_disabled());
}

#[test]
fn test_locked_and_unselected_tracks_are_skipped() {
    let source = drifting_sequence(3);
    let mut tracking = Tracking::new();

    let selected = tracking.track_add(0, Vec2::new(0.5, 0.5), 1, 100, 100);
    tracking.track_select(0, selected, TrackArea::ALL, true);

    let locked = tracking.track_add(0, Vec2::new(0.3, 0.3), 1, 100, 100);
    tracking.track_select(0, locked, TrackArea::ALL, true);
    tracking.track_get_mut(locked).unwrap().flags |= TrackFlags::LOCKED;

    let _unselected = tracking.track_add(0, Vec2::new(0.7, 0.7), 1, 100, 100);

    let context = TrackingContext::new(&tracking, &source, 1, false);
    assert_eq!(context.len(), 1);
}

#[test]
fn test_refine_marker_snaps_to_feature() {
    let source = drifting_sequence(3);
    let (mut tracking, id) = session_with_selected_track();

    // hand-placed marker on frame 2, slightly off the actual dot position
    {
        let track = tracking.track_get_mut(id).unwrap();
        let reference = *track.marker_get_exact(1).unwrap();
        let mut guess = reference.at_frame(2);
        guess.pos = Vec2::new(0.54, 0.51);
        track.marker_insert(guess);
    }

    let track = tracking.track_get_mut(id).unwrap();
    assert!(refine_marker(track, 2, false, &source, &BruteForceTracker));

    let refined = track.marker_get_exact(2).unwrap();
    assert!(refined.flags.contains(MarkerFlags::TRACKED));
    assert!((refined.pos.x - 0.52).abs() < 0.015, "{}", refined.pos.x);
    assert!((refined.pos.y - 0.5).abs() < 0.015);
}

/* ------------------------- reconstruction -------------------------- */

/// Canned solver: camera poses along a line, every track at a fixed depth.
struct FixtureSolver {
    frames: std::ops::RangeInclusive<i32>,
}

impl ReconstructionSolver for FixtureSolver {
    fn solve(
        &self,
        tracks: &SolverTracks,
        intrinsics: &IntrinsicsOptions,
        _options: &mut ReconstructionOptions,
        progress: &mut ProgressFn<'_>,
        _stop: &AtomicBool,
    ) -> trackvue_core::Result<SolvedReconstruction> {
        let mut solved = SolvedReconstruction::new(*intrinsics, 0.3);

        for frame in self.frames.clone() {
            // camera translated along x, one unit per frame
            let mat = DMat4::from_translation(DVec3::new(frame as f64, 0.0, 0.0));
            solved.insert_camera(frame, mat, 0.1);
        }

        let mut track_indices: Vec<usize> =
            tracks.markers().iter().map(|marker| marker.track).collect();
        track_indices.sort_unstable();
        track_indices.dedup();
        for index in track_indices {
            solved.insert_point(index, DVec3::new(index as f64, 1.0, 5.0), 0.2);
        }

        progress(1.0, "done");
        Ok(solved)
    }

    fn solve_modal(
        &self,
        tracks: &SolverTracks,
        intrinsics: &IntrinsicsOptions,
        options: &mut ReconstructionOptions,
        progress: &mut ProgressFn<'_>,
        stop: &AtomicBool,
    ) -> trackvue_core::Result<SolvedReconstruction> {
        self.solve(tracks, intrinsics, options, progress, stop)
    }
}

fn session_for_solving() -> Tracking {
    let mut tracking = Tracking::new();
    for i in 0..8 {
        let id = tracking.track_add(
            0,
            Vec2::new(0.1 + 0.1 * i as f32, 0.5),
            5,
            640,
            480,
        );
        let track = tracking.track_get_mut(id).unwrap();
        let first = *track.marker_get_exact(5).unwrap();
        for frame in 6..=20 {
            track.marker_insert(first.at_frame(frame));
        }
    }
    tracking
}

#[test]
fn test_reconstruction_origin_normalization() {
    let mut tracking = session_for_solving();
    let mut context = ReconstructContext::new(&tracking, 0, 5, 20, 640, 480);
    assert_eq!(context.frame_range(), (5, 20));

    let solver = FixtureSolver { frames: 5..=20 };
    let stop = AtomicBool::new(false);
    context
        .solve(&solver, &stop, &mut |_, _| {})
        .expect("fixture solve succeeds");

    assert!(context.finish(&mut tracking));

    let cameras = tracking.reconstruction.cameras();
    assert_eq!(cameras.len(), 16);

    // the first solved frame becomes the world origin
    let first = &cameras[0];
    assert_eq!(first.frame, 5);
    assert!(first.mat.abs_diff_eq(glam::Mat4::IDENTITY, 1e-5));

    // and every later pose is relative to it: M5⁻¹ · M10
    let at_10 = cameras.iter().find(|camera| camera.frame == 10).unwrap();
    let expected = Vec3::new(5.0, 0.0, 0.0);
    assert!((at_10.mat.w_axis.truncate() - expected).length() < 1e-4);

    assert!(tracking.reconstruction.is_reconstructed());
    assert!((tracking.reconstruction.error - 0.3).abs() < 1e-6);
}

#[test]
fn test_reconstruction_transforms_bundles_to_origin() {
    let mut tracking = session_for_solving();
    let mut context = ReconstructContext::new(&tracking, 0, 5, 20, 640, 480);

    let solver = FixtureSolver { frames: 5..=20 };
    let stop = AtomicBool::new(false);
    context.solve(&solver, &stop, &mut |_, _| {}).unwrap();
    assert!(context.finish(&mut tracking));

    for (index, track) in tracking.tracks.iter().enumerate() {
        let bundle = track.bundle_pos.expect("every track got a bundle");
        // fixture point (index, 1, 5) shifted by the origin inverse (-5,0,0)
        let expected = Vec3::new(index as f32 - 5.0, 1.0, 5.0);
        assert!(
            (bundle - expected).length() < 1e-4,
            "track {index}: {bundle:?}"
        );
        assert!((track.error - 0.2).abs() < 1e-6);
    }
}

#[test]
fn test_reconstruction_partial_cameras_degrade() {
    let mut tracking = session_for_solving();
    let mut context = ReconstructContext::new(&tracking, 0, 5, 20, 640, 480);

    // solver only produced cameras for half the range
    let solver = FixtureSolver { frames: 5..=12 };
    let stop = AtomicBool::new(false);
    context.solve(&solver, &stop, &mut |_, _| {}).unwrap();

    let ok = context.finish(&mut tracking);
    assert!(!ok, "missing frames degrade the result");
    assert_eq!(tracking.reconstruction.cameras().len(), 8);
    assert!(tracking.reconstruction.is_reconstructed());
}

#[test]
fn test_unsolved_context_leaves_reconstruction_intact() {
    let mut tracking = session_for_solving();
    tracking.reconstruction.error = 42.0;

    let context = ReconstructContext::new(&tracking, 0, 5, 20, 640, 480);
    assert!(!context.finish(&mut tracking));
    assert!((tracking.reconstruction.error - 42.0).abs() < 1e-6);
    assert!(!tracking.reconstruction.is_reconstructed());
}
