//! End-to-end checks over a whole tracking session

use glam::Vec2;
use trackvue_core::*;

fn add_tracked_range(tracking: &mut Tracking, from: i32, to: i32, pos: Vec2) -> TrackId {
    let id = tracking.track_add(0, pos, from, 640, 480);
    let track = tracking.track_get_mut(id).unwrap();
    let first = *track.marker_get_exact(from).unwrap();
    for frame in (from + 1)..=to {
        let mut marker = first.at_frame(frame);
        marker.flags |= MarkerFlags::TRACKED;
        track.marker_insert(marker);
    }
    id
}

#[test]
fn test_marker_sort_invariant_after_mixed_edits() {
    let mut tracking = Tracking::new();
    let id = add_tracked_range(&mut tracking, 1, 30, Vec2::new(0.5, 0.5));
    let track = tracking.track_get_mut(id).unwrap();

    track.marker_delete(7);
    track.marker_ensure(7);
    track.marker_insert(Marker::new(100, Vec2::new(0.2, 0.2)));
    track.path_clear(20, ClearAction::Remained);
    track.marker_ensure(40);

    for pair in track.markers().windows(2) {
        assert!(pair[0].frame < pair[1].frame);
    }
}

#[test]
fn test_names_stay_unique_through_paste_and_merge() {
    let mut tracking = Tracking::new();
    for i in 0..5 {
        tracking.track_add(0, Vec2::new(0.1 * i as f32, 0.5), 1, 640, 480);
    }
    tracking.track_select(0, tracking.tracks[0].id, TrackArea::ALL, true);
    tracking.track_select(0, tracking.tracks[1].id, TrackArea::ALL, true);

    let mut clipboard = TrackClipboard::default();
    clipboard.copy_selected(&tracking, 0);
    clipboard.paste(&mut tracking, 0);

    let mut map = TracksMap::new("Camera", true);
    map.insert(&tracking.tracks[2], ());
    map.merge(&mut tracking);

    let mut names: Vec<&str> = tracking.tracks.iter().map(|t| t.name.as_str()).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);
}

#[test]
fn test_session_serde_round_trip() {
    let mut tracking = Tracking::new();
    let id = add_tracked_range(&mut tracking, 1, 10, Vec2::new(0.4, 0.6));
    tracking.track_get_mut(id).unwrap().bundle_pos = Some(glam::Vec3::new(1.0, 2.0, 3.0));
    tracking.object_add("Rig");
    tracking.camera.focal = 1200.0;
    tracking.stabilization.flags |= StabilizationFlags::USE_2D_STABILIZATION;

    let json = serde_json::to_string(&tracking).unwrap();
    let mut restored: Tracking = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.tracks.len(), tracking.tracks.len());
    assert_eq!(restored.objects.len(), 2);
    assert_eq!(restored.camera.focal, 1200.0);
    let restored_track = restored.track_get(id).unwrap();
    assert_eq!(restored_track.markers().len(), 10);
    assert_eq!(
        restored_track.bundle_pos,
        Some(glam::Vec3::new(1.0, 2.0, 3.0))
    );

    // fresh ids after restore must not collide with persisted ones
    let new_id = restored.allocate_track_id();
    assert!(restored.track_get(new_id).is_none());
}

#[test]
fn test_dopesheet_lazy_rebuild() {
    let mut tracking = Tracking::new();
    add_tracked_range(&mut tracking, 1, 10, Vec2::new(0.5, 0.5));

    tracking.dopesheet_update();
    assert!(tracking.dopesheet.ok);
    assert_eq!(tracking.dopesheet.channels.len(), 1);
    assert_eq!(tracking.dopesheet.channels[0].segments, vec![(1, 10)]);

    // no tag, no rebuild
    add_tracked_range(&mut tracking, 1, 5, Vec2::new(0.2, 0.2));
    tracking.dopesheet.ok = true;
    tracking.dopesheet_update();
    assert_eq!(tracking.dopesheet.channels.len(), 1);

    tracking.dopesheet_tag_update();
    tracking.dopesheet_update();
    assert_eq!(tracking.dopesheet.channels.len(), 2);
}

#[test]
fn test_coverage_scenario() {
    let mut tracking = Tracking::new();
    add_tracked_range(&mut tracking, 1, 10, Vec2::new(0.1, 0.1));
    add_tracked_range(&mut tracking, 5, 15, Vec2::new(0.2, 0.2));
    add_tracked_range(&mut tracking, 20, 30, Vec2::new(0.3, 0.3));

    let coverage = coverage_per_frame(tracking.active_tracks());
    assert!(coverage.iter().all(|&(_, c)| c == Coverage::Bad));

    for i in 0..10 {
        add_tracked_range(&mut tracking, 5, 15, Vec2::new(0.05 * i as f32, 0.9));
    }

    let coverage = coverage_per_frame(tracking.active_tracks());
    for &(frame, cov) in &coverage {
        if (5..=15).contains(&frame) {
            assert_eq!(cov, Coverage::Acceptable, "frame {frame}");
        } else {
            assert_eq!(cov, Coverage::Bad, "frame {frame}");
        }
    }
}

#[test]
fn test_clamp_scenario() {
    // pattern bbox [-0.1,-0.1]..[0.1,0.1], search [-0.05,-0.05]..[0.05,0.05]
    let mut marker = Marker::with_regions(
        1,
        Vec2::new(0.5, 0.5),
        Vec2::splat(0.1),
        Vec2::splat(0.05),
    );
    marker.clamp(ClampEvent::PatternDimension);

    assert_eq!(marker.search_min, Vec2::splat(-0.1));
    assert_eq!(marker.search_max, Vec2::splat(0.1));
}
