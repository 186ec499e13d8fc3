//! 2D frame stabilization
//!
//! Translation (and optionally rotation) compensation derived from the
//! tracks flagged for stabilization, with an automatic scale factor that
//! eliminates the black borders the compensation would otherwise expose.

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;
use tracing::debug;

use trackvue_core::{
    StabilizationFilter, StabilizationFlags, Track, TrackFlags, Tracking,
};

use crate::buffer::ImageBuf;

/// Midpoint of the bounding box of all stabilization-track markers at the
/// given frame. `None` when no track is flagged for stabilization.
pub fn stabilization_median(tracks: &[Track], frame: i32) -> Option<Vec2> {
    let mut min = Vec2::splat(f32::MAX);
    let mut max = Vec2::splat(f32::MIN);
    let mut found = false;

    for track in tracks {
        if !track.flags.contains(TrackFlags::USE_2D_STAB) {
            continue;
        }
        if let Some(marker) = track.marker_get(frame) {
            min = min.min(marker.pos);
            max = max.max(marker.pos);
            found = true;
        }
    }

    found.then(|| (max + min) / 2.0)
}

/// Translation, scale and angle compensating the given frame, from the
/// medians of the first and the queried frame.
fn calculate_data(
    tracking: &Tracking,
    frame: i32,
    width: f32,
    height: f32,
    firstmedian: Vec2,
    median: Vec2,
) -> (Vec2, f32, f32) {
    let stab = &tracking.stabilization;

    let scale = (stab.scale - 1.0) * stab.scaleinf + 1.0;
    let mut angle = 0.0f32;

    let mut translation = (firstmedian - median) * Vec2::new(width, height) * scale;
    translation *= stab.locinf;

    let rot_track = stab
        .rot_track
        .and_then(|id| tracking.tracks.iter().find(|track| track.id == id));

    if stab.flags.contains(StabilizationFlags::STABILIZE_ROTATION) && stab.rotinf != 0.0 {
        if let Some(rot_track) = rot_track {
            if let (Some(first), Some(current)) =
                (rot_track.marker_get(1), rot_track.marker_get(frame))
            {
                let x0 = width / 2.0;
                let y0 = height / 2.0;
                let x = median.x * width;
                let y = median.y * height;

                let a = (first.pos - firstmedian) * Vec2::new(width, height);
                let b = (current.pos - median) * Vec2::new(width, height);

                angle = -(a.x * b.y - a.y * b.x).atan2(a.x * b.x + a.y * b.y);
                angle *= stab.rotinf;

                // convert to rotation around the image center
                let (sin, cos) = angle.sin_cos();
                translation.x -= (x0 + (x - x0) * cos - (y - y0) * sin - x) * scale;
                translation.y -= (y0 + (x - x0) * sin + (y - y0) * cos - y) * scale;
            }
        }
    }

    (translation, scale, angle)
}

/// Smallest uniform scale that keeps the stabilized frame free of black
/// borders over the whole stabilized range. The result is cached in the
/// stabilization state.
fn calculate_autoscale_factor(tracking: &mut Tracking, width: u32, height: u32) -> f32 {
    let aspect = tracking.camera.pixel_aspect;

    if tracking.stabilization.ok {
        return tracking.stabilization.scale;
    }

    let Some(firstmedian) = stabilization_median(&tracking.tracks, 1) else {
        tracking.stabilization.scale = 1.0;
        tracking.stabilization.ok = true;
        return 1.0;
    };

    // frame range of the tracks used for stabilization
    let mut start_frame = i32::MAX;
    let mut end_frame = i32::MIN;
    for track in &tracking.tracks {
        let is_rot_track = tracking.stabilization.flags.contains(StabilizationFlags::STABILIZE_ROTATION)
            && tracking.stabilization.rot_track == Some(track.id);
        if track.flags.contains(TrackFlags::USE_2D_STAB) || is_rot_track {
            if let (Some(first), Some(last)) = (track.markers().first(), track.markers().last()) {
                start_frame = start_frame.min(first.frame);
                end_frame = end_frame.max(last.frame);
            }
        }
    }

    tracking.stabilization.scale = 1.0;
    let mut scale = 1.0f32;

    let width_f = width as f32;
    let height_f = height as f32;
    let points = [
        Vec2::new(0.0, 0.0),
        Vec2::new(0.0, height_f),
        Vec2::new(width_f, height_f),
        Vec2::new(width_f, 0.0),
    ];

    for frame in start_frame..=end_frame {
        let Some(median) = stabilization_median(&tracking.tracks, frame) else {
            continue;
        };

        let (translation, _, angle) =
            calculate_data(tracking, frame, width_f, height_f, firstmedian, median);

        let mat = stabilization_matrix(width, height, aspect, translation, 1.0, angle);
        let (sin, cos) = angle.sin_cos();

        for i in 0..4 {
            let a = mat.transform_point3(points[i].extend(0.0));
            let b = mat.transform_point3(points[(i + 1) % 4].extend(0.0));

            for j in 0..4 {
                let point = points[j].extend(0.0);
                let v1 = b - a;
                let v2 = point - a;

                if v1.x * v2.y - v1.y * v2.x >= 0.0 {
                    const ROT_DX: [[f32; 2]; 4] =
                        [[1.0, 0.0], [0.0, -1.0], [-1.0, 0.0], [0.0, 1.0]];
                    const ROT_DY: [[f32; 2]; 4] =
                        [[0.0, 1.0], [1.0, 0.0], [0.0, -1.0], [-1.0, 0.0]];

                    let dx = translation.x * ROT_DX[j][0] + translation.y * ROT_DX[j][1];
                    let dy = translation.x * ROT_DY[j][0] + translation.y * ROT_DY[j][1];

                    let (w, h) = if j % 2 == 1 {
                        (height_f / 2.0, width_f / 2.0)
                    } else {
                        (width_f / 2.0, height_f / 2.0)
                    };

                    let e = -w * cos + h * sin;
                    let f = -h * cos - w * sin;

                    let (g, hh) = if i % 2 == j % 2 {
                        (-w * cos - h * sin, h * cos - w * sin)
                    } else {
                        (w * cos + h * sin, -h * cos + w * sin)
                    };

                    let i_term = f - hh;
                    let j_term = g - e;
                    let k_term = g * f - e * hh;

                    let s = (-w * i_term - h * j_term) / (dx * i_term + dy * j_term + k_term);
                    scale = scale.max(s);
                }
            }
        }
    }

    tracking.stabilization.scale = scale;

    if tracking.stabilization.maxscale > 0.0 {
        tracking.stabilization.scale =
            tracking.stabilization.scale.min(tracking.stabilization.maxscale);
    }

    tracking.stabilization.ok = true;

    debug!(scale = tracking.stabilization.scale, "autoscale factor");

    tracking.stabilization.scale
}

/// Stabilization data (translation, scale, angle) for a frame. Zero
/// transform while stabilization is disabled or no track feeds it.
pub fn stabilization_data(
    tracking: &mut Tracking,
    frame: i32,
    width: u32,
    height: u32,
) -> (Vec2, f32, f32) {
    let stab = &tracking.stabilization;

    if !stab.flags.contains(StabilizationFlags::USE_2D_STABILIZATION) {
        return (Vec2::ZERO, 1.0, 0.0);
    }

    // Tracks not starting at frame 1 still get their median estimated
    // there, which gives a reasonable result in most cases.
    let Some(firstmedian) = stabilization_median(&tracking.tracks, 1) else {
        return (Vec2::ZERO, 1.0, 0.0);
    };
    let Some(median) = stabilization_median(&tracking.tracks, frame) else {
        return (Vec2::ZERO, 1.0, 0.0);
    };

    if !tracking
        .stabilization
        .flags
        .contains(StabilizationFlags::AUTOSCALE)
    {
        tracking.stabilization.scale = 1.0;
    }

    if !tracking.stabilization.ok {
        if tracking
            .stabilization
            .flags
            .contains(StabilizationFlags::AUTOSCALE)
        {
            calculate_autoscale_factor(tracking, width, height);
        }
        tracking.stabilization.ok = true;
    }

    calculate_data(
        tracking,
        frame,
        width as f32,
        height as f32,
        firstmedian,
        median,
    )
}

/// Compose the stabilization transform `T · C · A · R · A⁻¹ · S · C⁻¹`:
/// scale and rotate about the image center with pixel-aspect correction,
/// then translate.
pub fn stabilization_matrix(
    width: u32,
    height: u32,
    aspect: f32,
    translation: Vec2,
    scale: f32,
    angle: f32,
) -> Mat4 {
    let translation_mat = Mat4::from_translation(translation.extend(0.0));
    let center_mat =
        Mat4::from_translation(Vec3::new(width as f32 / 2.0, height as f32 / 2.0, 0.0));
    let inv_center_mat = center_mat.inverse();
    let aspect_mat = Mat4::from_scale(Vec3::new(1.0 / aspect, 1.0, 1.0));
    let inv_aspect_mat = aspect_mat.inverse();
    let rotation_mat = Mat4::from_rotation_z(angle);
    let scale_mat = Mat4::from_scale(Vec3::splat(scale));

    translation_mat * center_mat * aspect_mat * rotation_mat * inv_aspect_mat * scale_mat
        * inv_center_mat
}

/// Stabilize one frame; returns the warped image together with the
/// translation/scale/angle that were applied. With stabilization disabled
/// the input is returned unchanged with a zero transform.
pub fn stabilize_frame(
    tracking: &mut Tracking,
    frame: i32,
    ibuf: &ImageBuf,
) -> (ImageBuf, Vec2, f32, f32) {
    let stab = &tracking.stabilization;

    if !stab.flags.contains(StabilizationFlags::USE_2D_STABILIZATION) {
        return (ibuf.clone(), Vec2::ZERO, 1.0, 0.0);
    }

    let width = ibuf.width();
    let height = ibuf.height();
    let aspect = tracking.camera.pixel_aspect;
    let filter = tracking.stabilization.filter;

    let (translation, scale, angle) = stabilization_data(tracking, frame, width, height);

    let mat = stabilization_matrix(width, height, aspect, translation, scale, angle);
    let inverse = mat.inverse();

    let sample = |x: f32, y: f32| -> [f32; 4] {
        match filter {
            StabilizationFilter::Nearest => ibuf.sample_nearest(x, y),
            StabilizationFilter::Bilinear => ibuf.sample_bilinear(x, y),
            StabilizationFilter::Bicubic => ibuf.sample_bicubic(x, y),
        }
    };

    let compute_row = |y: u32| -> Vec<[f32; 4]> {
        (0..width)
            .map(|x| {
                let source = inverse.transform_point3(Vec3::new(x as f32, y as f32, 0.0));
                sample(source.x, source.y)
            })
            .collect()
    };

    // display-oriented path, threading only pays off on full frames
    let rows: Vec<Vec<[f32; 4]>> = if height > 128 {
        (0..height).into_par_iter().map(compute_row).collect()
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

    (result, translation, scale, angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use trackvue_core::Marker;

    fn session_with_stab_track(positions: &[(i32, Vec2)]) -> Tracking {
        let mut tracking = Tracking::new();
        let id = tracking.track_add(0, positions[0].1, positions[0].0, 100, 100);
        {
            let track = tracking.track_get_mut(id).unwrap();
            for &(frame, pos) in &positions[1..] {
                track.marker_insert(Marker::new(frame, pos));
            }
            track.flags |= TrackFlags::USE_2D_STAB;
        }
        tracking.stabilization.flags |= StabilizationFlags::USE_2D_STABILIZATION;
        tracking
    }

    #[test]
    fn test_disabled_stabilization_is_identity() {
        let mut tracking = Tracking::new();
        let ibuf = ImageBuf::new_float(16, 16);

        let (result, translation, scale, angle) = stabilize_frame(&mut tracking, 1, &ibuf);
        assert_eq!(result, ibuf);
        assert_eq!(translation, Vec2::ZERO);
        assert_eq!(scale, 1.0);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_constant_track_gives_zero_translation() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (5, Vec2::new(0.5, 0.5)),
            (10, Vec2::new(0.5, 0.5)),
        ]);

        for frame in 1..=10 {
            let (translation, scale, angle) = stabilization_data(&mut tracking, frame, 100, 100);
            assert!(translation.length() < 1e-6, "frame {frame}: {translation:?}");
            assert_eq!(scale, 1.0);
            assert_eq!(angle, 0.0);
        }
    }

    #[test]
    fn test_translation_compensates_median_drift() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (10, Vec2::new(0.6, 0.6)),
        ]);

        let (translation, _, _) = stabilization_data(&mut tracking, 10, 100, 100);
        assert!((translation.x + 10.0).abs() < 1e-3, "{translation:?}");
        assert!((translation.y + 10.0).abs() < 1e-3, "{translation:?}");
    }

    #[test]
    fn test_autoscale_scenario() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (10, Vec2::new(0.6, 0.6)),
        ]);
        tracking.stabilization.flags |= StabilizationFlags::AUTOSCALE;

        let (_, scale, _) = stabilization_data(&mut tracking, 10, 100, 100);

        // 10px translation on a 100px frame needs at least 100/(100-2*10)
        assert!(scale >= 1.25 - 1e-3, "scale {scale}");
        assert!(scale < 1.6, "scale {scale}");
    }

    #[test]
    fn test_autoscale_covers_frame_at_every_corner() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (10, Vec2::new(0.58, 0.55)),
        ]);
        tracking.stabilization.flags |= StabilizationFlags::AUTOSCALE;

        let (translation, scale, angle) = stabilization_data(&mut tracking, 10, 100, 100);
        let mat = stabilization_matrix(100, 100, 1.0, translation, scale, angle);
        let inverse = mat.inverse();

        // every frame corner must map back inside the source rectangle
        for corner in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 0.0),
            Vec3::new(0.0, 100.0, 0.0),
        ] {
            let source = inverse.transform_point3(corner);
            assert!(
                (-0.5..=100.5).contains(&source.x) && (-0.5..=100.5).contains(&source.y),
                "corner {corner:?} sampled from {source:?}"
            );
        }
    }

    #[test]
    fn test_autoscale_respects_maxscale() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (10, Vec2::new(0.9, 0.9)),
        ]);
        tracking.stabilization.flags |= StabilizationFlags::AUTOSCALE;
        tracking.stabilization.maxscale = 1.1;

        let (_, scale, _) = stabilization_data(&mut tracking, 10, 100, 100);
        assert!(scale <= 1.1 + 1e-6);
    }

    #[test]
    fn test_rotation_about_center() {
        let mut tracking = session_with_stab_track(&[(1, Vec2::new(0.5, 0.5))]);
        // a second track defines the rotation
        let rot_id = tracking.track_add(0, Vec2::new(0.9, 0.5), 1, 100, 100);
        {
            let track = tracking.track_get_mut(rot_id).unwrap();
            // rotate the offset vector by 90 degrees over ten frames
            track.marker_insert(Marker::new(10, Vec2::new(0.5, 0.9)));
        }
        tracking.stabilization.flags |= StabilizationFlags::STABILIZE_ROTATION;
        tracking.stabilization.rot_track = Some(rot_id);

        let (_, _, angle) = stabilization_data(&mut tracking, 10, 100, 100);
        assert!(
            (angle + std::f32::consts::FRAC_PI_2).abs() < 1e-3,
            "angle {angle}"
        );
    }

    #[test]
    fn test_matrix_identity_for_zero_transform() {
        let mat = stabilization_matrix(100, 100, 1.0, Vec2::ZERO, 1.0, 0.0);
        assert!(mat.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_stabilize_frame_translates_content() {
        let mut tracking = session_with_stab_track(&[
            (1, Vec2::new(0.5, 0.5)),
            (2, Vec2::new(0.6, 0.5)),
        ]);

        let mut ibuf = ImageBuf::new_float(100, 100);
        // bright pixel where the drifted feature sits
        ibuf.set_pixel(60, 50, [1.0, 1.0, 1.0, 1.0]);

        let (result, translation, _, _) = stabilize_frame(&mut tracking, 2, &ibuf);
        assert!((translation.x + 10.0).abs() < 1e-3);
        // the bright pixel is pulled back to the reference position
        assert!(result.pixel(50, 50)[0] > 0.9);
    }
}
