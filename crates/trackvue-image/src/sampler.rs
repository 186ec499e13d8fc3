//! Search window extraction and warped pattern resampling

use glam::{DVec2, Vec2};
use trackvue_core::{coordinate, AlgorithmFlags, Marker, Track};

use crate::buffer::ImageBuf;
use crate::channels::{disable_track_channels, rgba_to_gray, track_disables_channels};
use crate::mask::rasterize_track_mask;

/// Cut the marker's search window out of the frame.
///
/// `anchored` shifts the window by the track offset (in whole pixels);
/// `disable_channels` applies the track's channel-disable blend in grayscale
/// mode. `None` when the search window has no area.
pub fn get_search_imbuf(
    ibuf: &ImageBuf,
    track: &Track,
    marker: &Marker,
    anchored: bool,
    disable_channels: bool,
) -> Option<ImageBuf> {
    let origin =
        coordinate::search_origin_frame_pixel(ibuf.width(), ibuf.height(), marker);

    let mut x = origin.x as i64;
    let mut y = origin.y as i64;

    if anchored {
        x += (track.offset.x * ibuf.width() as f32) as i64;
        y += (track.offset.y * ibuf.height() as f32) as i64;
    }

    let width = ((marker.search_max.x - marker.search_min.x) * ibuf.width() as f32) as i64;
    let height = ((marker.search_max.y - marker.search_min.y) * ibuf.height() as f32) as i64;

    if width <= 0 || height <= 0 {
        return None;
    }

    let mut search = ibuf.copy_region(x, y, width as u32, height as u32);

    if disable_channels && track_disables_channels(track) {
        disable_track_channels(&mut search, track, true);
    }

    Some(search)
}

/// Resample the marker's (possibly warped) pattern quad from a search
/// buffer into an `num_x`×`num_y` float patch.
///
/// Returns the patch and the warped center position in search-pixel space.
/// With `from_anchor` the whole-pixel snap the anchored search extraction
/// applied is compensated, so the patch stays sub-pixel accurate.
pub fn sample_pattern(
    frame_width: u32,
    frame_height: u32,
    search_ibuf: &ImageBuf,
    track: &Track,
    marker: &Marker,
    from_anchor: bool,
    use_mask: bool,
    num_x: u32,
    num_y: u32,
) -> Option<(ImageBuf, Vec2)> {
    if num_x == 0 || num_y == 0 {
        return None;
    }

    let mut points = coordinate::marker_coords_for_tracking(frame_width, frame_height, marker);

    // from_anchor means the search buffer was cut at an anchored position,
    // with the track offset rounded to whole pixels. Undo the fractional
    // part here; truncation rounds toward zero, so negative offsets need
    // the +1 correction.
    if from_anchor {
        let offset_x = (track.offset.x * frame_width as f32) as f64;
        let offset_y = (track.offset.y * frame_height as f32) as f64;
        let mut frac = DVec2::new(offset_x - offset_x.trunc(), offset_y - offset_y.trunc());
        if track.offset.x < 0.0 {
            frac.x += 1.0;
        }
        if track.offset.y < 0.0 {
            frac.y += 1.0;
        }
        for point in &mut points {
            *point += frac;
        }
    }

    let mask = if use_mask {
        get_track_mask(frame_width, frame_height, track, marker)
    } else {
        None
    };

    let mut patch = ImageBuf::new_float(num_x, num_y);
    let corners = [points[0], points[1], points[2], points[3]];

    let sample_at = |u: f64, v: f64| -> DVec2 {
        // bilinear warp of the unit square onto the pattern quad;
        // corners are ordered (min,min), (max,min), (max,max), (min,max)
        corners[0] * ((1.0 - u) * (1.0 - v))
            + corners[1] * (u * (1.0 - v))
            + corners[2] * (u * v)
            + corners[3] * ((1.0 - u) * v)
    };

    for j in 0..num_y {
        let v = (j as f64 + 0.5) / num_y as f64;
        for i in 0..num_x {
            let u = (i as f64 + 0.5) / num_x as f64;
            let src = sample_at(u, v);

            let mut rgba = search_ibuf.sample_bilinear(src.x as f32 + 0.5, src.y as f32 + 0.5);

            if let Some(mask) = &mask {
                let weight = sample_mask(mask, search_ibuf.width(), search_ibuf.height(), src);
                rgba[0] *= weight;
                rgba[1] *= weight;
                rgba[2] *= weight;
            }

            patch.set_pixel(i, j, rgba);
        }
    }

    let center = sample_at(0.5, 0.5);
    Some((patch, Vec2::new(center.x as f32, center.y as f32)))
}

fn sample_mask(mask: &[f32], width: u32, height: u32, position: DVec2) -> f32 {
    let x = (position.x + 0.5).round() as i64;
    let y = (position.y + 0.5).round() as i64;
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return 0.0;
    }
    mask[(y as u32 * width + x as u32) as usize]
}

/// Pattern patch at the pattern bbox's own pixel resolution, sampled
/// through the search buffer.
pub fn get_pattern_imbuf(
    ibuf: &ImageBuf,
    track: &Track,
    marker: &Marker,
    anchored: bool,
    disable_channels: bool,
) -> Option<ImageBuf> {
    let (pat_min, pat_max) = marker.pattern_bounds();

    let num_x = ((pat_max.x - pat_min.x) * ibuf.width() as f32) as i64;
    let num_y = ((pat_max.y - pat_min.y) * ibuf.height() as f32) as i64;
    if num_x <= 0 || num_y <= 0 {
        return None;
    }

    let search_ibuf = get_search_imbuf(ibuf, track, marker, anchored, disable_channels)?;

    sample_pattern(
        ibuf.width(),
        ibuf.height(),
        &search_ibuf,
        track,
        marker,
        anchored,
        false,
        num_x as u32,
        num_y as u32,
    )
    .map(|(patch, _)| patch)
}

/// Rasterize the track's mask layer at the marker's search window size.
/// `None` when the track has no usable layer.
pub fn get_track_mask(
    frame_width: u32,
    frame_height: u32,
    track: &Track,
    marker: &Marker,
) -> Option<Vec<f32>> {
    let layer = track.mask.as_ref().filter(|layer| !layer.is_empty())?;

    let mask_width =
        ((marker.search_max.x - marker.search_min.x) * frame_width as f32) as u32;
    let mask_height =
        ((marker.search_max.y - marker.search_min.y) * frame_height as f32) as u32;

    if mask_width == 0 || mask_height == 0 {
        return None;
    }

    Some(rasterize_track_mask(
        frame_width,
        frame_height,
        marker,
        layer,
        mask_width,
        mask_height,
    ))
}

/// Grayscale float search window for the tracker kernel, channel-disable
/// blend applied. `None` when the window has no area.
pub fn search_grayscale(
    ibuf: &ImageBuf,
    track: &Track,
    marker: &Marker,
) -> Option<(Vec<f32>, u32, u32)> {
    let search = get_search_imbuf(ibuf, track, marker, false, true)?;
    let gray = rgba_to_gray(&search);
    Some((gray, search.width(), search.height()))
}

/// Reference mask for the tracker kernel, honoring the track's USE_MASK
/// switch.
pub fn tracker_mask(
    frame_width: u32,
    frame_height: u32,
    track: &Track,
    marker: &Marker,
) -> Option<Vec<f32>> {
    if !track.algorithm_flags.contains(AlgorithmFlags::USE_MASK) {
        return None;
    }
    get_track_mask(frame_width, frame_height, track, marker)
}
