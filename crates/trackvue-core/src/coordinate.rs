//! Space transformation functions
//!
//! Three coordinate frames: Frame, Search, and Marker. Two units: pixels and
//! unified. Naming is `{frame}_{unit}`: "search pixel" coordinates are
//! relative to the search window origin in pixels, "frame unified" are 0..1
//! coordinates over the entire frame. Marker-unified coordinates are offsets
//! from the marker position in frame-unified units.

use glam::{DVec2, Vec2};

use crate::marker::Marker;

pub fn unified_to_pixel(frame_width: u32, frame_height: u32, unified: Vec2) -> Vec2 {
    Vec2::new(
        unified.x * frame_width as f32,
        unified.y * frame_height as f32,
    )
}

pub fn pixel_to_unified(frame_width: u32, frame_height: u32, pixel: Vec2) -> Vec2 {
    Vec2::new(
        pixel.x / frame_width as f32,
        pixel.y / frame_height as f32,
    )
}

pub fn marker_to_frame_unified(marker: &Marker, marker_unified: Vec2) -> Vec2 {
    marker_unified + marker.pos
}

pub fn marker_unified_to_frame_pixel(
    frame_width: u32,
    frame_height: u32,
    marker: &Marker,
    marker_unified: Vec2,
) -> Vec2 {
    unified_to_pixel(
        frame_width,
        frame_height,
        marker_to_frame_unified(marker, marker_unified),
    )
}

/// Lower-left corner of the search window, snapped to integer frame pixels.
pub fn search_origin_frame_pixel(frame_width: u32, frame_height: u32, marker: &Marker) -> Vec2 {
    marker_unified_to_frame_pixel(frame_width, frame_height, marker, marker.search_min).floor()
}

pub fn marker_unified_to_search_pixel(
    frame_width: u32,
    frame_height: u32,
    marker: &Marker,
    marker_unified: Vec2,
) -> Vec2 {
    let frame_pixel = marker_unified_to_frame_pixel(frame_width, frame_height, marker, marker_unified);
    frame_pixel - search_origin_frame_pixel(frame_width, frame_height, marker)
}

pub fn search_pixel_to_marker_unified(
    frame_width: u32,
    frame_height: u32,
    marker: &Marker,
    search_pixel: Vec2,
) -> Vec2 {
    let frame_pixel = search_pixel + search_origin_frame_pixel(frame_width, frame_height, marker);
    pixel_to_unified(frame_width, frame_height, frame_pixel) - marker.pos
}

/// Five points the tracker kernel warps: the four pattern corners followed by
/// the center. Packed in search-pixel space with a −0.5 pixel shift so the
/// kernel sees pixel centers.
pub fn marker_coords_for_tracking(
    frame_width: u32,
    frame_height: u32,
    marker: &Marker,
) -> [DVec2; 5] {
    let mut points = [DVec2::ZERO; 5];

    for (point, corner) in points.iter_mut().zip(marker.pattern_corners.iter()) {
        let pixel = marker_unified_to_search_pixel(frame_width, frame_height, marker, *corner);
        *point = DVec2::new(pixel.x as f64 - 0.5, pixel.y as f64 - 0.5);
    }

    // the center position (aka "pos"); this is the origin
    let pixel = marker_unified_to_search_pixel(frame_width, frame_height, marker, Vec2::ZERO);
    points[4] = DVec2::new(pixel.x as f64 - 0.5, pixel.y as f64 - 0.5);

    points
}

/// Inverse of [`marker_coords_for_tracking`].
///
/// If the tracker moved the center, the whole patch shifted, and that delta
/// is applied to the marker position while the corners stay relative to it.
pub fn set_marker_coords_from_tracking(
    frame_width: u32,
    frame_height: u32,
    marker: &mut Marker,
    points: &[DVec2; 5],
) {
    let mut corners = [Vec2::ZERO; 4];
    for (corner, point) in corners.iter_mut().zip(points.iter()) {
        let search_pixel = Vec2::new(point.x as f32 + 0.5, point.y as f32 + 0.5);
        *corner = search_pixel_to_marker_unified(frame_width, frame_height, marker, search_pixel);
    }

    let search_pixel = Vec2::new(points[4].x as f32 + 0.5, points[4].y as f32 + 0.5);
    let center = search_pixel_to_marker_unified(frame_width, frame_height, marker, search_pixel);

    for (corner, new_corner) in marker.pattern_corners.iter_mut().zip(corners.iter()) {
        *corner = *new_corner - center;
    }
    marker.pos += center;
}
