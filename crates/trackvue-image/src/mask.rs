//! Polygonal mask rasterization and point-in-polygon tests

use glam::Vec2;
use trackvue_core::{Marker, MaskLayer, MaskStroke};

/// Sub-scanlines per pixel row for edge antialiasing
const SUBSAMPLES: usize = 4;

/// Scanline-fill one polygon into `mask`. Polygon coordinates are
/// normalized to the mask (0..1 over `width`×`height`); coverage is
/// antialiased by sampling several scanlines per pixel row and accumulates
/// with any coverage already in the buffer.
pub fn rasterize_polygon(points: &[Vec2], mask: &mut [f32], width: u32, height: u32) {
    if points.len() < 3 {
        return;
    }

    debug_assert_eq!(mask.len(), (width * height) as usize);

    let mut row = vec![0.0f32; width as usize];
    let mut crossings: Vec<f32> = Vec::new();

    for y in 0..height {
        row.fill(0.0);

        for sub in 0..SUBSAMPLES {
            // scanline through the sub-row center, in normalized space
            let scan_y = (y as f32 + (sub as f32 + 0.5) / SUBSAMPLES as f32) / height as f32;

            crossings.clear();
            let mut prev = points[points.len() - 1];
            for &point in points {
                if (point.y < scan_y && prev.y >= scan_y) || (prev.y < scan_y && point.y >= scan_y)
                {
                    let fac = (scan_y - point.y) / (prev.y - point.y);
                    crossings.push(point.x + fac * (prev.x - point.x));
                }
                prev = point;
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            // fill between crossing pairs with fractional pixel coverage
            for span in crossings.chunks_exact(2) {
                let left = (span[0].max(0.0) * width as f32).min(width as f32);
                let right = (span[1].max(0.0) * width as f32).min(width as f32);
                if right <= left {
                    continue;
                }

                let first = left.floor() as usize;
                let last = (right.ceil() as usize).min(width as usize);
                for x in first..last {
                    let pixel_left = x as f32;
                    let pixel_right = pixel_left + 1.0;
                    let covered = right.min(pixel_right) - left.max(pixel_left);
                    if covered > 0.0 {
                        row[x] += covered / SUBSAMPLES as f32;
                    }
                }
            }
        }

        let offset = (y * width) as usize;
        for (x, &coverage) in row.iter().enumerate() {
            let dst = &mut mask[offset + x];
            *dst = (*dst + coverage).min(1.0);
        }
    }
}

/// Rasterize a track's mask layer into a search-window sized float buffer.
///
/// Stroke points are in marker space; they map to the mask so that
/// `search_min` lands on the lower-left corner and `search_max` on the
/// upper-right.
pub fn rasterize_track_mask(
    frame_width: u32,
    frame_height: u32,
    marker: &Marker,
    layer: &MaskLayer,
    mask_width: u32,
    mask_height: u32,
) -> Vec<f32> {
    let mut mask = vec![0.0f32; (mask_width * mask_height) as usize];

    let mut normalized: Vec<Vec2> = Vec::new();
    for stroke in &layer.strokes {
        normalized.clear();
        normalized.extend(stroke.points.iter().map(|point| {
            Vec2::new(
                (point.x - marker.search_min.x) * frame_width as f32 / mask_width as f32,
                (point.y - marker.search_min.y) * frame_height as f32 / mask_height as f32,
            )
        }));

        rasterize_polygon(&normalized, &mut mask, mask_width, mask_height);
    }

    mask
}

/// Even-odd test of a point against one stroke polygon. Self-intersecting
/// strokes give the usual even-odd result.
pub fn point_in_stroke(stroke: &MaskStroke, x: f32, y: f32) -> bool {
    let points = &stroke.points;
    if points.len() < 3 {
        return false;
    }

    let mut count = 0;
    let mut prev = points.len() - 1;

    for i in 0..points.len() {
        if (points[i].y < y && points[prev].y >= y) || (points[prev].y < y && points[i].y >= y) {
            let fac = (y - points[i].y) / (points[prev].y - points[i].y);
            if points[i].x + fac * (points[prev].x - points[i].x) < x {
                count += 1;
            }
        }
        prev = i;
    }

    count % 2 == 1
}

/// Whether any stroke of the layer contains the point.
pub fn point_in_layer(layer: &MaskLayer, x: f32, y: f32) -> bool {
    layer.strokes.iter().any(|stroke| point_in_stroke(stroke, x, y))
}
