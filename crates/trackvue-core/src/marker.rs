//! Per-frame marker data and the search/pattern clamp rules

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-marker state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct MarkerFlags: u8 {
        /// Marker is disabled and must be skipped by tracking and solving
        const DISABLED = 1 << 0;
        /// Marker position was produced by the tracker, not placed by hand
        const TRACKED = 1 << 1;
    }
}

/// Event which triggered a clamp of the marker regions, see [`Marker::clamp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampEvent {
    /// Pattern was resized
    PatternDimension,
    /// Pattern was moved
    PatternPosition,
    /// Search area was resized
    SearchDimension,
    /// Search area was moved
    SearchPosition,
}

/// A single time-sampled observation of a tracked feature.
///
/// `pos` is in frame-unified (0..1) space; the four pattern corners and the
/// axis-aligned search window are offsets from `pos` in the same units. The
/// search window always contains the pattern bounding box, which is enforced
/// by [`Marker::clamp`] after any user edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Frame number, clip space
    pub frame: i32,
    /// Position in frame-unified coordinates
    pub pos: Vec2,
    /// Four corner offsets from `pos`; the quad may be non-axis-aligned
    pub pattern_corners: [Vec2; 4],
    /// Lower bound of the search window, offset from `pos`
    pub search_min: Vec2,
    /// Upper bound of the search window, offset from `pos`
    pub search_max: Vec2,
    pub flags: MarkerFlags,
}

impl Marker {
    /// New marker at the given position with zero-size regions.
    pub fn new(frame: i32, pos: Vec2) -> Self {
        Self {
            frame,
            pos,
            pattern_corners: [Vec2::ZERO; 4],
            search_min: Vec2::ZERO,
            search_max: Vec2::ZERO,
            flags: MarkerFlags::empty(),
        }
    }

    /// New marker with an axis-aligned pattern of half-size `pat` and a
    /// search window of half-size `search`, both centered on `pos`.
    pub fn with_regions(frame: i32, pos: Vec2, pat: Vec2, search: Vec2) -> Self {
        Self {
            frame,
            pos,
            pattern_corners: [
                Vec2::new(-pat.x, -pat.y),
                Vec2::new(pat.x, -pat.y),
                Vec2::new(pat.x, pat.y),
                Vec2::new(-pat.x, pat.y),
            ],
            search_min: -search,
            search_max: search,
            flags: MarkerFlags::empty(),
        }
    }

    /// Copy of this marker placed at another frame.
    pub fn at_frame(&self, frame: i32) -> Self {
        Self { frame, ..*self }
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.contains(MarkerFlags::DISABLED)
    }

    pub fn is_keyframed(&self) -> bool {
        !self.flags.intersects(MarkerFlags::TRACKED | MarkerFlags::DISABLED)
    }

    /// Componentwise min/max over the four pattern corners.
    pub fn pattern_bounds(&self) -> (Vec2, Vec2) {
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for corner in &self.pattern_corners {
            min = min.min(*corner);
            max = max.max(*corner);
        }
        (min, max)
    }

    /// Re-establish the `search ⊇ pattern bbox` invariant after an edit.
    ///
    /// The event tells which region moved or resized, so the other one can
    /// be adjusted with the least disturbance: resizes grow the search area,
    /// a pattern move translates the corners back inside, a search move
    /// keeps the search dimensions and slides the window over the pattern.
    pub fn clamp(&mut self, event: ClampEvent) {
        let (pat_min, pat_max) = self.pattern_bounds();

        match event {
            ClampEvent::PatternDimension | ClampEvent::SearchDimension => {
                // search shouldn't be resized smaller than pattern
                self.search_min = self.search_min.min(pat_min);
                self.search_max = self.search_max.max(pat_max);
            }
            ClampEvent::PatternPosition => {
                // pattern shouldn't be moved outside of search
                for axis in 0..2 {
                    if pat_min[axis] < self.search_min[axis] {
                        let delta = self.search_min[axis] - pat_min[axis];
                        for corner in &mut self.pattern_corners {
                            corner[axis] += delta;
                        }
                    }
                    if pat_max[axis] > self.search_max[axis] {
                        let delta = pat_max[axis] - self.search_max[axis];
                        for corner in &mut self.pattern_corners {
                            corner[axis] -= delta;
                        }
                    }
                }
            }
            ClampEvent::SearchPosition => {
                // search shouldn't be moved inside pattern
                let dim = self.search_max - self.search_min;

                for axis in 0..2 {
                    if self.search_min[axis] > pat_min[axis] {
                        self.search_min[axis] = pat_min[axis];
                        self.search_max[axis] = self.search_min[axis] + dim[axis];
                    }
                    if self.search_max[axis] < pat_max[axis] {
                        self.search_max[axis] = pat_max[axis];
                        self.search_min[axis] = self.search_max[axis] - dim[axis];
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_with_bounds(pat: f32, search: f32) -> Marker {
        Marker::with_regions(
            1,
            Vec2::new(0.5, 0.5),
            Vec2::splat(pat),
            Vec2::splat(search),
        )
    }

    #[test]
    fn test_pattern_bounds() {
        let marker = marker_with_bounds(0.1, 0.2);
        let (min, max) = marker.pattern_bounds();
        assert_eq!(min, Vec2::splat(-0.1));
        assert_eq!(max, Vec2::splat(0.1));
    }

    #[test]
    fn test_clamp_pattern_dimension_grows_search() {
        // pattern bbox [-0.1, 0.1], search only [-0.05, 0.05]
        let mut marker = marker_with_bounds(0.1, 0.05);
        marker.clamp(ClampEvent::PatternDimension);

        assert_eq!(marker.search_min, Vec2::splat(-0.1));
        assert_eq!(marker.search_max, Vec2::splat(0.1));
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let mut marker = marker_with_bounds(0.1, 0.05);
        marker.clamp(ClampEvent::PatternDimension);
        let once = marker;
        marker.clamp(ClampEvent::PatternDimension);
        assert_eq!(marker, once);
    }

    #[test]
    fn test_clamp_pattern_position_translates_all_corners() {
        let mut marker = marker_with_bounds(0.1, 0.2);
        for corner in &mut marker.pattern_corners {
            corner.x += 0.15; // leak past search_max.x = 0.2
        }
        marker.clamp(ClampEvent::PatternPosition);

        let (pat_min, pat_max) = marker.pattern_bounds();
        assert!(pat_max.x <= marker.search_max.x + 1e-6);
        assert!(pat_min.x >= marker.search_min.x - 1e-6);
        // quad shape is preserved
        let width = marker.pattern_corners[1].x - marker.pattern_corners[0].x;
        assert!((width - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_search_position_preserves_dimensions() {
        let mut marker = marker_with_bounds(0.1, 0.2);
        marker.search_min += Vec2::new(0.3, 0.0);
        marker.search_max += Vec2::new(0.3, 0.0);
        let dim = marker.search_max - marker.search_min;

        marker.clamp(ClampEvent::SearchPosition);

        let new_dim = marker.search_max - marker.search_min;
        assert!((dim - new_dim).length() < 1e-6);
        let (pat_min, pat_max) = marker.pattern_bounds();
        assert!(marker.search_min.x <= pat_min.x);
        assert!(marker.search_max.x >= pat_max.x);
    }

    #[test]
    fn test_keyframed_excludes_tracked_and_disabled() {
        let mut marker = marker_with_bounds(0.1, 0.2);
        assert!(marker.is_keyframed());
        marker.flags |= MarkerFlags::TRACKED;
        assert!(!marker.is_keyframed());
        marker.flags = MarkerFlags::DISABLED;
        assert!(!marker.is_keyframed());
    }
}
