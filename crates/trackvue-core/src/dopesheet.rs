//! Dopesheet: per-track tracked segments and per-frame coverage

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::object::Tracking;
use crate::track::{Track, TrackId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct DopesheetFlags: u8 {
        /// Only list selected tracks
        const SELECTED_ONLY = 1 << 0;
        /// Include hidden tracks
        const SHOW_HIDDEN = 1 << 1;
        /// Reverse the channel sort order
        const SORT_INVERSE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DopesheetSort {
    #[default]
    Name,
    /// Longest tracked segment first
    Longest,
    /// Total tracked frames
    Total,
    /// Average reprojection error
    AverageError,
}

/// How well a frame is covered by enabled markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Coverage {
    Bad,
    Acceptable,
    Ok,
}

/// Coverage class from the number of enabled markers on a frame.
pub fn coverage_from_count(count: usize) -> Coverage {
    if count < 8 {
        Coverage::Bad
    } else if count < 16 {
        Coverage::Acceptable
    } else {
        Coverage::Ok
    }
}

/// One dopesheet row: the tracked segments of a single track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DopesheetChannel {
    pub track: TrackId,
    /// Display name; includes the reprojection error once reconstructed
    pub name: String,
    /// `(first_frame, last_frame)` of each maximal run of consecutive
    /// enabled markers
    pub segments: Vec<(i32, i32)>,
    /// Length of the longest segment
    pub max_segment: i32,
    /// Sum of all segment lengths
    pub total_frames: i32,
    /// Track reprojection error at calculation time, used for sorting
    pub error: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSegment {
    pub coverage: Coverage,
    pub start_frame: i32,
    pub end_frame: i32,
}

/// Lazily rebuilt summary of the active object's tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dopesheet {
    /// Cache validity; cleared by [`Tracking::dopesheet_tag_update`]
    #[serde(skip)]
    pub ok: bool,
    pub sort_method: DopesheetSort,
    pub flags: DopesheetFlags,
    #[serde(skip)]
    pub channels: Vec<DopesheetChannel>,
    #[serde(skip)]
    pub coverage_segments: Vec<CoverageSegment>,
}

/// Maximal runs of consecutive enabled markers of one track:
/// `(first_frame, last_frame, max_len, total)`.
fn track_segments(track: &Track) -> (Vec<(i32, i32)>, i32, i32) {
    let markers = track.markers();
    let mut segments = Vec::new();
    let mut max_segment = 0;
    let mut total_frames = 0;

    let mut i = 0;
    while i < markers.len() {
        if !markers[i].is_disabled() {
            let start_frame = markers[i].frame;
            let mut prev_frame = start_frame;
            let mut len = 0;

            i += 1;
            while i < markers.len() {
                if markers[i].frame != prev_frame + 1 || markers[i].is_disabled() {
                    break;
                }
                prev_frame = markers[i].frame;
                len += 1;
                i += 1;
            }

            segments.push((start_frame, start_frame + len));
            max_segment = max_segment.max(len);
            total_frames += len;
        }

        i += 1;
    }

    (segments, max_segment, total_frames)
}

impl Tracking {
    /// Tag the dopesheet for rebuild; the rebuild happens on the next
    /// [`Tracking::dopesheet_update`] call.
    pub fn dopesheet_tag_update(&mut self) {
        self.dopesheet.ok = false;
    }

    /// Rebuild channels, sort order and coverage. No-op while the cache is
    /// valid.
    pub fn dopesheet_update(&mut self) {
        if self.dopesheet.ok {
            return;
        }

        let reconstructed = self.active_reconstruction().is_reconstructed();
        let flags = self.dopesheet.flags;

        let mut channels = Vec::new();
        for track in self.active_tracks() {
            if !flags.contains(DopesheetFlags::SHOW_HIDDEN)
                && track.flags.contains(crate::TrackFlags::HIDDEN)
            {
                continue;
            }
            if flags.contains(DopesheetFlags::SELECTED_ONLY) && !track.is_selected() {
                continue;
            }

            let (segments, max_segment, total_frames) = track_segments(track);
            let name = if reconstructed {
                format!("{} ({:.4})", track.name, track.error)
            } else {
                track.name.clone()
            };

            channels.push(DopesheetChannel {
                track: track.id,
                name,
                segments,
                max_segment,
                total_frames,
                error: track.error,
            });
        }

        sort_channels(
            &mut channels,
            self.dopesheet.sort_method,
            flags.contains(DopesheetFlags::SORT_INVERSE),
        );

        let coverage_segments = calc_coverage(self.active_tracks());

        self.dopesheet.channels = channels;
        self.dopesheet.coverage_segments = coverage_segments;
        self.dopesheet.ok = true;
    }
}

/// Stable sort of the channel list by the chosen key, ascending; `inverse`
/// reverses the order.
fn sort_channels(channels: &mut [DopesheetChannel], method: DopesheetSort, inverse: bool) {
    match method {
        DopesheetSort::Name => {
            channels.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
            });
        }
        DopesheetSort::Longest => channels.sort_by_key(|c| c.max_segment),
        DopesheetSort::Total => channels.sort_by_key(|c| c.total_frames),
        DopesheetSort::AverageError => {
            channels.sort_by(|a, b| a.error.total_cmp(&b.error));
        }
    }

    if inverse {
        channels.reverse();
    }
}

/// Per-frame coverage classes collapsed into segments over the global frame
/// range of the given track list.
fn calc_coverage(tracks: &[Track]) -> Vec<CoverageSegment> {
    let mut start_frame = i32::MAX;
    let mut end_frame = i32::MIN;

    for track in tracks {
        let markers = track.markers();
        if let (Some(first), Some(last)) = (markers.first(), markers.last()) {
            start_frame = start_frame.min(first.frame);
            end_frame = end_frame.max(last.frame);
        }
    }

    if start_frame > end_frame {
        return Vec::new();
    }

    let frames = (end_frame - start_frame + 1) as usize;
    let mut per_frame_counter = vec![0usize; frames];

    for track in tracks {
        for marker in track.markers() {
            if !marker.is_disabled() {
                per_frame_counter[(marker.frame - start_frame) as usize] += 1;
            }
        }
    }

    let mut segments = Vec::new();
    let mut prev_coverage = coverage_from_count(per_frame_counter[0]);
    let mut last_segment_frame = start_frame;

    // only disabled tracks in the beginning, can be ignored
    if per_frame_counter[0] == 0 {
        prev_coverage = Coverage::Ok;
    }

    for i in 1..frames {
        let mut coverage = coverage_from_count(per_frame_counter[i]);

        // only disabled tracks in the end, can be ignored
        if i == frames - 1 && per_frame_counter[i] == 0 {
            coverage = Coverage::Ok;
        }

        if coverage != prev_coverage || i == frames - 1 {
            let mut end_segment_frame = i as i32 - 1 + start_frame;

            if end_segment_frame == last_segment_frame {
                end_segment_frame += 1;
            }

            segments.push(CoverageSegment {
                coverage: prev_coverage,
                start_frame: last_segment_frame,
                end_frame: end_segment_frame,
            });

            last_segment_frame = end_segment_frame;
        }

        prev_coverage = coverage;
    }

    segments
}

/// Per-frame coverage classes over the global range, keyed by frame number.
/// Convenience for tests and the CLI coverage table.
pub fn coverage_per_frame(tracks: &[Track]) -> Vec<(i32, Coverage)> {
    let mut start_frame = i32::MAX;
    let mut end_frame = i32::MIN;

    for track in tracks {
        let markers = track.markers();
        if let (Some(first), Some(last)) = (markers.first(), markers.last()) {
            start_frame = start_frame.min(first.frame);
            end_frame = end_frame.max(last.frame);
        }
    }

    if start_frame > end_frame {
        return Vec::new();
    }

    (start_frame..=end_frame)
        .map(|frame| {
            let count = tracks
                .iter()
                .filter(|track| track.has_enabled_marker_at(frame))
                .count();
            (frame, coverage_from_count(count))
        })
        .collect()
}
