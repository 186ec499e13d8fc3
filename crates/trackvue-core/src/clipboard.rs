//! Track clipboard: detached copies of selected tracks

use serde::{Deserialize, Serialize};

use crate::object::Tracking;
use crate::track::{unique_name, Track, TrackFlags};

/// Owns detached copies of tracks between a copy and a paste.
///
/// The clipboard is a value owned by the calling session rather than process
/// state, so two sessions never share one. Paste hands out deep copies with
/// fresh identities, the clipboard content stays reusable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackClipboard {
    tracks: Vec<Track>,
}

impl TrackClipboard {
    /// Replace the clipboard content with copies of the selected, visible
    /// tracks of the given object.
    pub fn copy_selected(&mut self, tracking: &Tracking, object_index: usize) {
        self.tracks.clear();

        for track in tracking.object_tracks(object_index) {
            if track.is_selected() && !track.flags.contains(TrackFlags::HIDDEN) {
                self.tracks.push(track.clone());
            }
        }
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Paste deep copies into the given object's track list. Names are kept
    /// unique, pasted tracks get fresh identities.
    pub fn paste(&self, tracking: &mut Tracking, object_index: usize) {
        for track in &self.tracks {
            let mut new_track = track.clone();
            new_track.id = tracking.allocate_track_id();

            let tracks = tracking.object_tracks_mut(object_index);
            new_track.name = unique_name(
                tracks.iter().map(|t| t.name.as_str()),
                &new_track.name,
                "Track",
            );
            tracks.push(new_track);
        }

        tracking.dopesheet_tag_update();
    }
}
