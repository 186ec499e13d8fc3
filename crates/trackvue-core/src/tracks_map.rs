//! Thread-safe track snapshots for long-running operations
//!
//! Tracking and solving can run while the user keeps editing the clip, so
//! they never work on live tracks. A [`TracksMap`] holds deep copies of the
//! tracks an operation touches plus one customdata slot per track, and knows
//! how to merge the mutated copies back without losing edits the user made
//! in the meantime.

use std::collections::{HashMap, HashSet};

use crate::object::Tracking;
use crate::track::{unique_name, Track, TrackFlags, TrackId};

/// Snapshot of the tracks a long-running operation mutates.
///
/// `C` is per-track scratch state owned by the operation (reference patches
/// for tracking, nothing for solving). Snapshot tracks keep the [`TrackId`]
/// of their originals; the id doubles as the link back to the live track on
/// merge, and keeps the session's active/rotation track references valid
/// across the merge without rebinding.
#[derive(Debug)]
pub struct TracksMap<C> {
    object_name: String,
    is_camera: bool,
    entries: Vec<(Track, C)>,
}

impl<C> TracksMap<C> {
    pub fn new(object_name: &str, is_camera: bool) -> Self {
        Self {
            object_name: object_name.to_string(),
            is_camera,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_camera(&self) -> bool {
        self.is_camera
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Deep-copy `track` into the snapshot together with its customdata.
    pub fn insert(&mut self, track: &Track, customdata: C) {
        self.entries.push((track.clone(), customdata));
    }

    pub fn get(&self, index: usize) -> (&Track, &C) {
        let (track, customdata) = &self.entries[index];
        (track, customdata)
    }

    pub fn entries_mut(&mut self) -> &mut [(Track, C)] {
        &mut self.entries
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter().map(|(track, _)| track)
    }

    /// Merge the snapshot back into the live session.
    ///
    /// For every snapshot track whose original still exists, the original's
    /// selection state is carried over to the copy and the original is
    /// dropped; originals the operation never touched are preserved as they
    /// are. Names are deduplicated against the recombined list, so tracks
    /// the user created during the operation keep their names.
    pub fn merge(&self, tracking: &mut Tracking) {
        let object_index = if self.is_camera {
            tracking
                .objects
                .iter()
                .position(|object| object.is_camera())
                .unwrap_or(0)
        } else {
            match tracking.object_get_named(&self.object_name) {
                Some((index, _)) => index,
                // object was deleted by the user, create a new one
                None => tracking.object_add(&self.object_name),
            }
        };

        let operated: HashSet<TrackId> = self.entries.iter().map(|(track, _)| track.id).collect();

        let old_tracks = std::mem::take(tracking.object_tracks_mut(object_index));
        let mut new_tracks: Vec<Track> =
            Vec::with_capacity(old_tracks.len() + self.entries.len());

        // user-facing flags of the originals the operation replaced
        let mut live_flags: HashMap<TrackId, (TrackFlags, TrackFlags, TrackFlags)> =
            HashMap::new();

        for track in old_tracks {
            if operated.contains(&track.id) {
                live_flags.insert(track.id, (track.flags, track.pat_flags, track.search_flags));
            } else {
                new_tracks.push(track);
            }
        }

        for (track, _) in &self.entries {
            let mut copy = track.clone();

            if let Some((flags, pat_flags, search_flags)) = live_flags.get(&copy.id) {
                copy.flags = *flags;
                copy.pat_flags = *pat_flags;
                copy.search_flags = *search_flags;
            }

            copy.name = unique_name(
                new_tracks.iter().map(|t| t.name.as_str()),
                &copy.name,
                "Track",
            );
            new_tracks.push(copy);
        }

        *tracking.object_tracks_mut(object_index) = new_tracks;
        tracking.dopesheet_tag_update();
    }
}
