//! Queue store
//!
//! Holds the queue in load order, the shuffled permutation over it, the
//! cursor, and the buffer of recommended tracks waiting to be appended:
//!
//! ```text
//! original:  [A] [B] [C] [D]          load order, grows with recommendations
//! shuffled:  [2] [0] [3] [1]          positions into `original`
//! current:        ^                   index into whichever order is active
//! buffer:    [R1] [R2]                recommended for D, not yet appended
//! ```

use crate::shuffle::{reshuffle_tail, shuffled_positions, shuffled_with_pinned};
use crate::types::{LoadOptions, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct QueueStore {
    /// Tracks in load order
    original: Vec<Track>,

    /// Permutation of positions into `original`; empty when not shuffled
    shuffled: Vec<usize>,

    /// Whether the shuffled order is the active one
    is_shuffled: bool,

    /// Index into the active order
    current: Option<usize>,

    /// Recommended continuation for the last original track
    recommendations: Vec<Track>,

    rng: StdRng,
}

impl QueueStore {
    /// Create an empty store; `seed` fixes the shuffle sequence
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            original: Vec::new(),
            shuffled: Vec::new(),
            is_shuffled: false,
            current: None,
            recommendations: Vec::new(),
            rng,
        }
    }

    /// Replace the queue
    ///
    /// Unplayable tracks are dropped. `options.start_index` refers to the list
    /// as supplied; if that track was dropped playback starts at the top.
    /// While shuffled, a direct click pins the clicked track to the first
    /// shuffled slot, otherwise the whole queue is shuffled and playback starts
    /// at whatever lands first.
    ///
    /// Returns the new current index.
    pub fn load(&mut self, tracks: Vec<Track>, options: &LoadOptions) -> Option<usize> {
        let mut start = None;
        self.original.clear();
        for (i, track) in tracks.into_iter().enumerate() {
            if !track.is_playable() {
                continue;
            }
            if i == options.start_index {
                start = Some(self.original.len());
            }
            self.original.push(track);
        }

        self.recommendations.clear();
        self.shuffled.clear();

        if self.original.is_empty() {
            self.current = None;
            return None;
        }

        let start = start.unwrap_or(0);
        if self.is_shuffled {
            if options.direct_click {
                self.shuffled = shuffled_with_pinned(self.original.len(), start, &mut self.rng);
            } else {
                self.shuffled = shuffled_positions(self.original.len(), &mut self.rng);
            }
            self.current = Some(0);
        } else {
            self.current = Some(start);
        }

        self.current
    }

    /// Switch shuffle on or off without changing the current track
    ///
    /// Turning shuffle on builds a fresh permutation and moves the cursor to
    /// wherever the current track landed in it. Returns `false` if the mode
    /// was already `enabled`.
    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        if self.is_shuffled == enabled {
            return false;
        }

        let playing = self.current.and_then(|c| self.original_position(c));

        if enabled {
            self.shuffled = shuffled_positions(self.original.len(), &mut self.rng);
            self.is_shuffled = true;
            self.current = playing.and_then(|p| self.shuffled.iter().position(|&s| s == p));
        } else {
            self.shuffled.clear();
            self.is_shuffled = false;
            self.current = playing;
        }

        true
    }

    /// Flip shuffle mode, returning the new mode
    pub fn toggle_shuffle(&mut self) -> bool {
        let enabled = !self.is_shuffled;
        self.set_shuffle(enabled);
        enabled
    }

    pub fn is_shuffled(&self) -> bool {
        self.is_shuffled
    }

    /// Position in `original` of the track at active index `index`
    pub fn original_position(&self, index: usize) -> Option<usize> {
        if self.is_shuffled {
            self.shuffled.get(index).copied()
        } else if index < self.original.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Track at active index `index`
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.original_position(index).and_then(|p| self.original.get(p))
    }

    /// Tracks in the order they will play
    pub fn active_queue(&self) -> Vec<&Track> {
        if self.is_shuffled {
            self.shuffled.iter().filter_map(|&p| self.original.get(p)).collect()
        } else {
            self.original.iter().collect()
        }
    }

    /// Tracks in load order
    pub fn original_queue(&self) -> &[Track] {
        &self.original
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|c| self.track_at(c))
    }

    /// Move the cursor; out-of-range indices are refused
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    /// Whether the cursor sits on the last slot of the active order
    pub fn is_at_end(&self) -> bool {
        match self.current {
            Some(c) => c + 1 == self.len(),
            None => false,
        }
    }

    /// The track recommendations are fetched for
    pub fn last_original_track(&self) -> Option<&Track> {
        self.original.last()
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    // ===== Recommendation buffer =====

    /// Fill the buffer, keeping only playable tracks not already queued
    ///
    /// Returns how many tracks were buffered.
    pub fn set_recommendations(&mut self, tracks: Vec<Track>) -> usize {
        self.recommendations = self.fresh_tracks(tracks);
        self.recommendations.len()
    }

    pub fn has_recommendations(&self) -> bool {
        !self.recommendations.is_empty()
    }

    pub fn recommendations(&self) -> &[Track] {
        &self.recommendations
    }

    pub fn clear_recommendations(&mut self) {
        self.recommendations.clear();
    }

    /// Append tracks to the queue, skipping ids that are already present
    ///
    /// While shuffled, the new tracks are mixed into the unplayed tail only;
    /// everything up to and including the current slot keeps its place.
    /// Returns how many tracks were added.
    pub fn extend_with_recommendations(&mut self, tracks: Vec<Track>) -> usize {
        let fresh = self.fresh_tracks(tracks);
        if fresh.is_empty() {
            return 0;
        }

        let first_new = self.original.len();
        let added = fresh.len();
        self.original.extend(fresh);

        if self.is_shuffled {
            let keep = self.current.map_or(0, |c| c + 1);
            reshuffle_tail(
                &mut self.shuffled,
                keep,
                first_new..first_new + added,
                &mut self.rng,
            );
        }

        added
    }

    /// Move the buffered recommendations into the queue
    pub fn fold_in_recommendations(&mut self) -> usize {
        let buffered = std::mem::take(&mut self.recommendations);
        self.extend_with_recommendations(buffered)
    }

    /// Restart from the top for looping playback
    ///
    /// Shuffled queues absorb the buffer and get a brand new permutation;
    /// ordered queues simply drop the buffer.
    pub fn wrap_for_loop(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        if self.is_shuffled {
            let buffered = std::mem::take(&mut self.recommendations);
            let fresh = self.fresh_tracks(buffered);
            self.original.extend(fresh);
            self.shuffled = shuffled_positions(self.original.len(), &mut self.rng);
        } else {
            self.recommendations.clear();
        }

        self.current = Some(0);
        self.current
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.original.clear();
        self.shuffled.clear();
        self.recommendations.clear();
        self.current = None;
    }

    fn fresh_tracks(&self, tracks: Vec<Track>) -> Vec<Track> {
        let mut seen: HashSet<String> = self.original.iter().map(|t| t.id.clone()).collect();
        tracks
            .into_iter()
            .filter(|t| t.is_playable() && seen.insert(t.id.clone()))
            .collect()
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new(None)
    }
}
