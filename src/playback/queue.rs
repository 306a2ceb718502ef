use std::collections::VecDeque;

use rand::seq::SliceRandom;

use super::entry::TrackEntry;

/// Strict FIFO of entries waiting to play. Insertion order is play order;
/// only `shuffle` and explicit removal change it.
///
/// Not synchronized on its own: the owning engine's lock serializes all
/// access.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    entries: VecDeque<TrackEntry>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, entry: TrackEntry) {
        self.entries.push_back(entry);
    }

    pub fn dequeue_next(&mut self) -> Option<TrackEntry> {
        self.entries.pop_front()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, index: usize) -> Option<TrackEntry> {
        self.entries.remove(index)
    }

    pub fn shuffle(&mut self) {
        self.entries
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackEntry> {
        self.entries.iter()
    }
}
