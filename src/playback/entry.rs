use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;

use crate::{
    common::{EntryId, UserId, now_ms},
    protocol::TrackHandle,
};

/// A track plus the request that put it in the queue.
///
/// Clones share the played-time counter, so a snapshot taken from the
/// engine state keeps seeing the position poller's updates.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub id: EntryId,
    pub track: TrackHandle,
    pub requester: UserId,
    pub skip_votes: BTreeSet<UserId>,
    pub queued_at: u64,
    played_ms: Arc<AtomicU64>,
}

impl TrackEntry {
    pub fn new(track: TrackHandle, requester: UserId) -> Self {
        Self {
            id: EntryId::generate(),
            track,
            requester,
            skip_votes: BTreeSet::new(),
            queued_at: now_ms(),
            played_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The copy appended to the queue tail when repeat is on: same track
    /// and requester, fresh identity and counters.
    pub fn requeue(&self) -> Self {
        Self::new(self.track.clone(), self.requester)
    }

    pub fn played_ms(&self) -> u64 {
        self.played_ms.load(Ordering::Relaxed)
    }

    pub fn set_played_ms(&self, ms: u64) {
        self.played_ms.store(ms, Ordering::Relaxed);
    }

    /// Records a vote; returns false if `voter` already voted.
    pub fn add_skip_vote(&mut self, voter: UserId) -> bool {
        self.skip_votes.insert(voter)
    }

    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            id: self.id,
            track: self.track.clone(),
            requester: self.requester,
            skip_votes: self.skip_votes.len(),
            played_ms: self.played_ms(),
            queued_at: self.queued_at,
        }
    }
}

/// Serializable view of a [`TrackEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub id: EntryId,
    pub track: TrackHandle,
    pub requester: UserId,
    pub skip_votes: usize,
    pub played_ms: u64,
    /// Unix timestamp in milliseconds.
    pub queued_at: u64,
}
