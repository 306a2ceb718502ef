use std::time::{Duration, Instant};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    common::{GuildId, UserId},
    protocol::TrackHandle,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChoiceError {
    #[error("no pending choice for this user")]
    NoPending,
    #[error("choice {index} is out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct PendingSession {
    pub query: String,
    pub choices: Vec<TrackHandle>,
    created: Instant,
}

impl PendingSession {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

/// Search results waiting for the requester to pick one, keyed by
/// (guild, requester). A newer search replaces an older one.
pub struct PendingSessions {
    sessions: DashMap<(GuildId, UserId), PendingSession>,
    ttl: Duration,
}

impl PendingSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        query: impl Into<String>,
        choices: Vec<TrackHandle>,
    ) {
        self.sessions.insert(
            (guild_id, user_id),
            PendingSession {
                query: query.into(),
                choices,
                created: Instant::now(),
            },
        );
    }

    /// Takes choice `index` (0-based) and consumes the session. An
    /// out-of-range index leaves the session in place.
    pub fn choose(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        index: usize,
    ) -> Result<TrackHandle, ChoiceError> {
        match self.sessions.entry((guild_id, user_id)) {
            Entry::Vacant(_) => Err(ChoiceError::NoPending),
            Entry::Occupied(entry) => {
                if entry.get().is_expired(self.ttl) {
                    entry.remove();
                    return Err(ChoiceError::NoPending);
                }
                let len = entry.get().choices.len();
                if index >= len {
                    return Err(ChoiceError::OutOfRange { index: index + 1, len });
                }
                Ok(entry.remove().choices.swap_remove(index))
            }
        }
    }

    pub fn cancel(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.sessions.remove(&(guild_id, user_id)).is_some()
    }

    /// Drops expired sessions and returns how many went.
    pub fn evict_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(self.ttl));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
