use serde::Serialize;

use super::entry::{EntryInfo, TrackEntry};
use crate::common::{ChannelId, EntryId, GuildId};

/// Engine state. A current entry exists exactly when playing or paused.
#[derive(Debug, Clone, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Playing(TrackEntry),
    Paused(TrackEntry),
}

impl EngineState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Playing(_) => Phase::Playing,
            Self::Paused(_) => Phase::Paused,
        }
    }

    pub fn current(&self) -> Option<&TrackEntry> {
        match self {
            Self::Idle => None,
            Self::Playing(entry) | Self::Paused(entry) => Some(entry),
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut TrackEntry> {
        match self {
            Self::Idle => None,
            Self::Playing(entry) | Self::Paused(entry) => Some(entry),
        }
    }

    pub fn current_id(&self) -> Option<EntryId> {
        self.current().map(|e| e.id)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Leaves `Idle` behind and returns the entry that was current.
    pub fn take(&mut self) -> Option<TrackEntry> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Playing(entry) | Self::Paused(entry) => Some(entry),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Playing,
    Paused,
}

/// Point-in-time view of one guild's engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub guild_id: GuildId,
    pub phase: Phase,
    pub current: Option<EntryInfo>,
    pub queue: Vec<EntryInfo>,
    pub repeat: bool,
    pub target: Option<ChannelId>,
}

/// The subset of engine state the reaper needs on every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub phase: Phase,
    pub queue_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::UserId, protocol::TrackHandle};

    #[test]
    fn test_take_returns_to_idle() {
        let entry = TrackEntry::new(TrackHandle::new("https://a", "A", 10), UserId(1));
        let id = entry.id;
        let mut state = EngineState::Paused(entry);

        assert_eq!(state.phase(), Phase::Paused);
        assert_eq!(state.current_id(), Some(id));
        assert_eq!(state.take().map(|e| e.id), Some(id));
        assert!(state.is_idle());
        assert!(state.take().is_none());
    }
}
