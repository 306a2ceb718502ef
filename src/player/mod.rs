//! Audio player contract consumed by the playback engine.
//!
//! A player owns one output stream for one guild. It is driven through
//! non-blocking calls and reports lifecycle changes as [`PlayerEvent`]s on
//! the channel handed to it by its [`PlayerFactory`]. Every event carries
//! the [`EntryId`] the track was started with, so the engine can discard
//! events about tracks it has already moved past.

pub mod clock;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use clock::{ClockPlayer, ClockPlayerFactory};

use crate::{
    common::{EntryId, GuildId},
    protocol::TrackHandle,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("track cannot be played: {0}")]
    InvalidTrack(String),
    #[error("player is shut down")]
    Closed,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// Played to completion.
    Finished,
    /// Failed to load or decode.
    LoadFailed,
    /// Stopped by a `stop()` call.
    Stopped,
    /// Another track was started over it.
    Replaced,
    /// The player was torn down.
    Cleanup,
}

impl TrackEndReason {
    /// Whether the next queued track should start after this end.
    pub fn may_start_next(self) -> bool {
        matches!(self, Self::Finished | Self::LoadFailed)
    }
}

/// Lifecycle events emitted by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Started {
        token: EntryId,
    },
    Ended {
        token: EntryId,
        reason: TrackEndReason,
        may_start_next: bool,
    },
    Failed {
        token: EntryId,
        message: String,
    },
}

impl PlayerEvent {
    pub fn ended(token: EntryId, reason: TrackEndReason) -> Self {
        Self::Ended {
            token,
            reason,
            may_start_next: reason.may_start_next(),
        }
    }

    pub fn token(&self) -> EntryId {
        match self {
            Self::Started { token } | Self::Ended { token, .. } | Self::Failed { token, .. } => {
                *token
            }
        }
    }
}

/// One concurrent output stream. Calls must not block: they are made while
/// the engine holds its per-guild lock.
pub trait AudioPlayer: Send + Sync {
    /// Start `track`, replacing whatever is playing. Events for this track
    /// carry `token`.
    fn start_track(&self, track: &TrackHandle, token: EntryId) -> Result<(), PlayerError>;

    /// Stop the current track. The player reports it with an `Ended` event.
    fn stop(&self);

    fn set_paused(&self, paused: bool);

    fn is_paused(&self) -> bool;

    /// Position of the current track in milliseconds.
    fn position_ms(&self) -> u64;
}

/// Creates the player for a guild, wired to the engine's event channel.
pub trait PlayerFactory: Send + Sync {
    fn create(&self, guild_id: GuildId, events: flume::Sender<PlayerEvent>) -> Arc<dyn AudioPlayer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_natural_ends_start_next() {
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(TrackEndReason::LoadFailed.may_start_next());
        assert!(!TrackEndReason::Stopped.may_start_next());
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(!TrackEndReason::Cleanup.may_start_next());
    }

    #[test]
    fn test_ended_helper_fills_flag() {
        let token = EntryId::generate();
        assert_eq!(
            PlayerEvent::ended(token, TrackEndReason::Stopped),
            PlayerEvent::Ended {
                token,
                reason: TrackEndReason::Stopped,
                may_start_next: false,
            }
        );
        assert_eq!(PlayerEvent::ended(token, TrackEndReason::Finished).token(), token);
    }
}
