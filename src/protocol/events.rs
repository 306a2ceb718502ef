use serde::Serialize;

use crate::{
    common::{ChannelId, GuildId, Severity, UserId, now_ms},
    playback::EntryInfo,
    protocol::tracks::TrackHandle,
};

/// Envelope for every outbound notification. The presentation layer
/// renders `event` into a message posted to `target`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub guild_id: GuildId,
    /// Last known notification target; `None` for silent playback.
    pub target: Option<ChannelId>,
    /// Unix timestamp in milliseconds.
    pub time: u64,
    #[serde(flatten)]
    pub event: Notification,
}

impl OutgoingMessage {
    pub fn new(guild_id: GuildId, target: Option<ChannelId>, event: Notification) -> Self {
        Self {
            guild_id,
            target,
            time: now_ms(),
            event,
        }
    }
}

/// Semantic playback events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Notification {
    NowPlaying {
        entry: EntryInfo,
    },
    TrackQueued {
        entry: EntryInfo,
        /// 1-based position in the queue.
        position: usize,
    },
    PlaylistQueued {
        name: Option<String>,
        queued: usize,
        /// Tracks cut off by the queue length limit.
        dropped: usize,
    },
    TrackSkipped {
        entry: EntryInfo,
        requested_by: UserId,
    },
    TrackFailed {
        entry: EntryInfo,
        message: String,
    },
    TrackStuck {
        entry: EntryInfo,
        threshold_ms: u64,
    },
    QueueEnded,
    QueueEndedDueToInactivity {
        reason: IdleReason,
    },
    ChooseTrack {
        requester: UserId,
        choices: Vec<TrackHandle>,
        expires_in_ms: u64,
    },
    NoMatches {
        query: String,
    },
    LoadFailed {
        query: String,
        message: String,
        severity: Severity,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NowPlaying { .. } => "NowPlaying",
            Self::TrackQueued { .. } => "TrackQueued",
            Self::PlaylistQueued { .. } => "PlaylistQueued",
            Self::TrackSkipped { .. } => "TrackSkipped",
            Self::TrackFailed { .. } => "TrackFailed",
            Self::TrackStuck { .. } => "TrackStuck",
            Self::QueueEnded => "QueueEnded",
            Self::QueueEndedDueToInactivity { .. } => "QueueEndedDueToInactivity",
            Self::ChooseTrack { .. } => "ChooseTrack",
            Self::NoMatches { .. } => "NoMatches",
            Self::LoadFailed { .. } => "LoadFailed",
        }
    }

    /// Events the server acts on after delivery. These bypass the
    /// notification buffer limit.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::QueueEnded)
    }
}

/// Why the reaper tore a guild down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdleReason {
    /// Nothing playing, nothing queued, no voice connection.
    QueueEmpty,
    /// Paused for too long.
    Paused,
    /// Playing to an empty channel.
    Alone,
    /// Connected to voice with nothing playing, nothing queued and nobody
    /// to notify or listen.
    Idle,
}

impl std::fmt::Display for IdleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::QueueEmpty => "queue empty",
            Self::Paused => "paused",
            Self::Alone => "no listeners",
            Self::Idle => "idle in voice",
        };
        f.write_str(s)
    }
}
