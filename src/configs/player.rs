use serde::{Deserialize, Serialize};

/// Per-guild playback engine settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// A playing track whose position does not move for this long is
    /// reported as stuck and skipped.
    #[serde(default = "default_stuck_threshold_ms")]
    pub stuck_threshold_ms: u64,
    /// Position poller period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Tear the guild down once its queue runs dry.
    #[serde(default = "default_true")]
    pub leave_on_queue_end: bool,
    /// Upper bound on queued (not playing) entries. 0 disables the limit.
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,
    /// Fraction of listeners whose votes skip the current track.
    #[serde(default = "default_vote_skip_ratio")]
    pub vote_skip_ratio: f32,
    /// Capacity of the outbound notification channel.
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stuck_threshold_ms: default_stuck_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            leave_on_queue_end: true,
            max_queue_length: default_max_queue_length(),
            vote_skip_ratio: default_vote_skip_ratio(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

fn default_stuck_threshold_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_max_queue_length() -> usize {
    1_000
}

fn default_vote_skip_ratio() -> f32 {
    0.5
}

fn default_notification_buffer() -> usize {
    1_024
}
