use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Abandoned-session sweep settings. Strike thresholds count consecutive
/// sweeps a condition must hold before the guild is torn down.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReaperConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Idle, empty queue and no voice connection.
    #[serde(default = "default_empty_strikes")]
    pub empty_strikes: u32,
    /// Paused.
    #[serde(default = "default_paused_strikes")]
    pub paused_strikes: u32,
    /// Playing to a channel without listeners.
    #[serde(default = "default_alone_strikes")]
    pub alone_strikes: u32,
    /// Idle with an empty queue while still connected to voice.
    #[serde(default = "default_idle_strikes")]
    pub idle_strikes: u32,
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            empty_strikes: default_empty_strikes(),
            paused_strikes: default_paused_strikes(),
            alone_strikes: default_alone_strikes(),
            idle_strikes: default_idle_strikes(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_empty_strikes() -> u32 {
    5
}

fn default_paused_strikes() -> u32 {
    60
}

fn default_alone_strikes() -> u32 {
    12
}

fn default_idle_strikes() -> u32 {
    24
}
