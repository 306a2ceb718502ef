use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionRegistry;
use crate::{
    common::GuildId,
    configs::ReaperConfig,
    playback::{Activity, Phase},
    protocol::{IdleReason, Notification},
    sources::PendingSessions,
};

/// What one sweep saw of a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub activity: Activity,
    pub connected: bool,
    /// `None` when the voice layer does not know.
    pub listeners: Option<usize>,
}

/// Consecutive sweeps each idle condition has held for one guild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Strikes {
    pub empty: u32,
    pub paused: u32,
    pub alone: u32,
    pub idle: u32,
}

impl Strikes {
    /// Counts one sweep. A counter resets as soon as its condition stops
    /// holding; the first counter to reach its threshold names the reason.
    pub fn observe(&mut self, obs: &Observation, config: &ReaperConfig) -> Option<IdleReason> {
        let drained = obs.activity.phase == Phase::Idle && obs.activity.queue_len == 0;
        let empty = drained && !obs.connected;
        let idle = drained && obs.connected;
        let paused = obs.activity.phase == Phase::Paused;
        let alone = obs.activity.phase == Phase::Playing && obs.listeners == Some(0);

        self.empty = if empty { self.empty + 1 } else { 0 };
        self.idle = if idle { self.idle + 1 } else { 0 };
        self.paused = if paused { self.paused + 1 } else { 0 };
        self.alone = if alone { self.alone + 1 } else { 0 };

        if empty && self.empty >= config.empty_strikes {
            Some(IdleReason::QueueEmpty)
        } else if paused && self.paused >= config.paused_strikes {
            Some(IdleReason::Paused)
        } else if alone && self.alone >= config.alone_strikes {
            Some(IdleReason::Alone)
        } else if idle && self.idle >= config.idle_strikes {
            Some(IdleReason::Idle)
        } else {
            None
        }
    }
}

/// Periodically tears down guilds that stopped being used.
pub struct ActivityReaper {
    registry: Arc<SessionRegistry>,
    pending: Arc<PendingSessions>,
    config: ReaperConfig,
    strikes: HashMap<GuildId, Strikes>,
}

impl ActivityReaper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        pending: Arc<PendingSessions>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            registry,
            pending,
            config,
            strikes: HashMap::new(),
        }
    }

    pub fn strikes(&self, guild_id: GuildId) -> Strikes {
        self.strikes.get(&guild_id).copied().unwrap_or_default()
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            "activity reaper started (every {}s)",
            self.config.interval_secs
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep().await;
                }
            }
        }
        info!("activity reaper stopped");
    }

    /// One pass over every guild. Returns the guilds torn down.
    pub async fn sweep(&mut self) -> Vec<(GuildId, IdleReason)> {
        let evicted = self.pending.evict_expired();
        if evicted > 0 {
            debug!("evicted {} expired track choices", evicted);
        }

        let engines = self.registry.engines();
        let live: HashSet<GuildId> = engines.iter().map(|(g, _)| *g).collect();
        self.strikes.retain(|guild_id, _| live.contains(guild_id));

        let voice = self.registry.voice().clone();
        let mut torn_down = Vec::new();
        for (guild_id, engine) in engines {
            let obs = Observation {
                activity: engine.activity(),
                connected: voice.is_connected(guild_id).await,
                listeners: voice.listener_count(guild_id).await,
            };
            let strikes = self.strikes.entry(guild_id).or_default();
            let Some(reason) = strikes.observe(&obs, &self.config) else {
                continue;
            };

            let target = engine.notification_target();
            let removed = self
                .registry
                .teardown_if(guild_id, |current| {
                    std::ptr::eq(current, engine.as_ref())
                        && current.close_if_unchanged(obs.activity)
                })
                .await;
            self.strikes.remove(&guild_id);
            if removed {
                info!("[{}] left due to inactivity ({})", guild_id, reason);
                self.registry.notifier().notify(
                    guild_id,
                    target,
                    Notification::QueueEndedDueToInactivity { reason },
                );
                torn_down.push((guild_id, reason));
            }
        }
        torn_down
    }
}
