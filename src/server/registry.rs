use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::Notifier;
use crate::{
    common::GuildId,
    configs::PlayerConfig,
    playback::PlaybackEngine,
    player::PlayerFactory,
    voice::VoiceTransport,
};

/// Guild id to engine map. The only cross-guild synchronization point:
/// creation and removal are short, atomic map operations and no playback
/// logic runs under a map lock.
pub struct SessionRegistry {
    engines: DashMap<GuildId, Arc<PlaybackEngine>>,
    players: Arc<dyn PlayerFactory>,
    voice: Arc<dyn VoiceTransport>,
    notifier: Notifier,
    config: PlayerConfig,
}

impl SessionRegistry {
    pub fn new(
        players: Arc<dyn PlayerFactory>,
        voice: Arc<dyn VoiceTransport>,
        notifier: Notifier,
        config: PlayerConfig,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            players,
            voice,
            notifier,
            config,
        }
    }

    /// Returns the guild's engine, creating it on first use. Concurrent
    /// first calls all observe the same engine.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<PlaybackEngine> {
        if let Some(engine) = self.get(guild_id) {
            return engine;
        }
        self.engines
            .entry(guild_id)
            .or_insert_with(|| {
                info!("[{}] creating playback engine", guild_id);
                PlaybackEngine::spawn(
                    guild_id,
                    self.players.as_ref(),
                    self.notifier.clone(),
                    self.config.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackEngine>> {
        self.engines.get(&guild_id).map(|e| e.value().clone())
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.engines.contains_key(&guild_id)
    }

    /// Snapshot of the current engines; the map is not locked afterwards.
    pub fn engines(&self) -> Vec<(GuildId, Arc<PlaybackEngine>)> {
        self.engines
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn voice(&self) -> &Arc<dyn VoiceTransport> {
        &self.voice
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Removes the guild, stops its engine and disconnects voice. Returns
    /// false when the guild was already gone.
    pub async fn teardown(&self, guild_id: GuildId) -> bool {
        self.teardown_if(guild_id, |engine| {
            engine.close();
            true
        })
        .await
    }

    /// Like [`teardown`](Self::teardown), but only if `close` closes the
    /// engine. `close` runs while the map entry is locked, so an engine is
    /// closed exactly when it leaves the map; callers holding the old `Arc`
    /// get [`EngineError::Closed`](crate::playback::EngineError::Closed) on
    /// enqueue instead of feeding an orphan.
    pub async fn teardown_if<F>(&self, guild_id: GuildId, close: F) -> bool
    where
        F: FnOnce(&PlaybackEngine) -> bool,
    {
        let removed = self
            .engines
            .remove_if(&guild_id, |_, engine| close(engine.as_ref()));
        let Some((_, engine)) = removed else {
            debug!("[{}] teardown skipped", guild_id);
            return false;
        };

        engine.shutdown();
        if let Err(e) = self.voice.disconnect(guild_id).await {
            warn!("[{}] voice disconnect during teardown: {}", guild_id, e);
        }
        info!("[{}] session torn down", guild_id);
        true
    }

    pub async fn shutdown_all(&self) {
        let guilds: Vec<GuildId> = self.engines.iter().map(|e| *e.key()).collect();
        futures::future::join_all(guilds.into_iter().map(|guild_id| self.teardown(guild_id))).await;
    }
}
