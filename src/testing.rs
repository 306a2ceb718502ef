//! Test doubles shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    common::{EntryId, GuildId},
    player::{AudioPlayer, PlayerError, PlayerEvent, PlayerFactory, TrackEndReason},
    protocol::TrackHandle,
};

pub(crate) fn track(title: &str) -> TrackHandle {
    TrackHandle::new(format!("https://example.test/{title}"), title, 180_000)
}

#[derive(Default)]
struct Script {
    started: Vec<(EntryId, String)>,
    current: Option<EntryId>,
    stopped: Vec<EntryId>,
    failing: HashSet<String>,
    paused: bool,
    position: u64,
}

/// Records every call. Refuses to start tracks registered with `fail_on`.
/// With an event sender attached it reports stops like a real player.
#[derive(Default)]
pub(crate) struct ScriptedPlayer {
    script: Mutex<Script>,
    events: Option<flume::Sender<PlayerEvent>>,
}

impl ScriptedPlayer {
    pub(crate) fn with_events(events: flume::Sender<PlayerEvent>) -> Self {
        Self {
            script: Mutex::default(),
            events: Some(events),
        }
    }

    pub(crate) fn fail_on(&self, title: &str) {
        self.script.lock().failing.insert(title.to_string());
    }

    pub(crate) fn started_titles(&self) -> Vec<String> {
        self.script
            .lock()
            .started
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub(crate) fn current(&self) -> Option<EntryId> {
        self.script.lock().current
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.script.lock().stopped.len()
    }

    pub(crate) fn last_stopped(&self) -> Option<EntryId> {
        self.script.lock().stopped.last().copied()
    }

    pub(crate) fn set_position(&self, ms: u64) {
        self.script.lock().position = ms;
    }

    /// Emits a natural finish for the current track.
    pub(crate) fn finish(&self) {
        let token = self.script.lock().current.take();
        if let (Some(token), Some(events)) = (token, &self.events) {
            let _ = events.send(PlayerEvent::ended(token, TrackEndReason::Finished));
        }
    }
}

impl AudioPlayer for ScriptedPlayer {
    fn start_track(&self, track: &TrackHandle, token: EntryId) -> Result<(), PlayerError> {
        let mut script = self.script.lock();
        if script.failing.contains(&track.title) {
            return Err(PlayerError::InvalidTrack(format!("{} is broken", track.title)));
        }
        script.started.push((token, track.title.clone()));
        script.current = Some(token);
        script.paused = false;
        script.position = 0;
        if let Some(events) = &self.events {
            let _ = events.send(PlayerEvent::Started { token });
        }
        Ok(())
    }

    fn stop(&self) {
        let mut script = self.script.lock();
        let Some(token) = script.current.take() else {
            return;
        };
        script.stopped.push(token);
        if let Some(events) = &self.events {
            let _ = events.send(PlayerEvent::ended(token, TrackEndReason::Stopped));
        }
    }

    fn set_paused(&self, paused: bool) {
        self.script.lock().paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.script.lock().paused
    }

    fn position_ms(&self) -> u64 {
        self.script.lock().position
    }
}

/// Hands out [`ScriptedPlayer`]s wired to the engine's event channel and
/// keeps them for inspection.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    created: AtomicUsize,
    players: Mutex<Vec<(GuildId, Arc<ScriptedPlayer>)>>,
}

impl ScriptedFactory {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn player(&self, guild_id: GuildId) -> Option<Arc<ScriptedPlayer>> {
        self.players
            .lock()
            .iter()
            .rev()
            .find(|(g, _)| *g == guild_id)
            .map(|(_, p)| p.clone())
    }
}

impl PlayerFactory for ScriptedFactory {
    fn create(&self, guild_id: GuildId, events: flume::Sender<PlayerEvent>) -> Arc<dyn AudioPlayer> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let player = Arc::new(ScriptedPlayer::with_events(events));
        self.players.lock().push((guild_id, player.clone()));
        player
    }
}
