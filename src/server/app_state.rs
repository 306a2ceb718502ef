use std::{sync::Arc, time::Instant};

use crate::{
    common::banner::BuildInfo,
    configs::Config,
    playback::Phase,
    player::PlayerFactory,
    protocol::NodeStats,
    server::{
        ActivityReaper, BroadcastSink, NotificationDispatcher, Notifier, SessionRegistry,
    },
    sources::{LoadCoordinator, LoadService, PendingSessions},
    voice::VoiceBook,
};

/// Top-level application state shared by the HTTP handlers.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub coordinator: Arc<LoadCoordinator>,
    pub voice: Arc<VoiceBook>,
    pub events: Arc<BroadcastSink>,
    pub build: BuildInfo,
    pub started_at: Instant,
}

/// Everything `main` has to run besides the HTTP server.
pub struct Components {
    pub state: Arc<AppState>,
    pub dispatcher: NotificationDispatcher,
    pub reaper: ActivityReaper,
}

impl AppState {
    /// Wires the registry, notification pipeline, loader and reaper
    /// together.
    pub fn assemble(
        config: Config,
        players: Arc<dyn PlayerFactory>,
        loader: Arc<dyn LoadService>,
    ) -> Components {
        let (notifier, notifications) = Notifier::channel(config.player.notification_buffer);
        let voice = Arc::new(VoiceBook::new());
        let registry = Arc::new(SessionRegistry::new(
            players,
            voice.clone(),
            notifier,
            config.player.clone(),
        ));

        let pending = Arc::new(PendingSessions::new(config.loader.disambiguation_ttl()));
        let coordinator = Arc::new(LoadCoordinator::new(loader, pending.clone(), &config.loader));

        let events = Arc::new(BroadcastSink::new(config.player.notification_buffer));
        let dispatcher = NotificationDispatcher::new(
            notifications,
            events.clone(),
            registry.clone(),
            config.player.leave_on_queue_end,
        );
        let reaper = ActivityReaper::new(registry.clone(), pending, config.reaper.clone());

        let state = Arc::new(Self {
            config,
            registry,
            coordinator,
            voice,
            events,
            build: BuildInfo::default(),
            started_at: Instant::now(),
        });

        Components {
            state,
            dispatcher,
            reaper,
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn stats(&self) -> NodeStats {
        let mut stats = NodeStats {
            voice_connections: self.voice.len(),
            pending_choices: self.coordinator.pending().len(),
            event_subscribers: self.events.subscriber_count(),
            ..NodeStats::default()
        };
        for (_, engine) in self.registry.engines() {
            let activity = engine.activity();
            stats.guilds += 1;
            stats.queued_entries += activity.queue_len;
            match activity.phase {
                Phase::Playing => stats.playing += 1,
                Phase::Paused => stats.paused += 1,
                Phase::Idle => {}
            }
        }
        stats
    }
}
