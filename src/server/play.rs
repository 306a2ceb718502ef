use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use super::{Notifier, SessionRegistry};
use crate::{
    common::{ChannelId, Severity},
    playback::{EngineError, Enqueued, PlaybackEngine},
    protocol::{Notification, TrackHandle},
    sources::{LoadFailure, LoadHandler, LoadRequest},
};

/// Applies load outcomes for one play request: enqueues into the guild's
/// engine and reports what happened to the request's channel.
pub struct PlayHandler {
    registry: Arc<SessionRegistry>,
    notifier: Notifier,
    target: Option<ChannelId>,
    choice_ttl: Duration,
}

impl PlayHandler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        target: Option<ChannelId>,
        choice_ttl: Duration,
    ) -> Self {
        Self {
            notifier: registry.notifier().clone(),
            registry,
            target,
            choice_ttl,
        }
    }

    fn engine(&self, request: &LoadRequest) -> Arc<PlaybackEngine> {
        let engine = self.registry.get_or_create(request.guild_id);
        if self.target.is_some() {
            engine.set_notification_target(self.target);
        }
        engine
    }

    /// Runs `op` on the guild's engine. An engine closed by a teardown that
    /// raced this request is replaced once by a fresh one.
    fn with_engine<T>(
        &self,
        request: &LoadRequest,
        op: impl Fn(&PlaybackEngine) -> Result<T, EngineError>,
    ) -> (Arc<PlaybackEngine>, Result<T, EngineError>) {
        let engine = self.engine(request);
        match op(&engine) {
            Err(EngineError::Closed) => {
                debug!(
                    "[{}] engine closed under request, retrying",
                    request.guild_id
                );
                let engine = self.engine(request);
                let result = op(&engine);
                (engine, result)
            }
            result => (engine, result),
        }
    }

    fn notify(&self, request: &LoadRequest, event: Notification) {
        self.notifier.notify(request.guild_id, self.target, event);
    }

    fn rejected(&self, request: &LoadRequest, error: EngineError) {
        self.notify(
            request,
            Notification::LoadFailed {
                query: request.query.clone(),
                message: error.to_string(),
                severity: Severity::Common,
            },
        );
    }

    /// Enqueues one resolved track. Also used for picks from a pending
    /// choice.
    pub fn play_track(&self, request: &LoadRequest, track: TrackHandle) -> Result<Enqueued, EngineError> {
        let (engine, result) = self.with_engine(request, |engine| {
            engine.enqueue_track(track.clone(), request.requester)
        });
        match &result {
            Ok(Enqueued::Queued { entry, position }) => self.notify(
                request,
                Notification::TrackQueued {
                    entry: entry.clone(),
                    position: *position,
                },
            ),
            Ok(Enqueued::Playing(_) | Enqueued::Failed(_)) => {}
            Err(e) => self.rejected(request, e.clone()),
        }
        if engine.notification_target().is_none() {
            engine.start_if_idle();
        }
        result
    }
}

#[async_trait]
impl LoadHandler for PlayHandler {
    async fn on_single(&self, request: &LoadRequest, track: TrackHandle) {
        let _ = self.play_track(request, track);
    }

    async fn on_playlist(
        &self,
        request: &LoadRequest,
        name: Option<String>,
        tracks: Vec<TrackHandle>,
    ) {
        let (engine, result) = self.with_engine(request, |engine| {
            engine.enqueue_playlist(tracks.clone(), request.requester)
        });
        match result {
            Ok(result) => {
                let queued = result.queued + usize::from(result.started.is_some());
                self.notify(
                    request,
                    Notification::PlaylistQueued {
                        name,
                        queued,
                        dropped: result.dropped,
                    },
                );
            }
            Err(e) => self.rejected(request, e),
        }
        if engine.notification_target().is_none() {
            engine.start_if_idle();
        }
    }

    async fn on_choice(&self, request: &LoadRequest, choices: Vec<TrackHandle>) {
        debug!(
            "[{}] {} choices offered to {}",
            request.guild_id,
            choices.len(),
            request.requester
        );
        self.notify(
            request,
            Notification::ChooseTrack {
                requester: request.requester,
                choices,
                expires_in_ms: self.choice_ttl.as_millis() as u64,
            },
        );
    }

    async fn on_no_match(&self, request: &LoadRequest) {
        self.notify(
            request,
            Notification::NoMatches {
                query: request.query.clone(),
            },
        );
    }

    async fn on_failure(&self, request: &LoadRequest, failure: LoadFailure) {
        self.notify(
            request,
            Notification::LoadFailed {
                query: request.query.clone(),
                message: failure.message,
                severity: failure.severity,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        common::{GuildId, UserId},
        configs::PlayerConfig,
        protocol::OutgoingMessage,
        testing::{ScriptedFactory, track},
        voice::VoiceBook,
    };

    fn setup(target: Option<ChannelId>) -> (PlayHandler, Arc<SessionRegistry>, flume::Receiver<OutgoingMessage>) {
        let (notifier, rx) = Notifier::channel(64);
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(ScriptedFactory::default()),
            Arc::new(VoiceBook::new()),
            notifier,
            PlayerConfig::default(),
        ));
        let handler = PlayHandler::new(registry.clone(), target, Duration::from_secs(25));
        (handler, registry, rx)
    }

    fn request() -> LoadRequest {
        LoadRequest {
            guild_id: GuildId(1),
            requester: UserId(2),
            query: "q".into(),
            allow_choice: true,
        }
    }

    fn kinds(rx: &flume::Receiver<OutgoingMessage>) -> Vec<&'static str> {
        rx.try_iter().map(|m| m.event.kind()).collect()
    }

    #[tokio::test]
    async fn test_single_tracks_play_then_queue() {
        let (handler, registry, rx) = setup(Some(ChannelId(3)));
        handler.on_single(&request(), track("A")).await;
        handler.on_single(&request(), track("B")).await;

        let engine = registry.get(GuildId(1)).unwrap();
        assert_eq!(engine.notification_target(), Some(ChannelId(3)));
        assert_eq!(engine.snapshot().queue.len(), 1);
        assert_eq!(kinds(&rx), ["NowPlaying", "TrackQueued"]);
    }

    #[tokio::test]
    async fn test_silent_request_still_plays() {
        let (handler, registry, rx) = setup(None);
        handler.on_single(&request(), track("A")).await;

        let snapshot = registry.get(GuildId(1)).unwrap().snapshot();
        assert_eq!(snapshot.current.unwrap().track.title, "A");
        assert!(snapshot.queue.is_empty());
        assert_eq!(kinds(&rx), ["TrackQueued"]);
    }

    #[tokio::test]
    async fn test_playlist_reports_counts() {
        let (handler, _, rx) = setup(Some(ChannelId(3)));
        handler
            .on_playlist(&request(), Some("Mix".into()), vec![track("A"), track("B"), track("C")])
            .await;

        let events: Vec<_> = rx.try_iter().map(|m| m.event).collect();
        assert!(matches!(
            events.last(),
            Some(Notification::PlaylistQueued { queued: 3, dropped: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_failures_and_misses_are_reported() {
        let (handler, registry, rx) = setup(Some(ChannelId(3)));
        handler.on_no_match(&request()).await;
        handler
            .on_failure(&request(), LoadFailure::fault("node unreachable"))
            .await;
        handler
            .on_choice(&request(), vec![track("A"), track("B")])
            .await;

        assert_eq!(kinds(&rx), ["NoMatches", "LoadFailed", "ChooseTrack"]);
        assert!(registry.is_empty(), "no engine for requests that queued nothing");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enqueue_racing_teardown_lands_in_fresh_engine() {
        let (handler, registry, _rx) = setup(Some(ChannelId(3)));
        let first = registry.get_or_create(GuildId(1));
        let calls = AtomicUsize::new(0);

        let (engine, result) = handler.with_engine(&request(), |engine| {
            // The guild is released between lookup and enqueue.
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(registry.teardown(GuildId(1)))
                });
            }
            engine.enqueue_track(track("A"), UserId(2))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(first.is_closed());
        assert!(!Arc::ptr_eq(&first, &engine));
        assert!(matches!(result, Ok(Enqueued::Playing(_))));
        assert!(Arc::ptr_eq(&registry.get(GuildId(1)).unwrap(), &engine));
    }
}
