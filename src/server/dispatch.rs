use std::sync::Arc;

use async_trait::async_trait;
use flume::TrySendError;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::SessionRegistry;
use crate::{
    common::{ChannelId, GuildId},
    protocol::{Notification, OutgoingMessage},
};

/// Sending half of the outbound notification queue. Never blocks: once
/// `capacity` messages are waiting, informational events are dropped.
/// Control events such as `QueueEnded` are always queued, since the
/// dispatcher's end-of-queue teardown depends on seeing them.
#[derive(Clone)]
pub struct Notifier {
    tx: flume::Sender<OutgoingMessage>,
    capacity: usize,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, flume::Receiver<OutgoingMessage>) {
        let (tx, rx) = flume::unbounded();
        let notifier = Self {
            tx,
            capacity: capacity.max(1),
        };
        (notifier, rx)
    }

    pub fn notify(&self, guild_id: GuildId, target: Option<ChannelId>, event: Notification) {
        self.send(OutgoingMessage::new(guild_id, target, event));
    }

    pub fn send(&self, message: OutgoingMessage) {
        if self.tx.len() >= self.capacity && !message.event.is_control() {
            warn!(
                "[{}] notification buffer full, dropping {}",
                message.guild_id,
                message.event.kind()
            );
            return;
        }
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) | Err(TrySendError::Disconnected(message)) => debug!(
                "[{}] notification dispatcher gone, dropping {}",
                message.guild_id,
                message.event.kind()
            ),
        }
    }
}

/// Where dispatched notifications end up.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &OutgoingMessage);
}

/// Fans notifications out as JSON text to every event stream subscriber.
pub struct BroadcastSink {
    tx: broadcast::Sender<Arc<str>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn deliver(&self, message: &OutgoingMessage) {
        match serde_json::to_string(message) {
            // No subscribers is not an error.
            Ok(json) => {
                let _ = self.tx.send(Arc::from(json));
            }
            Err(e) => warn!("failed to serialize {}: {}", message.event.kind(), e),
        }
    }
}

/// Drains the notification queue, forwards every message to the sink and
/// performs end-of-queue teardown off the engines' event tasks.
pub struct NotificationDispatcher {
    rx: flume::Receiver<OutgoingMessage>,
    sink: Arc<dyn NotificationSink>,
    registry: Arc<SessionRegistry>,
    leave_on_queue_end: bool,
}

impl NotificationDispatcher {
    pub fn new(
        rx: flume::Receiver<OutgoingMessage>,
        sink: Arc<dyn NotificationSink>,
        registry: Arc<SessionRegistry>,
        leave_on_queue_end: bool,
    ) -> Self {
        Self {
            rx,
            sink,
            registry,
            leave_on_queue_end,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("notification dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = self.rx.recv_async() => {
                    let Ok(message) = message else {
                        break;
                    };
                    self.dispatch(message).await;
                }
            }
        }
        info!("notification dispatcher stopped");
    }

    pub async fn dispatch(&self, message: OutgoingMessage) {
        trace!("[{}] dispatching {}", message.guild_id, message.event.kind());
        self.sink.deliver(&message).await;

        if self.leave_on_queue_end && matches!(message.event, Notification::QueueEnded) {
            // Something may have been queued since the signal went out.
            let removed = self
                .registry
                .teardown_if(message.guild_id, |engine| engine.close_if_drained())
                .await;
            if !removed {
                debug!(
                    "[{}] queue end ignored, guild active again",
                    message.guild_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        common::UserId,
        configs::PlayerConfig,
        testing::{ScriptedFactory, track},
        voice::VoiceBook,
    };

    #[derive(Default)]
    struct RecordingSink {
        kinds: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, message: &OutgoingMessage) {
            self.kinds.lock().push(message.event.kind());
        }
    }

    struct Fixture {
        registry: Arc<SessionRegistry>,
        factory: Arc<ScriptedFactory>,
        sink: Arc<RecordingSink>,
        dispatcher: NotificationDispatcher,
    }

    fn fixture(leave_on_queue_end: bool) -> Fixture {
        let factory = Arc::new(ScriptedFactory::default());
        let (notifier, rx) = Notifier::channel(64);
        let registry = Arc::new(SessionRegistry::new(
            factory.clone(),
            Arc::new(VoiceBook::new()),
            notifier,
            PlayerConfig::default(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher =
            NotificationDispatcher::new(rx, sink.clone(), registry.clone(), leave_on_queue_end);
        Fixture {
            registry,
            factory,
            sink,
            dispatcher,
        }
    }

    fn no_matches() -> Notification {
        Notification::NoMatches {
            query: "nothing".into(),
        }
    }

    #[test]
    fn test_full_buffer_drops_instead_of_blocking() {
        let (notifier, rx) = Notifier::channel(2);
        for _ in 0..5 {
            notifier.notify(GuildId(1), None, no_matches());
        }
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_full_buffer_still_queues_queue_end() {
        let (notifier, rx) = Notifier::channel(1);
        notifier.notify(GuildId(1), None, no_matches());
        notifier.notify(GuildId(1), None, no_matches());
        notifier.notify(GuildId(1), Some(ChannelId(2)), Notification::QueueEnded);

        let kinds: Vec<_> = rx.try_iter().map(|m| m.event.kind()).collect();
        assert_eq!(kinds, ["NoMatches", "QueueEnded"]);
    }

    #[tokio::test]
    async fn test_queue_end_survives_saturated_buffer() {
        let factory = Arc::new(ScriptedFactory::default());
        let (notifier, rx) = Notifier::channel(1);
        let registry = Arc::new(SessionRegistry::new(
            factory.clone(),
            Arc::new(VoiceBook::new()),
            notifier.clone(),
            PlayerConfig::default(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(rx, sink.clone(), registry.clone(), true);

        let engine = registry.get_or_create(GuildId(1));
        engine.set_notification_target(Some(ChannelId(2)));
        engine.enqueue_track(track("A"), UserId(3)).unwrap();
        // NowPlaying fills the buffer, so this one is dropped.
        notifier.notify(GuildId(8), None, no_matches());

        factory.player(GuildId(1)).unwrap().finish();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !engine.has_drained() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("track end was not processed");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(shutdown.clone()));
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.contains(GuildId(1)) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("drained guild was never released");

        shutdown.cancel();
        task.await.unwrap();
        assert!(engine.is_closed());
        assert_eq!(*sink.kinds.lock(), ["NowPlaying", "QueueEnded"]);
    }

    #[tokio::test]
    async fn test_broadcast_sink_serializes_json() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.deliver(&OutgoingMessage::new(
            GuildId(7),
            Some(ChannelId(9)),
            Notification::NoMatches {
                query: "nothing".into(),
            },
        ))
        .await;

        let json: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["type"], "NoMatches");
        assert_eq!(json["guildId"], 7);
        assert_eq!(json["query"], "nothing");
    }

    #[tokio::test]
    async fn test_queue_end_tears_down_drained_guild() {
        let f = fixture(true);
        let engine = f.registry.get_or_create(GuildId(1));
        engine.set_notification_target(Some(ChannelId(2)));
        engine.enqueue_track(track("A"), UserId(3)).unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(f.dispatcher.run(shutdown.clone()));

        f.factory.player(GuildId(1)).unwrap().finish();
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.registry.contains(GuildId(1)) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("guild was not torn down");

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(*f.sink.kinds.lock(), ["NowPlaying", "QueueEnded"]);
    }

    #[tokio::test]
    async fn test_queue_end_spares_reactivated_guild() {
        let f = fixture(true);
        let engine = f.registry.get_or_create(GuildId(1));
        engine.set_notification_target(Some(ChannelId(2)));
        engine.enqueue_track(track("A"), UserId(3)).unwrap();

        // A stale signal processed after playback started again.
        f.dispatcher
            .dispatch(OutgoingMessage::new(
                GuildId(1),
                Some(ChannelId(2)),
                Notification::QueueEnded,
            ))
            .await;
        assert!(f.registry.contains(GuildId(1)));
    }

    #[tokio::test]
    async fn test_queue_end_kept_when_leave_disabled() {
        let f = fixture(false);
        let engine = f.registry.get_or_create(GuildId(1));
        engine.set_notification_target(Some(ChannelId(2)));
        engine.enqueue_track(track("A"), UserId(3)).unwrap();
        let token = f.factory.player(GuildId(1)).unwrap().current().unwrap();
        engine.handle_event(crate::player::PlayerEvent::ended(
            token,
            crate::player::TrackEndReason::Finished,
        ));
        assert!(engine.has_drained());

        f.dispatcher
            .dispatch(OutgoingMessage::new(
                GuildId(1),
                Some(ChannelId(2)),
                Notification::QueueEnded,
            ))
            .await;
        assert!(f.registry.contains(GuildId(1)));
    }
}
