use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{AudioPlayer, PlayerError, PlayerEvent, PlayerFactory, TrackEndReason};
use crate::{
    common::{EntryId, GuildId},
    protocol::TrackHandle,
};

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u8)]
enum ClockState {
    Playing = 0,
    Paused = 1,
    Stopped = 2,
}

impl ClockState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Playing,
            1 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

struct ActiveTrack {
    token: EntryId,
    state: Arc<AtomicU8>,
    position: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ActiveTrack {
    fn state(&self) -> ClockState {
        ClockState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves to `Stopped`; true if this call made the transition.
    fn halt(&self) -> bool {
        let prev = self.state.swap(ClockState::Stopped as u8, Ordering::AcqRel);
        self.task.abort();
        ClockState::from_u8(prev) != ClockState::Stopped
    }
}

/// Paces a track in real time without producing audio: frames are pushed
/// to the voice transport by the external media pipeline, this player only
/// owns the timeline. Live streams never finish on their own.
pub struct ClockPlayer {
    guild_id: GuildId,
    events: flume::Sender<PlayerEvent>,
    tick: Duration,
    active: Mutex<Option<ActiveTrack>>,
}

impl ClockPlayer {
    pub fn new(guild_id: GuildId, events: flume::Sender<PlayerEvent>, tick: Duration) -> Self {
        Self {
            guild_id,
            events,
            tick,
            active: Mutex::new(None),
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // The engine dropping its receiver means the guild is gone.
        let _ = self.events.send(event);
    }
}

impl AudioPlayer for ClockPlayer {
    fn start_track(&self, track: &TrackHandle, token: EntryId) -> Result<(), PlayerError> {
        if track.uri.trim().is_empty() {
            return Err(PlayerError::InvalidTrack(format!(
                "'{}' has no source uri",
                track.title
            )));
        }
        if self.events.is_disconnected() {
            return Err(PlayerError::Closed);
        }

        let mut active = self.active.lock();
        if let Some(prev) = active.take() {
            if prev.halt() {
                self.emit(PlayerEvent::ended(prev.token, TrackEndReason::Replaced));
            }
        }

        debug!("[{}] clock start: {} ({})", self.guild_id, track.title, token);
        self.emit(PlayerEvent::Started { token });

        let state = Arc::new(AtomicU8::new(ClockState::Playing as u8));
        let position = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(pace(
            token,
            track.duration().map(|d| d.as_millis() as u64),
            self.tick,
            state.clone(),
            position.clone(),
            self.events.clone(),
        ));

        *active = Some(ActiveTrack {
            token,
            state,
            position,
            task,
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(prev) = self.active.lock().take() {
            if prev.halt() {
                self.emit(PlayerEvent::ended(prev.token, TrackEndReason::Stopped));
            }
        }
    }

    fn set_paused(&self, paused: bool) {
        let active = self.active.lock();
        let Some(track) = active.as_ref() else {
            return;
        };
        let (from, to) = if paused {
            (ClockState::Playing, ClockState::Paused)
        } else {
            (ClockState::Paused, ClockState::Playing)
        };
        let _ = track.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn is_paused(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|t| t.state() == ClockState::Paused)
    }

    fn position_ms(&self) -> u64 {
        self.active
            .lock()
            .as_ref()
            .map(|t| t.position.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl Drop for ClockPlayer {
    fn drop(&mut self) {
        if let Some(track) = self.active.get_mut().take() {
            track.task.abort();
        }
    }
}

async fn pace(
    token: EntryId,
    length_ms: Option<u64>,
    tick: Duration,
    state: Arc<AtomicU8>,
    position: Arc<AtomicU64>,
    events: flume::Sender<PlayerEvent>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_millis() as u64;
        last = now;

        match ClockState::from_u8(state.load(Ordering::Acquire)) {
            ClockState::Stopped => break,
            ClockState::Paused => continue,
            ClockState::Playing => {}
        }

        let pos = position.fetch_add(elapsed, Ordering::AcqRel) + elapsed;
        trace!("clock {} at {}ms", token, pos);

        let Some(length) = length_ms else {
            continue;
        };
        if pos >= length
            && state
                .compare_exchange(
                    ClockState::Playing as u8,
                    ClockState::Stopped as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        {
            position.store(length, Ordering::Release);
            let _ = events.send(PlayerEvent::ended(token, TrackEndReason::Finished));
            break;
        }
    }
}

/// Builds one [`ClockPlayer`] per guild.
pub struct ClockPlayerFactory {
    tick: Duration,
}

impl ClockPlayerFactory {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

impl Default for ClockPlayerFactory {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl PlayerFactory for ClockPlayerFactory {
    fn create(&self, guild_id: GuildId, events: flume::Sender<PlayerEvent>) -> Arc<dyn AudioPlayer> {
        Arc::new(ClockPlayer::new(guild_id, events, self.tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    fn player() -> (ClockPlayer, flume::Receiver<PlayerEvent>) {
        let (tx, rx) = flume::unbounded();
        (ClockPlayer::new(GuildId(1), tx, TICK), rx)
    }

    async fn next_event(rx: &flume::Receiver<PlayerEvent>) -> PlayerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv_async())
            .await
            .expect("timed out waiting for player event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_short_track_finishes() {
        let (player, rx) = player();
        let token = EntryId::generate();
        player
            .start_track(&TrackHandle::new("https://a", "A", 60), token)
            .unwrap();

        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token });
        assert_eq!(
            next_event(&rx).await,
            PlayerEvent::ended(token, TrackEndReason::Finished)
        );
        assert_eq!(player.position_ms(), 60);
    }

    #[tokio::test]
    async fn test_stop_reports_once() {
        let (player, rx) = player();
        let token = EntryId::generate();
        player
            .start_track(&TrackHandle::new("https://a", "A", 60_000), token)
            .unwrap();
        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token });

        player.stop();
        player.stop();

        assert_eq!(
            next_event(&rx).await,
            PlayerEvent::ended(token, TrackEndReason::Stopped)
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_replaces_running_track() {
        let (player, rx) = player();
        let first = EntryId::generate();
        let second = EntryId::generate();
        player
            .start_track(&TrackHandle::new("https://a", "A", 60_000), first)
            .unwrap();
        player
            .start_track(&TrackHandle::new("https://b", "B", 60_000), second)
            .unwrap();

        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token: first });
        assert_eq!(
            next_event(&rx).await,
            PlayerEvent::ended(first, TrackEndReason::Replaced)
        );
        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token: second });
    }

    #[tokio::test]
    async fn test_paused_track_holds_position() {
        let (player, rx) = player();
        let token = EntryId::generate();
        player
            .start_track(&TrackHandle::new("https://a", "A", 80), token)
            .unwrap();
        player.set_paused(true);
        assert!(player.is_paused());
        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err(), "paused track must not finish");

        player.set_paused(false);
        assert!(!player.is_paused());
        assert_eq!(
            next_event(&rx).await,
            PlayerEvent::ended(token, TrackEndReason::Finished)
        );
    }

    #[tokio::test]
    async fn test_live_stream_does_not_finish() {
        let (player, rx) = player();
        let token = EntryId::generate();
        player
            .start_track(&TrackHandle::live("https://radio", "Radio"), token)
            .unwrap();
        assert_eq!(next_event(&rx).await, PlayerEvent::Started { token });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(player.position_ms() > 0);
    }

    #[tokio::test]
    async fn test_track_without_uri_is_rejected() {
        let (player, rx) = player();
        let err = player
            .start_track(&TrackHandle::new("", "Nothing", 1000), EntryId::generate())
            .unwrap_err();
        assert!(matches!(err, PlayerError::InvalidTrack(_)));
        assert!(rx.try_recv().is_err());
    }
}
