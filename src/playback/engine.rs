use std::{collections::HashSet, sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    entry::{EntryInfo, TrackEntry},
    monitor,
    queue::PlaybackQueue,
    state::{Activity, EngineSnapshot, EngineState},
};
use crate::{
    common::{ChannelId, EntryId, GuildId, UserId},
    configs::PlayerConfig,
    player::{AudioPlayer, PlayerEvent, PlayerFactory, TrackEndReason},
    protocol::{Notification, TrackHandle},
    server::Notifier,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("playback is already paused")]
    AlreadyPaused,
    #[error("playback is not paused")]
    NotPaused,
    #[error("the queue is full ({limit} entries)")]
    QueueFull { limit: usize },
    #[error("no queued entry at index {index} (queue has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("a skip of the current track is already in progress")]
    SkipPending,
    #[error("user already voted to skip this track")]
    AlreadyVoted,
    #[error("the guild session was closed")]
    Closed,
}

/// Where a single enqueued track ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Enqueued {
    /// Started right away.
    Playing(EntryInfo),
    /// Waiting; `position` is 1-based.
    Queued { entry: EntryInfo, position: usize },
    /// Promoted straight to the player, which refused it.
    Failed(EntryInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEnqueued {
    /// Playlist entry that started playing, if the engine was idle.
    pub started: Option<EntryInfo>,
    /// Playlist entries left waiting in the queue.
    pub queued: usize,
    /// Tracks cut off by the queue length limit.
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum VoteOutcome {
    Recorded { votes: usize, required: usize },
    Skipped(EntryInfo),
}

struct EngineInner {
    state: EngineState,
    queue: PlaybackQueue,
    repeat: bool,
    target: Option<ChannelId>,
    /// Entry stopped by a skip; its `Stopped` end advances the queue.
    skipping: Option<EntryId>,
    /// Set once `QueueEnded` went out, cleared when anything starts or is
    /// queued again.
    queue_end_signalled: bool,
    /// Set when the registry tears the engine down. A closed engine takes
    /// no new entries.
    closed: bool,
}

/// Playback state machine for one guild.
///
/// Every operation takes the inner lock for its whole duration, so
/// operations on the same guild are linearizable. Player calls are
/// non-blocking and are made under the lock; player events come back
/// through [`PlaybackEngine::handle_event`] on the engine's event task.
pub struct PlaybackEngine {
    guild_id: GuildId,
    player: Arc<dyn AudioPlayer>,
    inner: Mutex<EngineInner>,
    notifier: Notifier,
    config: PlayerConfig,
    shutdown: CancellationToken,
}

impl PlaybackEngine {
    pub fn new(
        guild_id: GuildId,
        player: Arc<dyn AudioPlayer>,
        notifier: Notifier,
        config: PlayerConfig,
    ) -> Self {
        Self {
            guild_id,
            player,
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                queue: PlaybackQueue::new(),
                repeat: false,
                target: None,
                skipping: None,
                queue_end_signalled: false,
                closed: false,
            }),
            notifier,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates the engine with a player from `players` and starts its
    /// event task. Must be called inside a tokio runtime.
    pub fn spawn(
        guild_id: GuildId,
        players: &dyn PlayerFactory,
        notifier: Notifier,
        config: PlayerConfig,
    ) -> Arc<Self> {
        let (tx, rx) = flume::unbounded();
        let player = players.create(guild_id, tx);
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(10));
        let stuck_threshold_ms = config.stuck_threshold_ms;
        let engine = Arc::new(Self::new(guild_id, player, notifier, config));

        tokio::spawn(monitor::event_loop(
            Arc::downgrade(&engine),
            rx,
            engine.shutdown.clone(),
            poll_interval,
            stuck_threshold_ms,
        ));
        engine
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Adds one track. An idle engine with a known notification target
    /// starts playing right away; otherwise the entry waits at the tail.
    pub fn enqueue_track(
        &self,
        track: TrackHandle,
        requester: UserId,
    ) -> Result<Enqueued, EngineError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::Closed);
        }
        let entry = TrackEntry::new(track, requester);
        let info = entry.info();

        if !self.starts_immediately(&inner) {
            self.check_room(&inner, 1)?;
        }
        inner.queue.enqueue(entry);
        inner.queue_end_signalled = false;
        debug!(
            "[{}] enqueued '{}' ({} waiting)",
            self.guild_id,
            info.track.title,
            inner.queue.size()
        );

        if inner.state.is_idle() && inner.target.is_some() {
            self.advance_locked(&mut inner);
        }

        if inner.state.current_id() == Some(info.id) {
            return Ok(Enqueued::Playing(info));
        }
        match inner.queue.iter().position(|e| e.id == info.id) {
            Some(index) => Ok(Enqueued::Queued {
                entry: info,
                position: index + 1,
            }),
            None => Ok(Enqueued::Failed(info)),
        }
    }

    /// Adds a whole playlist under one lock hold, so the tracks stay
    /// contiguous and in order relative to concurrent enqueues. Tracks that
    /// do not fit under the queue limit are dropped and counted.
    pub fn enqueue_playlist(
        &self,
        tracks: Vec<TrackHandle>,
        requester: UserId,
    ) -> Result<PlaylistEnqueued, EngineError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EngineError::Closed);
        }
        let total = tracks.len();
        if total == 0 {
            return Ok(PlaylistEnqueued {
                started: None,
                queued: 0,
                dropped: 0,
            });
        }

        let mut room = self.room(&inner);
        if self.starts_immediately(&inner) {
            room = room.saturating_add(1);
        }
        if room == 0 {
            return Err(EngineError::QueueFull {
                limit: self.config.max_queue_length,
            });
        }

        let mut ids = HashSet::with_capacity(total.min(room));
        for track in tracks.into_iter().take(room) {
            let entry = TrackEntry::new(track, requester);
            ids.insert(entry.id);
            inner.queue.enqueue(entry);
        }
        let dropped = total - ids.len();
        inner.queue_end_signalled = false;

        if inner.state.is_idle() && inner.target.is_some() {
            self.advance_locked(&mut inner);
        }

        let started = inner
            .state
            .current()
            .filter(|e| ids.contains(&e.id))
            .map(TrackEntry::info);
        let queued = inner.queue.iter().filter(|e| ids.contains(&e.id)).count();
        if dropped > 0 {
            info!(
                "[{}] playlist truncated: {} queued, {} dropped",
                self.guild_id, queued, dropped
            );
        }
        Ok(PlaylistEnqueued {
            started,
            queued,
            dropped,
        })
    }

    /// Starts the queue head if nothing is playing. Used when entries were
    /// queued before a notification target was known.
    pub fn start_if_idle(&self) -> Option<EntryInfo> {
        let mut inner = self.inner.lock();
        if inner.closed || !inner.state.is_idle() || inner.queue.is_empty() {
            return None;
        }
        self.advance_locked(&mut inner)
    }

    /// Stops the current track. The player's `Stopped` end then advances
    /// the queue like a natural finish would.
    pub fn skip_current(&self, requested_by: UserId) -> Result<EntryInfo, EngineError> {
        let mut inner = self.inner.lock();
        self.skip_locked(&mut inner, requested_by)
    }

    pub fn vote_skip(&self, voter: UserId, listeners: usize) -> Result<VoteOutcome, EngineError> {
        let required = required_votes(listeners, self.config.vote_skip_ratio);
        let mut inner = self.inner.lock();
        let entry = inner
            .state
            .current_mut()
            .ok_or(EngineError::NothingPlaying)?;
        if !entry.add_skip_vote(voter) {
            return Err(EngineError::AlreadyVoted);
        }
        let votes = entry.skip_votes.len();
        if votes < required {
            return Ok(VoteOutcome::Recorded { votes, required });
        }
        self.skip_locked(&mut inner, voter).map(VoteOutcome::Skipped)
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.state) {
            EngineState::Playing(entry) => {
                self.player.set_paused(true);
                inner.state = EngineState::Paused(entry);
                Ok(())
            }
            EngineState::Paused(entry) => {
                inner.state = EngineState::Paused(entry);
                Err(EngineError::AlreadyPaused)
            }
            EngineState::Idle => Err(EngineError::NothingPlaying),
        }
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        match std::mem::take(&mut inner.state) {
            EngineState::Paused(entry) => {
                self.player.set_paused(false);
                inner.state = EngineState::Playing(entry);
                Ok(())
            }
            EngineState::Playing(entry) => {
                inner.state = EngineState::Playing(entry);
                Err(EngineError::NotPaused)
            }
            EngineState::Idle => Err(EngineError::NothingPlaying),
        }
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.inner.lock().repeat = repeat;
    }

    pub fn repeat(&self) -> bool {
        self.inner.lock().repeat
    }

    pub fn set_notification_target(&self, target: Option<ChannelId>) {
        self.inner.lock().target = target;
    }

    pub fn notification_target(&self) -> Option<ChannelId> {
        self.inner.lock().target
    }

    /// Drops every waiting entry; the current track keeps playing.
    pub fn clear_queue(&self) -> usize {
        self.inner.lock().queue.clear()
    }

    /// Removes the waiting entry at 0-based `index`.
    pub fn remove_queued(&self, index: usize) -> Result<EntryInfo, EngineError> {
        let mut inner = self.inner.lock();
        let len = inner.queue.size();
        inner
            .queue
            .remove(index)
            .map(|e| e.info())
            .ok_or(EngineError::IndexOutOfRange { index, len })
    }

    pub fn shuffle_queue(&self) {
        self.inner.lock().queue.shuffle();
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.lock();
        EngineSnapshot {
            guild_id: self.guild_id,
            phase: inner.state.phase(),
            current: inner.state.current().map(TrackEntry::info),
            queue: inner.queue.iter().map(TrackEntry::info).collect(),
            repeat: inner.repeat,
            target: inner.target,
        }
    }

    pub fn activity(&self) -> Activity {
        let inner = self.inner.lock();
        Activity {
            phase: inner.state.phase(),
            queue_len: inner.queue.size(),
        }
    }

    /// True when the engine reported the end of its queue and nothing has
    /// been started or queued since.
    pub fn has_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.queue_end_signalled && inner.state.is_idle() && inner.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Marks the engine closed. Returns false if it already was.
    pub fn close(&self) -> bool {
        self.close_when(|_| true)
    }

    /// Closes the engine only if it is still drained, checked under the
    /// same lock hold so no enqueue can slip in between.
    pub fn close_if_drained(&self) -> bool {
        self.close_when(|inner| {
            inner.queue_end_signalled && inner.state.is_idle() && inner.queue.is_empty()
        })
    }

    /// Closes the engine only if its activity still equals `seen`.
    pub fn close_if_unchanged(&self, seen: Activity) -> bool {
        self.close_when(|inner| {
            inner.state.phase() == seen.phase && inner.queue.size() == seen.queue_len
        })
    }

    fn close_when(&self, condition: impl FnOnce(&EngineInner) -> bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed || !condition(&inner) {
            return false;
        }
        inner.closed = true;
        true
    }

    /// Applies one player event. Events whose token does not name the
    /// current entry are about tracks already moved past and are dropped.
    pub fn handle_event(&self, event: PlayerEvent) {
        let mut inner = self.inner.lock();
        if inner.state.current_id() != Some(event.token()) {
            debug!(
                "[{}] ignoring stale player event for {}",
                self.guild_id,
                event.token()
            );
            return;
        }

        match event {
            PlayerEvent::Started { token } => {
                debug!("[{}] player started {}", self.guild_id, token);
            }
            PlayerEvent::Ended {
                reason,
                may_start_next,
                ..
            } => self.on_track_end(&mut inner, reason, may_start_next),
            PlayerEvent::Failed { message, .. } => self.on_track_failed(&mut inner, message),
        }
    }

    /// Samples the player position into the current entry. Returns the
    /// entry and position while playing (not paused).
    pub fn poll_position(&self) -> Option<(EntryId, u64)> {
        let inner = self.inner.lock();
        let EngineState::Playing(entry) = &inner.state else {
            return None;
        };
        let position = self.player.position_ms();
        entry.set_played_ms(position);
        Some((entry.id, position))
    }

    /// Reports the current entry as stuck and moves past it.
    pub fn report_stuck(&self, token: EntryId, threshold_ms: u64) {
        let mut inner = self.inner.lock();
        if inner.state.current_id() != Some(token) {
            return;
        }
        let Some(stuck) = inner.state.take() else {
            return;
        };
        inner.skipping = None;
        self.notify(
            &inner,
            Notification::TrackStuck {
                entry: stuck.info(),
                threshold_ms,
            },
        );
        self.player.stop();
        self.advance_locked(&mut inner);
    }

    /// Clears the queue, stops the player and ends the event task. The
    /// engine emits nothing afterwards.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.queue.clear();
        let current = inner.state.take();
        inner.skipping = None;
        inner.queue_end_signalled = true;
        inner.closed = true;
        if current.is_some() {
            self.player.stop();
        }
        drop(inner);

        self.shutdown.cancel();
        info!(
            "[{}] engine shut down ({} queued entries dropped)",
            self.guild_id, dropped
        );
    }

    fn starts_immediately(&self, inner: &EngineInner) -> bool {
        inner.state.is_idle() && inner.target.is_some() && inner.queue.is_empty()
    }

    fn room(&self, inner: &EngineInner) -> usize {
        match self.config.max_queue_length {
            0 => usize::MAX,
            limit => limit.saturating_sub(inner.queue.size()),
        }
    }

    fn check_room(&self, inner: &EngineInner, needed: usize) -> Result<(), EngineError> {
        if self.room(inner) < needed {
            return Err(EngineError::QueueFull {
                limit: self.config.max_queue_length,
            });
        }
        Ok(())
    }

    /// Pops entries until one starts. Entries the player rejects are
    /// reported and skipped over. An exhausted queue leaves the engine idle
    /// and signals the end of the queue.
    fn advance_locked(&self, inner: &mut EngineInner) -> Option<EntryInfo> {
        while let Some(entry) = inner.queue.dequeue_next() {
            match self.player.start_track(&entry.track, entry.id) {
                Ok(()) => {
                    let info = entry.info();
                    info!("[{}] now playing '{}'", self.guild_id, info.track.title);
                    inner.state = EngineState::Playing(entry);
                    inner.skipping = None;
                    inner.queue_end_signalled = false;
                    if inner.target.is_some() {
                        self.notify(
                            inner,
                            Notification::NowPlaying {
                                entry: info.clone(),
                            },
                        );
                    }
                    return Some(info);
                }
                Err(e) => {
                    warn!(
                        "[{}] failed to start '{}': {}",
                        self.guild_id, entry.track.title, e
                    );
                    self.notify(
                        inner,
                        Notification::TrackFailed {
                            entry: entry.info(),
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        inner.state = EngineState::Idle;
        self.signal_queue_end(inner);
        None
    }

    fn signal_queue_end(&self, inner: &mut EngineInner) {
        if inner.queue_end_signalled || inner.target.is_none() {
            return;
        }
        inner.queue_end_signalled = true;
        debug!("[{}] queue ended", self.guild_id);
        self.notify(inner, Notification::QueueEnded);
    }

    fn skip_locked(&self, inner: &mut EngineInner, by: UserId) -> Result<EntryInfo, EngineError> {
        let current = inner.state.current().ok_or(EngineError::NothingPlaying)?;
        if inner.skipping == Some(current.id) {
            return Err(EngineError::SkipPending);
        }
        let info = current.info();
        inner.skipping = Some(info.id);
        self.notify(
            inner,
            Notification::TrackSkipped {
                entry: info.clone(),
                requested_by: by,
            },
        );
        self.player.stop();
        Ok(info)
    }

    fn on_track_end(&self, inner: &mut EngineInner, reason: TrackEndReason, may_start_next: bool) {
        let skipped = inner.skipping.take().is_some();
        let Some(ended) = inner.state.take() else {
            return;
        };
        debug!(
            "[{}] '{}' ended: {:?}",
            self.guild_id, ended.track.title, reason
        );

        if reason == TrackEndReason::LoadFailed {
            self.notify(
                inner,
                Notification::TrackFailed {
                    entry: ended.info(),
                    message: "track failed to load".to_string(),
                },
            );
            self.advance_locked(inner);
            return;
        }

        if may_start_next || skipped {
            if inner.repeat {
                inner.queue.enqueue(ended.requeue());
            }
            self.advance_locked(inner);
        } else if inner.queue.is_empty() {
            self.signal_queue_end(inner);
        }
    }

    fn on_track_failed(&self, inner: &mut EngineInner, message: String) {
        let Some(failed) = inner.state.take() else {
            return;
        };
        inner.skipping = None;
        warn!(
            "[{}] '{}' failed during playback: {}",
            self.guild_id, failed.track.title, message
        );
        self.notify(
            inner,
            Notification::TrackFailed {
                entry: failed.info(),
                message,
            },
        );
        self.advance_locked(inner);
    }

    fn notify(&self, inner: &EngineInner, event: Notification) {
        self.notifier.notify(self.guild_id, inner.target, event);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Votes needed to skip with `listeners` people in the channel.
pub fn required_votes(listeners: usize, ratio: f32) -> usize {
    ((listeners as f32 * ratio).ceil() as usize).max(1)
}
