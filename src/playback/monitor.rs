use std::{sync::Weak, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::PlaybackEngine;
use crate::{common::EntryId, player::PlayerEvent};

/// Tracks how long the current entry's position has stood still.
#[derive(Debug)]
pub(crate) struct StuckDetector {
    threshold_ms: u64,
    last: Option<(EntryId, u64)>,
    stalled_ms: u64,
}

impl StuckDetector {
    pub(crate) fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            last: None,
            stalled_ms: 0,
        }
    }

    /// Feeds one poll of a playing entry. Returns the configured threshold
    /// once the position has not moved for long enough; a track that never
    /// left position 0 gets at least 30 seconds to buffer.
    pub(crate) fn observe(&mut self, id: EntryId, position: u64, step_ms: u64) -> Option<u64> {
        if self.threshold_ms == 0 {
            return None;
        }
        match self.last {
            Some((last_id, last_pos)) if last_id == id && last_pos == position => {
                self.stalled_ms += step_ms;
            }
            _ => self.stalled_ms = 0,
        }
        self.last = Some((id, position));

        let threshold = if position == 0 {
            self.threshold_ms.max(30_000)
        } else {
            self.threshold_ms
        };
        if self.stalled_ms >= threshold {
            self.stalled_ms = 0;
            Some(self.threshold_ms)
        } else {
            None
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
        self.stalled_ms = 0;
    }
}

/// Per-engine task: applies player events in arrival order and runs the
/// position poller. Holds only a weak reference so a dropped engine ends it.
pub(crate) async fn event_loop(
    engine: Weak<PlaybackEngine>,
    events: flume::Receiver<PlayerEvent>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    stuck_threshold_ms: u64,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let step_ms = poll_interval.as_millis() as u64;
    let mut stuck = StuckDetector::new(stuck_threshold_ms);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv_async() => {
                let Ok(event) = event else {
                    break;
                };
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.handle_event(event);
            }
            _ = interval.tick() => {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                match engine.poll_position() {
                    Some((id, position)) => {
                        if let Some(threshold) = stuck.observe(id, position, step_ms) {
                            warn!(
                                "[{}] entry {} stuck at {}ms",
                                engine.guild_id(),
                                id,
                                position
                            );
                            engine.report_stuck(id, threshold);
                            stuck.reset();
                        }
                    }
                    None => stuck.reset(),
                }
            }
        }
    }

    debug!("playback event loop finished");
}
