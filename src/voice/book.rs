use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use super::{VoiceError, VoiceTransport};
use crate::common::{ChannelId, GuildId, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSlot {
    pub channel_id: ChannelId,
    pub listeners: Option<usize>,
    /// Unix timestamp in milliseconds.
    pub connected_at: u64,
}

/// In-memory record of voice connections, kept current by the gateway
/// layer through the REST surface.
#[derive(Debug, Default)]
pub struct VoiceBook {
    slots: DashMap<GuildId, VoiceSlot>,
}

impl VoiceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a gateway report. `channel_id = None` means the bot left
    /// voice in that guild.
    pub fn update(&self, guild_id: GuildId, channel_id: Option<ChannelId>, listeners: Option<usize>) {
        let Some(channel_id) = channel_id else {
            if self.slots.remove(&guild_id).is_some() {
                debug!("[{}] voice state cleared", guild_id);
            }
            return;
        };

        self.slots
            .entry(guild_id)
            .and_modify(|slot| {
                if slot.channel_id != channel_id {
                    slot.channel_id = channel_id;
                    slot.connected_at = now_ms();
                }
                slot.listeners = listeners;
            })
            .or_insert_with(|| VoiceSlot {
                channel_id,
                listeners,
                connected_at: now_ms(),
            });
    }

    pub fn slot(&self, guild_id: GuildId) -> Option<VoiceSlot> {
        self.slots.get(&guild_id).map(|s| *s)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl VoiceTransport for VoiceBook {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), VoiceError> {
        let previous = self.slots.insert(
            guild_id,
            VoiceSlot {
                channel_id,
                listeners: None,
                connected_at: now_ms(),
            },
        );
        match previous {
            Some(prev) if prev.channel_id != channel_id => {
                info!("[{}] voice moved {} -> {}", guild_id, prev.channel_id, channel_id)
            }
            Some(_) => {}
            None => info!("[{}] voice connected to {}", guild_id, channel_id),
        }
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceError> {
        self.slots
            .remove(&guild_id)
            .map(|_| info!("[{}] voice disconnected", guild_id))
            .ok_or(VoiceError::NotConnected(guild_id))
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        self.slots.contains_key(&guild_id)
    }

    async fn listener_count(&self, guild_id: GuildId) -> Option<usize> {
        self.slots.get(&guild_id).and_then(|s| s.listeners)
    }
}
