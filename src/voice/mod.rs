//! Voice connection contract. The actual media connection lives in the
//! bot's gateway layer; the engine only needs to know whether a guild is
//! connected and how many people are listening.

pub mod book;

use async_trait::async_trait;

pub use book::VoiceBook;

use crate::common::{ChannelId, GuildId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("guild {0} has no voice connection")]
    NotConnected(GuildId),
    #[error("voice transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), VoiceError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), VoiceError>;

    async fn is_connected(&self, guild_id: GuildId) -> bool;

    /// Non-bot, non-deafened members in the connected channel. `None` when
    /// unknown.
    async fn listener_count(&self, guild_id: GuildId) -> Option<usize>;
}
