//! Request bodies accepted by the REST surface.

use serde::Deserialize;

use crate::common::{ChannelId, UserId};

/// `POST /v1/guilds/{id}/play`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub query: String,
    pub requester: UserId,
    /// Where status messages for this guild should go. Omit for silent
    /// playback.
    #[serde(default)]
    pub text_channel_id: Option<ChannelId>,
    /// Voice channel to join before playing.
    #[serde(default)]
    pub voice_channel_id: Option<ChannelId>,
    /// Offer a choice for multi-hit searches instead of taking the first.
    #[serde(default = "default_true")]
    pub allow_choice: bool,
}

/// `POST /v1/guilds/{id}/choose`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseRequest {
    pub requester: UserId,
    /// 1-based, as shown to the user.
    pub choice: usize,
    #[serde(default)]
    pub text_channel_id: Option<ChannelId>,
}

/// `POST /v1/guilds/{id}/skip` and `/voteskip`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipRequest {
    pub requester: UserId,
}

/// `PATCH /v1/guilds/{id}/repeat`
#[derive(Debug, Clone, Deserialize)]
pub struct RepeatUpdate {
    pub repeat: bool,
}

/// `PUT /v1/guilds/{id}/voice`, sent by the gateway layer whenever the
/// bot's voice state or the channel's audience changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpdate {
    /// `None` when the bot left voice.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub listeners: Option<usize>,
}

fn default_true() -> bool {
    true
}
