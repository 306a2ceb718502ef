use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    common::{ApiError, GuildId},
    playback::{EngineError, EngineSnapshot, EntryInfo, Enqueued, PlaybackEngine, VoteOutcome},
    protocol::{ChooseRequest, PlayRequest, RepeatUpdate, SkipRequest, VoiceUpdate},
    server::{AppState, PlayHandler},
    sources::{ChoiceError, LoadRequest},
    voice::{VoiceTransport, book::VoiceSlot},
};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildView {
    #[serde(flatten)]
    pub snapshot: EngineSnapshot,
    pub voice: Option<VoiceSlot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cleared {
    pub cleared: usize,
}

fn engine_or_404(state: &AppState, guild_id: GuildId, uri: &OriginalUri) -> ApiResult<Arc<PlaybackEngine>> {
    state
        .registry
        .get(guild_id)
        .ok_or_else(|| ApiError::not_found(format!("Guild not found: {}", guild_id), uri.0.path()))
}

fn engine_error(error: EngineError, uri: &OriginalUri) -> ApiError {
    match error {
        EngineError::IndexOutOfRange { .. } => ApiError::bad_request(error.to_string(), uri.0.path()),
        _ => ApiError::conflict(error.to_string(), uri.0.path()),
    }
}

fn play_handler(state: &AppState, request: &ChooseRequest) -> PlayHandler {
    PlayHandler::new(
        state.registry.clone(),
        request.text_channel_id,
        state.coordinator.pending().ttl(),
    )
}

/// GET /v1/guilds
pub async fn list_guilds(State(state): State<Arc<AppState>>) -> Json<Vec<EngineSnapshot>> {
    debug!("GET /v1/guilds");
    let mut guilds: Vec<_> = state
        .registry
        .engines()
        .into_iter()
        .map(|(_, engine)| engine.snapshot())
        .collect();
    guilds.sort_by_key(|s| s.guild_id);
    Json(guilds)
}

/// GET /v1/guilds/{guildId}
pub async fn get_guild(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GuildView>> {
    debug!("GET /v1/guilds/{}", guild_id);
    let engine = engine_or_404(&state, guild_id, &uri)?;
    Ok(Json(GuildView {
        snapshot: engine.snapshot(),
        voice: state.voice.slot(guild_id),
    }))
}

/// DELETE /v1/guilds/{guildId}
pub async fn destroy_guild(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    info!("DELETE /v1/guilds/{}", guild_id);
    if state.registry.teardown(guild_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(
            format!("Guild not found: {}", guild_id),
            uri.0.path(),
        ))
    }
}

/// POST /v1/guilds/{guildId}/play
///
/// Answers 202 right away; the outcome arrives on the event stream.
pub async fn play(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlayRequest>,
) -> ApiResult<StatusCode> {
    info!("POST /v1/guilds/{}/play: {}", guild_id, body.query);
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty", uri.0.path()));
    }

    if let Some(channel_id) = body.voice_channel_id {
        if let Err(e) = state.registry.voice().connect(guild_id, channel_id).await {
            warn!("[{}] voice connect failed: {}", guild_id, e);
            return Err(ApiError::conflict(e.to_string(), uri.0.path()));
        }
    }

    let handler = Arc::new(PlayHandler::new(
        state.registry.clone(),
        body.text_channel_id,
        state.coordinator.pending().ttl(),
    ));
    let request = LoadRequest {
        guild_id,
        requester: body.requester,
        query: body.query,
        allow_choice: body.allow_choice,
    };
    state.coordinator.resolve(request, handler);
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/guilds/{guildId}/choose
pub async fn choose(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChooseRequest>,
) -> ApiResult<Json<Enqueued>> {
    info!(
        "POST /v1/guilds/{}/choose: {} picked {}",
        guild_id, body.requester, body.choice
    );
    if body.choice == 0 {
        return Err(ApiError::bad_request("choice is 1-based", uri.0.path()));
    }

    let track = state
        .coordinator
        .pending()
        .choose(guild_id, body.requester, body.choice - 1)
        .map_err(|e| match e {
            ChoiceError::NoPending => ApiError::not_found(e.to_string(), uri.0.path()),
            ChoiceError::OutOfRange { .. } => ApiError::bad_request(e.to_string(), uri.0.path()),
        })?;

    let request = LoadRequest {
        guild_id,
        requester: body.requester,
        query: track.uri.clone(),
        allow_choice: false,
    };
    play_handler(&state, &body)
        .play_track(&request, track)
        .map(Json)
        .map_err(|e| engine_error(e, &uri))
}

/// POST /v1/guilds/{guildId}/skip
pub async fn skip(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SkipRequest>,
) -> ApiResult<Json<EntryInfo>> {
    info!("POST /v1/guilds/{}/skip by {}", guild_id, body.requester);
    let engine = engine_or_404(&state, guild_id, &uri)?;
    engine
        .skip_current(body.requester)
        .map(Json)
        .map_err(|e| engine_error(e, &uri))
}

/// POST /v1/guilds/{guildId}/voteskip
pub async fn vote_skip(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SkipRequest>,
) -> ApiResult<Json<VoteOutcome>> {
    debug!("POST /v1/guilds/{}/voteskip by {}", guild_id, body.requester);
    let engine = engine_or_404(&state, guild_id, &uri)?;
    let listeners = state
        .registry
        .voice()
        .listener_count(guild_id)
        .await
        .unwrap_or(1);
    engine
        .vote_skip(body.requester, listeners)
        .map(Json)
        .map_err(|e| engine_error(e, &uri))
}

/// POST /v1/guilds/{guildId}/pause
pub async fn pause(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/pause", guild_id);
    let engine = engine_or_404(&state, guild_id, &uri)?;
    engine.pause().map_err(|e| engine_error(e, &uri))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/guilds/{guildId}/resume
pub async fn resume(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/resume", guild_id);
    let engine = engine_or_404(&state, guild_id, &uri)?;
    engine.resume().map_err(|e| engine_error(e, &uri))?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /v1/guilds/{guildId}/repeat
pub async fn set_repeat(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RepeatUpdate>,
) -> ApiResult<StatusCode> {
    debug!("PATCH /v1/guilds/{}/repeat: {}", guild_id, body.repeat);
    engine_or_404(&state, guild_id, &uri)?.set_repeat(body.repeat);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/guilds/{guildId}/queue
pub async fn clear_queue(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Cleared>> {
    debug!("DELETE /v1/guilds/{}/queue", guild_id);
    let cleared = engine_or_404(&state, guild_id, &uri)?.clear_queue();
    Ok(Json(Cleared { cleared }))
}

/// DELETE /v1/guilds/{guildId}/queue/{index}
///
/// `index` is 0-based, matching the `queue` array of the guild snapshot.
pub async fn remove_queued(
    Path((guild_id, index)): Path<(GuildId, usize)>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<EntryInfo>> {
    debug!("DELETE /v1/guilds/{}/queue/{}", guild_id, index);
    engine_or_404(&state, guild_id, &uri)?
        .remove_queued(index)
        .map(Json)
        .map_err(|e| engine_error(e, &uri))
}

/// POST /v1/guilds/{guildId}/shuffle
pub async fn shuffle(
    Path(guild_id): Path<GuildId>,
    uri: OriginalUri,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    debug!("POST /v1/guilds/{}/shuffle", guild_id);
    engine_or_404(&state, guild_id, &uri)?.shuffle_queue();
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/guilds/{guildId}/voice
///
/// Voice state reports from the gateway layer. Accepted for guilds without
/// an engine too, so the book is current before the first play request.
pub async fn update_voice(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<VoiceUpdate>,
) -> StatusCode {
    debug!(
        "PUT /v1/guilds/{}/voice: channel={:?} listeners={:?}",
        guild_id, body.channel_id, body.listeners
    );
    state.voice.update(guild_id, body.channel_id, body.listeners);
    StatusCode::NO_CONTENT
}
