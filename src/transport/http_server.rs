use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes::{guilds, info},
        websocket_server,
    },
};

const API_V1: &str = "/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/info", get(info::get_info))
        .route("/events", get(websocket_server::events_handler))
        .route("/guilds", get(guilds::list_guilds))
        .route(
            "/guilds/{guild_id}",
            get(guilds::get_guild).delete(guilds::destroy_guild),
        )
        .route("/guilds/{guild_id}/play", post(guilds::play))
        .route("/guilds/{guild_id}/choose", post(guilds::choose))
        .route("/guilds/{guild_id}/skip", post(guilds::skip))
        .route("/guilds/{guild_id}/voteskip", post(guilds::vote_skip))
        .route("/guilds/{guild_id}/pause", post(guilds::pause))
        .route("/guilds/{guild_id}/resume", post(guilds::resume))
        .route("/guilds/{guild_id}/repeat", patch(guilds::set_repeat))
        .route("/guilds/{guild_id}/queue", delete(guilds::clear_queue))
        .route(
            "/guilds/{guild_id}/queue/{index}",
            delete(guilds::remove_queued),
        )
        .route("/guilds/{guild_id}/shuffle", post(guilds::shuffle))
        .route("/guilds/{guild_id}/voice", put(guilds::update_voice));

    Router::new()
        .nest(API_V1, v1_routes)
        .route("/version", get(info::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
