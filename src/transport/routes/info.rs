use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::debug;

use crate::{
    protocol::{NodeInfo, Version},
    server::AppState,
};

/// GET /version
pub async fn get_version() -> String {
    debug!("GET /version");
    env!("CARGO_PKG_VERSION").to_string()
}

/// GET /v1/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<NodeInfo> {
    debug!("GET /v1/info");
    Json(NodeInfo {
        version: Version::parse(state.build.version),
        build: state.build.clone(),
        uptime_ms: state.uptime_ms(),
        stats: state.stats(),
    })
}
