use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{common::ApiError, server::AppState};

pub const API_VERSION_HEADER: &str = "Tunelink-Api-Version";
pub const API_VERSION: &str = "1";

/// Rejects requests whose `Authorization` header is not the configured
/// password.
pub async fn check_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let problem = match presented {
        Some(password) if password == state.config.server.password => {
            return Ok(next.run(req).await);
        }
        Some(_) => "invalid password",
        None => "missing Authorization header",
    };
    warn!("{} {} rejected: {}", req.method(), req.uri().path(), problem);
    Err(ApiError::new(
        StatusCode::UNAUTHORIZED,
        problem,
        req.uri().path(),
    ))
}

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
    response
}
