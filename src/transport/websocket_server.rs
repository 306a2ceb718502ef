use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::server::AppState;

/// GET /v1/events
pub async fn events_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

/// Pushes every dispatched notification to the socket as JSON text. The
/// stream is one-way; commands go through the REST api.
async fn stream_events(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();
    info!(
        "event stream connected ({} subscribers)",
        state.events.subscriber_count()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(json) => {
                    if let Err(e) = sender.send(Message::Text(json.to_string().into())).await {
                        warn!("event stream send failed: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event stream subscriber lagging, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(_))) => {
                    warn!("event stream is one-way; use the REST api");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("event stream error: {}", e);
                    break;
                }
            },
        }
    }

    let _ = sender.close().await;
    info!("event stream disconnected");
}
