//! WebSocket bridge: one socket per pipeline subscription.
//!
//! Events are forwarded as JSON text frames in the order the notifier
//! produced them. The subscription is torn down when the client goes away
//! (detected on send failure) or the socket closes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;

pub async fn subscribe(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state, id))
}

async fn stream_events(mut socket: WebSocket, state: AppState, pipeline_id: Uuid) {
    let mut subscription = state.notifier.connect(pipeline_id);
    debug!(%pipeline_id, subscription = subscription.id, "websocket subscribed");

    while let Some(event) = subscription.events.recv().await {
        let Ok(payload) = serde_json::to_string(&event) else {
            continue;
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }

    state.notifier.disconnect(pipeline_id, subscription.id);
    debug!(%pipeline_id, "websocket disconnected");
}
