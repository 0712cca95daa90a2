use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tracing::info;

use crate::api::AppState;
use crate::ws::connection::handle_connection;

/// Handle WebSocket upgrade request on /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let client_id = uuid::Uuid::new_v4().to_string();

    // Join before the upgrade completes so no reading ingested meanwhile is lost
    let subscription = state.pipeline.subscribe();

    info!(
        client_id = %client_id,
        observers = state.pipeline.observer_count(),
        "WebSocket upgrade accepted"
    );

    ws.on_upgrade(move |socket: WebSocket| handle_connection(socket, subscription, client_id))
}
