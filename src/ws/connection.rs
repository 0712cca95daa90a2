use crate::ingest::Subscription;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Handle a WebSocket connection
pub async fn handle_connection(socket: WebSocket, mut subscription: Subscription, client_id: String) {
    info!("WebSocket client connected: {}", client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Replies to client frames are funnelled through the send task
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);

    let send_client_id = client_id.clone();
    let recv_client_id = client_id.clone();

    let mut send_task = tokio::spawn(async move {
        // The latest reading goes to this client only, before any live reading
        if let Some(reading) = subscription.take_replay() {
            debug!("Replaying latest reading to client {}", send_client_id);
            match ServerMessage::reading(&reading) {
                Ok(msg) => {
                    if send_message(&mut ws_sender, &msg).await.is_err() {
                        return;
                    }
                }
                Err(e) => error!("Failed to serialize reading: {}", e),
            }
        }

        loop {
            let msg = tokio::select! {
                received = subscription.recv() => match received {
                    Ok(reading) => match ServerMessage::reading(&reading) {
                        Ok(msg) => msg,
                        Err(e) => {
                            error!("Failed to serialize reading: {}", e);
                            continue;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} readings", send_client_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if send_message(&mut ws_sender, &msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => {
                            debug!("Received ping from client {}", recv_client_id);
                            ServerMessage::pong()
                        }
                        Err(e) => {
                            warn!("Failed to parse client message: {}", e);
                            ServerMessage::error(e.to_string(), "BAD_MESSAGE")
                        }
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    info!("Client {} closed connection", recv_client_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                Message::Binary(_) => {
                    warn!("Received unexpected binary message from client {}", recv_client_id);
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            info!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            info!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}

async fn send_message(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(e) => {
            // Nothing to send; keep the connection alive
            error!("Failed to serialize message: {}", e);
            return Ok(());
        }
    };

    ws_sender.send(Message::Text(json.into())).await.map_err(|e| {
        error!("Failed to send message to WebSocket: {}", e);
        e
    })
}
