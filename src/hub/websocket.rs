//! WebSocket endpoint bridging sockets to the connection manager

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use super::connection::Outbound;
use super::manager::ConnectionManager;
use crate::api::AppState;
use crate::protocol::ProtocolError;

/// Handles WebSocket upgrade requests on `/ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let manager = Arc::clone(&state.manager);
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

/// Drives one established WebSocket until either side ends it.
pub async fn handle_socket(socket: WebSocket, manager: Arc<ConnectionManager>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut outbound) = manager.accept().await;
    let client_id = connection.id.clone();

    // Writer: drain the outbound queue until the connection is closed.
    let writer = Arc::clone(&connection);
    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = writer.closed() => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                frame = outbound.recv() => match frame {
                    Some(Outbound::Text(text)) => Message::Text(text.to_string()),
                    Some(Outbound::Ping) => Message::Ping(Vec::new()),
                    None => break,
                },
            };

            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Reader: every inbound frame counts as liveness.
    let reader = Arc::clone(&connection);
    let reader_manager = Arc::clone(&manager);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => reader_manager.handle_text(&reader, &text).await,
                Ok(Message::Binary(_)) => {
                    reader_manager.record_liveness(&reader);
                    tracing::debug!(
                        client_id = %reader.id,
                        error = %ProtocolError::BinaryFrame,
                        "Dropping binary frame"
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    reader_manager.record_liveness(&reader);
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!(client_id = %reader.id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    manager.disconnect(&client_id).await;
}
