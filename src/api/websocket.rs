use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::auth::member_for_token;
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::api::types::{ClientFrame, ServerFrame};
use crate::domain::{GroupId, MemberId};
use crate::hub::ConnectionId;

#[derive(Deserialize)]
pub struct WsAuth {
    token: Option<String>,
}

/// WebSocket handler; requires a member token via ?token= query param.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(auth): Query<WsAuth>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = auth.token.filter(|t| !t.trim().is_empty()) else {
        warn!("WebSocket connection rejected: missing token");
        return Err(ApiError::unauthorized("missing token"));
    };
    let member_id = member_for_token(&state, token.trim()).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, member_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, member_id: MemberId) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut hub_rx) = state.coordinator.hub().connect();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerFrame>(16);
    info!(connection = %connection, member = %member_id, "WebSocket connected");

    // Forward hub messages and control replies to this socket
    let send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                message = hub_rx.recv() => match message {
                    Some(message) => serde_json::to_string(&message),
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => serde_json::to_string(&reply),
                    None => break,
                },
            };

            let json = match json {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "failed to serialize WebSocket frame");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let reply = handle_client_frame(&state, connection, &text).await;
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Axum answers pings itself
            _ => {}
        }
    }

    state.coordinator.hub().unsubscribe(connection);
    send_task.abort();
    info!(connection = %connection, member = %member_id, "WebSocket connection closed");
}

async fn handle_client_frame(state: &AppState, connection: ConnectionId, text: &str) -> ServerFrame {
    let frame = match ClientFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(connection = %connection, error = %e, "unrecognised client frame");
            return ServerFrame::Error {
                message: e.to_string(),
            };
        }
    };

    match frame {
        ClientFrame::JoinGroup { group_id } => {
            match state
                .coordinator
                .subscribe(connection, &GroupId::new(group_id.clone()))
                .await
            {
                Ok(()) => ServerFrame::Joined { group_id },
                Err(e) => ServerFrame::Error {
                    message: e.to_string(),
                },
            }
        }
        ClientFrame::LeaveGroup { group_id } => {
            state
                .coordinator
                .hub()
                .leave(connection, &GroupId::new(group_id.clone()));
            ServerFrame::Left { group_id }
        }
    }
}
