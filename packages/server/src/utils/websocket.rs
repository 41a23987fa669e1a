use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    models::{delivery::Envelope, game::GameError},
    services::registry::Connection,
    state::AppState,
};

/// クライアントから届くメッセージ
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Action { target_id: String },
    Vote { target_id: String },
    Chat { content: String },
    Ping,
}

/// 送信元のプレイヤーにだけ返す応答
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandReply {
    ActionResult { success: bool, error: Option<String> },
    VoteResult { success: bool, error: Option<String> },
    ChatResult { success: bool, error: Option<String> },
    Pong { timestamp: String },
    Error { message: String },
}

pub async fn handler(
    State(state): State<AppState>,
    Path((room_id, player_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(e) = state.registry.get_state(&room_id).await {
        return e.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, player_id))
        .into_response()
}

async fn dispatch(state: &AppState, room_id: &str, player_id: &str, text: &str) -> CommandReply {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            return CommandReply::Error {
                message: format!("メッセージのフォーマットが不正です: {}", e),
            }
        }
    };

    match message {
        ClientMessage::Action { target_id } => {
            let result = state
                .registry
                .handle_action(room_id, player_id, &target_id)
                .await;
            CommandReply::ActionResult {
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        }
        ClientMessage::Vote { target_id } => {
            let result = state
                .registry
                .handle_vote(room_id, player_id, &target_id)
                .await;
            CommandReply::VoteResult {
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        }
        ClientMessage::Chat { content } => {
            let result = state.registry.handle_chat(room_id, player_id, &content).await;
            CommandReply::ChatResult {
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        }
        ClientMessage::Ping => CommandReply::Pong {
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    }
}

/// 購読を先に始めてから接続を登録する。試合開始時の役職通知は接続前に流れてしまうので、
/// 現在の状態と本人の役職はgreetingとして別に返す
async fn join(
    state: &AppState,
    room_id: &str,
    player_id: &str,
) -> Result<(broadcast::Receiver<Arc<Envelope>>, Connection, Vec<Envelope>), GameError> {
    let rx = state.delivery.subscribe(room_id);
    let (connection, greeting) = state.registry.connect(room_id, player_id).await?;
    Ok((rx, connection, greeting))
}

pub async fn handle_socket(ws: WebSocket, state: AppState, room_id: String, player_id: String) {
    let (mut rx, connection, greeting) = match join(&state, &room_id, &player_id).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Rejecting WebSocket for room {}: {}", room_id, e);
            return;
        }
    };
    info!(
        "New WebSocket connection established for room: {} (player {})",
        room_id, player_id
    );

    let (mut sender, mut receiver) = ws.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<CommandReply>();

    let player_for_send = player_id.clone();
    let mut send_task = tokio::spawn(async move {
        for envelope in greeting {
            let Ok(text) = serde_json::to_string(&envelope.payload) else {
                continue;
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                debug!("Error sending message: {}", e);
                return;
            }
        }

        loop {
            let text = tokio::select! {
                envelope = rx.recv() => match envelope {
                    Ok(envelope) => {
                        // 宛先に含まれないメッセージはスキップ
                        if !envelope.audience.includes(&player_for_send) {
                            continue;
                        }
                        serde_json::to_string(&envelope.payload)
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Player {} lagged behind by {} messages", player_for_send, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => serde_json::to_string(&reply),
                    None => break,
                },
            };

            match text {
                Ok(text) => {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        debug!("Error sending message: {}", e);
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize outbound message: {}", e),
            }
        }
    });

    let state_for_receive = state.clone();
    let room_for_receive = room_id.clone();
    let player_for_receive = player_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = dispatch(
                        &state_for_receive,
                        &room_for_receive,
                        &player_for_receive,
                        &text,
                    )
                    .await;
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    info!("WebSocket closed for room: {} (player {})", room_id, player_id);
    state.registry.disconnect(connection).await;
}
