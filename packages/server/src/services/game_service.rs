use serde::{Deserialize, Serialize};

use crate::{
    models::{
        chat::ChatMessage,
        game::{GameError, GameState},
        player::{Player, PublicPlayer},
    },
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct StartGameRequest {
    pub players: Vec<Player>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub state: GameState,
    pub players: Vec<PublicPlayer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub actor_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub sender_id: String,
    pub content: String,
}

/// 役職は各プレイヤーへ個別に配信済みなので、レスポンスには公開情報のみを含める
pub async fn start_game(
    state: &AppState,
    room_id: &str,
    request: StartGameRequest,
) -> Result<StartGameResponse, GameError> {
    let (game_state, players) = state.registry.start_game(room_id, request.players).await?;
    Ok(StartGameResponse {
        state: game_state,
        players: players.iter().map(|p| p.to_public()).collect(),
    })
}

pub async fn get_game_state(state: &AppState, room_id: &str) -> Result<GameState, GameError> {
    state.registry.get_state(room_id).await
}

pub async fn get_players(state: &AppState, room_id: &str) -> Result<Vec<PublicPlayer>, GameError> {
    state.registry.get_players(room_id).await
}

pub async fn process_night_action(
    state: &AppState,
    room_id: &str,
    request: NightActionRequest,
) -> Result<(), GameError> {
    state
        .registry
        .handle_action(room_id, &request.actor_id, &request.target_id)
        .await
}

pub async fn handle_vote(
    state: &AppState,
    room_id: &str,
    request: VoteRequest,
) -> Result<(), GameError> {
    state
        .registry
        .handle_vote(room_id, &request.voter_id, &request.target_id)
        .await
}

pub async fn handle_chat(
    state: &AppState,
    room_id: &str,
    request: ChatRequest,
) -> Result<ChatMessage, GameError> {
    state
        .registry
        .handle_chat(room_id, &request.sender_id, &request.content)
        .await
}

// デバッグ用：次のフェーズに強制的に進める
pub async fn force_next_phase(state: &AppState, room_id: &str) -> Result<GameState, GameError> {
    state.registry.advance_phase(room_id).await
}

pub async fn end_game(state: &AppState, room_id: &str) -> Result<(), GameError> {
    if state.registry.teardown(room_id).await {
        Ok(())
    } else {
        Err(GameError::GameNotFound(room_id.to_string()))
    }
}
