use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::{
    models::game::GameError,
    services::game_service::{
        self, ChatRequest, NightActionRequest, StartGameRequest, VoteRequest,
    },
    utils::websocket,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub success: bool,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match self {
            GameError::GameNotFound(_) => StatusCode::NOT_FOUND,
            GameError::GameAlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn accepted(result: Result<(), GameError>) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(AcceptedResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:roomid",
            Router::new()
                // ゲームの基本操作
                // curl -X POST http://localhost:8080/api/game/{roomid}/start -H 'Content-Type: application/json' -d '{"players":[...]}'
                .route("/start", post(start_game))
                .route("/end", post(end_game_handler))
                .route("/state", get(get_game_state))
                .route("/players", get(get_players))
                .route("/chat", post(chat_handler))
                // ゲームアクション
                .nest(
                    "/actions",
                    Router::new()
                        .route("/vote", post(cast_vote_handler))
                        .route("/night-action", post(night_action_handler)),
                )
                // ゲーム進行の管理
                .route("/phase/next", post(advance_phase_handler))
                // WebSocket接続
                // websocat ws://localhost:8080/api/game/{roomid}/ws/{playerid}
                .route("/ws/:playerid", get(websocket::handler)),
        )
        .with_state(state)
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<StartGameRequest>,
) -> Response {
    match game_service::start_game(&state, &room_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_game_state(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match game_service::get_game_state(&state, &room_id).await {
        Ok(game_state) => (StatusCode::OK, Json(game_state)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_players(Path(room_id): Path<String>, State(state): State<AppState>) -> Response {
    match game_service::get_players(&state, &room_id).await {
        Ok(players) => (StatusCode::OK, Json(players)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn end_game_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Response {
    accepted(game_service::end_game(&state, &room_id).await)
}

async fn night_action_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<NightActionRequest>,
) -> Response {
    accepted(game_service::process_night_action(&state, &room_id, request).await)
}

async fn cast_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Response {
    accepted(game_service::handle_vote(&state, &room_id, request).await)
}

async fn chat_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match game_service::handle_chat(&state, &room_id, request).await {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Response {
    match game_service::force_next_phase(&state, &room_id).await {
        Ok(game_state) => (StatusCode::OK, Json(game_state)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::GameConfig;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    fn start_request(room_id: &str, count: usize) -> Request<Body> {
        let players: Vec<serde_json::Value> = (1..=count)
            .map(|i| serde_json::json!({ "id": i.to_string(), "name": format!("Player{}", i) }))
            .collect();
        Request::builder()
            .method("POST")
            .uri(format!("/{}/start", room_id))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "players": players }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_game() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state.clone());

        let response = app.oneshot(start_request("room1", 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["state"]["phase"], "night");
        assert_eq!(json["players"].as_array().unwrap().len(), 5);
        // 役職は公開レスポンスに含まれない
        assert!(json["players"][0].get("role").is_none());
        assert!(state.registry.contains("room1").await);
    }

    #[tokio::test]
    async fn test_start_game_twice_conflicts() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state);

        let response = app.clone().oneshot(start_request("room1", 3)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(start_request("room1", 3)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_start_game_with_too_few_players() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state);

        let response = app.oneshot(start_request("room1", 2)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state);

        let request = Request::builder()
            .method("GET")
            .uri("/missing/state")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_vote_in_night_is_rejected() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state);
        app.clone().oneshot(start_request("room1", 4)).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/room1/actions/vote")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"voter_id":"1","target_id":"2"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!error.success);
    }

    #[tokio::test]
    async fn test_end_game() {
        let state = AppState::with_config(GameConfig::manual());
        let app = routes(state.clone());
        app.clone().oneshot(start_request("room1", 3)).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/room1/end")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.registry.contains("room1").await);

        let request = Request::builder()
            .method("POST")
            .uri("/room1/end")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
