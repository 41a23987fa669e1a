use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mafia_server::{
    app,
    models::{config::GameConfig, game::GameState, role::Role},
    state::AppState,
};
use serde_json::json;
use tower::ServiceExt;

fn test_app() -> (Router, AppState) {
    let state = AppState::with_config(GameConfig::manual());
    (app::create_app_with_state(state.clone()), state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn start(app: &Router, room_id: &str, count: usize) {
    let players: Vec<serde_json::Value> = (1..=count)
        .map(|i| json!({ "id": i.to_string(), "name": format!("Player{}", i) }))
        .collect();
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/game/{}/start", room_id),
            json!({ "players": players }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_start_and_get_state() {
    let (app, _) = test_app();
    start(&app, "room1", 5).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/game/room1/state")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let state: GameState = serde_json::from_slice(&body).unwrap();
    assert_eq!(state.room_id, "room1");
    assert_eq!(state.round, 1);

    let request = Request::builder()
        .method("GET")
        .uri("/api/game/room1/players")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let players = body_json(response).await;
    assert_eq!(players.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_night_action_flow() {
    let (app, state) = test_app();
    start(&app, "room1", 4).await;

    let mafia = state
        .registry
        .inspect("room1", |game| {
            game.players()
                .iter()
                .find(|p| p.role == Role::Mafia)
                .map(|p| p.id.clone())
        })
        .await
        .unwrap()
        .unwrap();
    let target = if mafia == "1" { "2" } else { "1" };

    let request = post_json(
        "/api/game/room1/actions/night-action",
        json!({ "actor_id": mafia, "target_id": target }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));

    // 同じ夜に二度目の行動はできない
    let request = post_json(
        "/api/game/room1/actions/night-action",
        json!({ "actor_id": mafia, "target_id": target }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 夜明け: 護衛役のいない4人戦なので対象は死亡する
    let response = app
        .clone()
        .oneshot(post_json("/api/game/room1/phase/next", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["phase"], "day");
    assert_eq!(json["last_killed"], format!("Player{}", target));
}

#[tokio::test]
async fn test_vote_and_chat() {
    let (app, _) = test_app();
    start(&app, "room1", 4).await;

    for _ in 0..2 {
        app.clone()
            .oneshot(post_json("/api/game/room1/phase/next", json!({})))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/game/room1/actions/vote",
            json!({ "voter_id": "1", "target_id": "2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/game/room1/chat",
            json!({ "sender_id": "3", "content": "why 2?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let message = body_json(response).await;
    assert_eq!(message["message_type"], "public");
    assert_eq!(message["player_name"], "Player3");

    let response = app
        .oneshot(post_json(
            "/api/game/room1/chat",
            json!({ "sender_id": "99", "content": "hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_game() {
    let (app, _) = test_app();
    let response = app
        .oneshot(post_json(
            "/api/game/missing/actions/vote",
            json!({ "voter_id": "1", "target_id": "2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}
