use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mafia_server::{app, utils::config::CONFIG};

// ログ設定（RUST_LOGで上書き可能）
fn init_logger() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("tower_http", LevelFilter::Debug)
        .filter_module("axum", LevelFilter::Debug)
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 環境変数をロード
    if let Err(e) = dotenv() {
        eprintln!("Warning: .envファイルの読み込みに失敗しました: {}", e);
    }

    init_logger(); // ロガーの初期化

    // CORSレイヤーの設定
    let origins = [CONFIG.cors_origin.parse::<HeaderValue>()?];
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION]);

    // ルーティングの設定
    let app = app::create_app().layer(cors).layer(
        TraceLayer::new_for_http() // HTTPトレースログを有効化
            .make_span_with(|request: &http::Request<_>| {
                tracing::info_span!(
                    "HTTP request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
    );

    // サーバーの起動
    let addr = CONFIG.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("サーバーを起動しました: http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
