use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        // テストでは短いフェーズと手動tickを使う
        if std::env::var("GAME_AUTO_ADVANCE_PHASES").is_err() {
            std::env::set_var("GAME_AUTO_ADVANCE_PHASES", "false");
        }
        if std::env::var("GAME_TICK_INTERVAL_MS").is_err() {
            std::env::set_var("GAME_TICK_INTERVAL_MS", "10");
        }
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
