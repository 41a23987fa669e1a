use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    // 各フェーズの長さ（tick数）
    pub night_duration: u32,
    pub day_duration: u32,
    pub voting_duration: u32,
    pub tick_interval_ms: u64,
    pub min_players: usize,
    pub max_players: usize,
    // falseの場合はバックグラウンドのタイマーを起動せず、tickは明示的に呼び出す
    pub auto_advance_phases: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            night_duration: 60,
            day_duration: 90,
            voting_duration: 45,
            tick_interval_ms: 1000,
            min_players: 3,
            max_players: 12,
            auto_advance_phases: true,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            night_duration: parse_env("GAME_NIGHT_DURATION").unwrap_or(defaults.night_duration),
            day_duration: parse_env("GAME_DAY_DURATION").unwrap_or(defaults.day_duration),
            voting_duration: parse_env("GAME_VOTING_DURATION")
                .unwrap_or(defaults.voting_duration),
            tick_interval_ms: parse_env("GAME_TICK_INTERVAL_MS")
                .unwrap_or(defaults.tick_interval_ms),
            min_players: parse_env("GAME_MIN_PLAYERS").unwrap_or(defaults.min_players),
            max_players: parse_env("GAME_MAX_PLAYERS").unwrap_or(defaults.max_players),
            auto_advance_phases: env::var("GAME_AUTO_ADVANCE_PHASES")
                .map(|v| v == "true")
                .unwrap_or(defaults.auto_advance_phases),
        }
    }

    /// 手動でtickを進めるテスト用の設定
    pub fn manual() -> Self {
        Self {
            auto_advance_phases: false,
            ..Self::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
