use std::{collections::HashMap, sync::Arc};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{sync::Mutex, task::JoinHandle};

use super::delivery::Delivery;
use crate::models::{
    chat::ChatMessage,
    config::GameConfig,
    delivery::{Envelope, Payload},
    game::{Game, GameError, GameState},
    player::{GamePlayer, Player, PublicPlayer},
};

struct GameEntry {
    game: Arc<Mutex<Game>>,
    ticker: Option<JoinHandle<()>>,
    connections: usize,
}

struct RegistryInner {
    games: Mutex<HashMap<String, GameEntry>>,
    delivery: Arc<dyn Delivery>,
    config: GameConfig,
    rng: std::sync::Mutex<StdRng>,
}

/// WebSocket接続1本分。接続時点の試合を覚えておき、同じルームで始まった別の試合と区別する
pub struct Connection {
    room_id: String,
    player_id: String,
    game: Arc<Mutex<Game>>,
}

#[derive(Clone)]
pub struct GameRegistry {
    inner: Arc<RegistryInner>,
}

impl GameRegistry {
    pub fn new(config: GameConfig, delivery: Arc<dyn Delivery>) -> Self {
        Self::with_rng(config, delivery, StdRng::from_entropy())
    }

    /// 役職割り当ての乱数を固定する（テスト用）
    pub fn with_seed(config: GameConfig, delivery: Arc<dyn Delivery>, seed: u64) -> Self {
        Self::with_rng(config, delivery, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, delivery: Arc<dyn Delivery>, rng: StdRng) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                games: Mutex::new(HashMap::new()),
                delivery,
                config,
                rng: std::sync::Mutex::new(rng),
            }),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    /// 試合を開始し、初期状態と役職付きの名簿を返す
    pub async fn start_game(
        &self,
        room_id: &str,
        players: Vec<Player>,
    ) -> Result<(GameState, Vec<GamePlayer>), GameError> {
        let mut games = self.inner.games.lock().await;
        if games.contains_key(room_id) {
            return Err(GameError::GameAlreadyExists(room_id.to_string()));
        }

        let mut game = {
            let mut rng = self.inner.rng.lock().unwrap_or_else(|e| e.into_inner());
            Game::new(room_id.to_string(), players, &self.inner.config, &mut *rng)?
        };
        for envelope in game.opening() {
            self.inner.delivery.deliver(room_id, envelope);
        }
        let snapshot = (game.state().clone(), game.players().to_vec());

        let game = Arc::new(Mutex::new(game));
        let ticker = self
            .inner
            .config
            .auto_advance_phases
            .then(|| self.spawn_ticker(room_id.to_string(), game.clone()));
        games.insert(
            room_id.to_string(),
            GameEntry {
                game,
                ticker,
                connections: 0,
            },
        );

        log::info!(
            "room {}: game started with {} players",
            room_id,
            snapshot.1.len()
        );
        Ok(snapshot)
    }

    fn spawn_ticker(&self, room_id: String, game: Arc<Mutex<Game>>) -> JoinHandle<()> {
        let registry = self.clone();
        let period = self.inner.config.tick_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // 最初のtickは即座に完了するので読み捨てる
            interval.tick().await;
            loop {
                interval.tick().await;
                let finished = {
                    let mut game = game.lock().await;
                    registry.deliver_all(&room_id, game.tick());
                    game.is_finished()
                };
                if finished {
                    registry.finish(&room_id, &game).await;
                    break;
                }
            }
        })
    }

    fn deliver_all(&self, room_id: &str, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            self.inner.delivery.deliver(room_id, envelope);
        }
    }

    /// 勝敗が決まった試合を破棄する。既に別の試合に置き換わっている場合は何もしない
    async fn finish(&self, room_id: &str, game: &Arc<Mutex<Game>>) {
        let mut games = self.inner.games.lock().await;
        let same = games
            .get(room_id)
            .map(|entry| Arc::ptr_eq(&entry.game, game))
            .unwrap_or(false);
        if same {
            if let Some(entry) = games.remove(room_id) {
                self.release(room_id, entry);
            }
            log::info!("room {}: finished game released", room_id);
        }
    }

    /// タイマーを止めて配信チャネルを閉じる
    fn release(&self, room_id: &str, entry: GameEntry) {
        if let Some(ticker) = entry.ticker {
            ticker.abort();
        }
        self.inner.delivery.close(room_id);
    }

    async fn game(&self, room_id: &str) -> Result<Arc<Mutex<Game>>, GameError> {
        let games = self.inner.games.lock().await;
        games
            .get(room_id)
            .map(|entry| entry.game.clone())
            .ok_or_else(|| {
                log::debug!("room {}: command for unknown game", room_id);
                GameError::GameNotFound(room_id.to_string())
            })
    }

    pub async fn handle_action(
        &self,
        room_id: &str,
        actor_id: &str,
        target_id: &str,
    ) -> Result<(), GameError> {
        let game = self.game(room_id).await?;
        let mut game = game.lock().await;
        game.submit_action(actor_id, target_id).map_err(|e| {
            log::debug!("room {}: action by {} rejected: {}", room_id, actor_id, e);
            e
        })
    }

    pub async fn handle_vote(
        &self,
        room_id: &str,
        voter_id: &str,
        target_id: &str,
    ) -> Result<(), GameError> {
        let game = self.game(room_id).await?;
        let mut game = game.lock().await;
        game.submit_vote(voter_id, target_id).map_err(|e| {
            log::debug!("room {}: vote by {} rejected: {}", room_id, voter_id, e);
            e
        })?;
        self.inner.delivery.deliver(
            room_id,
            Envelope::everyone(Payload::State(game.state().clone())),
        );
        Ok(())
    }

    pub async fn handle_chat(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, GameError> {
        let game = self.game(room_id).await?;
        let mut game = game.lock().await;
        let (message, audience) = game.submit_chat(sender_id, content)?;
        self.inner.delivery.deliver(
            room_id,
            Envelope {
                audience,
                payload: Payload::Chat(message.clone()),
            },
        );
        Ok(message)
    }

    /// タイマーを使わずに1tick進める
    pub async fn tick(&self, room_id: &str) -> Result<GameState, GameError> {
        let game = self.game(room_id).await?;
        let (state, finished) = {
            let mut guard = game.lock().await;
            self.deliver_all(room_id, guard.tick());
            (guard.state().clone(), guard.is_finished())
        };
        if finished {
            self.finish(room_id, &game).await;
        }
        Ok(state)
    }

    /// 残り時間を無視して次のフェーズへ進める
    pub async fn advance_phase(&self, room_id: &str) -> Result<GameState, GameError> {
        let game = self.game(room_id).await?;
        let (state, finished) = {
            let mut guard = game.lock().await;
            let envelopes = guard.advance_phase()?;
            self.deliver_all(room_id, envelopes);
            (guard.state().clone(), guard.is_finished())
        };
        if finished {
            self.finish(room_id, &game).await;
        }
        Ok(state)
    }

    pub async fn get_state(&self, room_id: &str) -> Result<GameState, GameError> {
        let game = self.game(room_id).await?;
        let state = game.lock().await.state().clone();
        Ok(state)
    }

    pub async fn get_players(&self, room_id: &str) -> Result<Vec<PublicPlayer>, GameError> {
        let game = self.game(room_id).await?;
        let players = game.lock().await.public_players();
        Ok(players)
    }

    /// 試合の状態を読み取る
    pub async fn inspect<T>(
        &self,
        room_id: &str,
        f: impl FnOnce(&Game) -> T,
    ) -> Result<T, GameError> {
        let game = self.game(room_id).await?;
        let guard = game.lock().await;
        Ok(f(&guard))
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        self.inner.games.lock().await.contains_key(room_id)
    }

    pub async fn game_count(&self) -> usize {
        self.inner.games.lock().await.len()
    }

    /// タイマーを止めて試合を破棄する。2回目以降の呼び出しは何もせずfalseを返す
    pub async fn teardown(&self, room_id: &str) -> bool {
        let entry = self.inner.games.lock().await.remove(room_id);
        match entry {
            Some(entry) => {
                self.release(room_id, entry);
                log::info!("room {}: game torn down", room_id);
                true
            }
            None => false,
        }
    }

    /// 接続を登録し、現在の状態と本人の役職を本人宛てに返す
    pub async fn connect(
        &self,
        room_id: &str,
        player_id: &str,
    ) -> Result<(Connection, Vec<Envelope>), GameError> {
        let mut games = self.inner.games.lock().await;
        let entry = games
            .get_mut(room_id)
            .ok_or_else(|| GameError::GameNotFound(room_id.to_string()))?;
        let greeting = entry.game.lock().await.greeting(player_id)?;
        entry.connections += 1;
        log::debug!(
            "room {}: {} connected ({} connections)",
            room_id,
            player_id,
            entry.connections
        );
        let connection = Connection {
            room_id: room_id.to_string(),
            player_id: player_id.to_string(),
            game: entry.game.clone(),
        };
        Ok((connection, greeting))
    }

    /// 最後の接続が切れたら試合を破棄する。接続後に試合が入れ替わっていれば何もしない
    pub async fn disconnect(&self, connection: Connection) {
        let Connection {
            room_id,
            player_id,
            game,
        } = connection;
        let mut games = self.inner.games.lock().await;
        let Some(entry) = games
            .get_mut(&room_id)
            .filter(|entry| Arc::ptr_eq(&entry.game, &game))
        else {
            log::debug!("room {}: {} left a game that is already gone", room_id, player_id);
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        log::debug!(
            "room {}: {} disconnected ({} connections)",
            room_id,
            player_id,
            entry.connections
        );
        if entry.connections == 0 {
            if let Some(entry) = games.remove(&room_id) {
                self.release(&room_id, entry);
            }
            log::info!("room {}: last connection closed, game torn down", room_id);
        }
    }
}
