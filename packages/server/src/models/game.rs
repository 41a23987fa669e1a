use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{
    chat::{ChatLog, ChatMessage, ChatMessageType},
    config::GameConfig,
    delivery::{Audience, Envelope, Payload},
    player::{GamePlayer, Player, PublicPlayer},
};
use crate::services::{channel_router, resolution, role_service};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Night,   // 夜フェーズ
    Day,     // 議論フェーズ
    Voting,  // 投票フェーズ
    Results, // 結果発表（終端）
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Night => write!(f, "night"),
            GamePhase::Day => write!(f, "day"),
            GamePhase::Voting => write!(f, "voting"),
            GamePhase::Results => write!(f, "results"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    InProgress,
    MafiaWin,     // マフィア陣営勝利
    InnocentsWin, // 市民陣営勝利
}

/// フェーズ遷移時に全員へ通知される出来事
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    NightStart { round: u32 },
    DayStart,
    PlayerDied { player_id: String, name: String },
    NoDeath,
    VotingStart,
    PlayerVotedOut { player_id: String, name: String },
    NoVoteElimination,
    GameOver { winner: GameResult },
    InvestigationResult {
        target_id: String,
        target_name: String,
        is_mafia: bool,
    },
}

impl GameEvent {
    fn narrative(&self) -> String {
        match self {
            GameEvent::NightStart { round } => format!("Night {} falls. The town sleeps.", round),
            GameEvent::DayStart => "The sun rises.".to_string(),
            GameEvent::PlayerDied { name, .. } => format!("{} was killed during the night.", name),
            GameEvent::NoDeath => "Nobody died last night.".to_string(),
            GameEvent::VotingStart => "Voting has started.".to_string(),
            GameEvent::PlayerVotedOut { name, .. } => {
                format!("{} was eliminated by the town.", name)
            }
            GameEvent::NoVoteElimination => "The town could not decide.".to_string(),
            GameEvent::GameOver { winner } => match winner {
                GameResult::MafiaWin => "The mafia wins.".to_string(),
                GameResult::InnocentsWin => "The innocents win.".to_string(),
                GameResult::InProgress => "The game is over.".to_string(),
            },
            GameEvent::InvestigationResult {
                target_name,
                is_mafia,
                ..
            } => {
                if *is_mafia {
                    format!("{} is a member of the mafia.", target_name)
                } else {
                    format!("{} is not a member of the mafia.", target_name)
                }
            }
        }
    }
}

/// 全員に配信される試合状態のスナップショット
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub room_id: String,
    pub phase: GamePhase,
    pub round: u32,
    pub time_left: u32,
    pub votes: HashMap<String, String>, // 投票者ID -> 対象ID
    pub last_killed: Option<String>,
    pub last_voted: Option<String>,
    pub result: GameResult,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("ゲームが見つかりません: {0}")]
    GameNotFound(String),
    #[error("ゲームは既に開始されています: {0}")]
    GameAlreadyExists(String),
    #[error("プレイヤーが足りません（最低{min}人、現在{actual}人）")]
    NotEnoughPlayers { min: usize, actual: usize },
    #[error("プレイヤーが多すぎます（最大{max}人、現在{actual}人）")]
    TooManyPlayers { max: usize, actual: usize },
    #[error("プレイヤーIDが重複しています: {0}")]
    DuplicatePlayer(String),
    #[error("プレイヤーが見つかりません: {0}")]
    PlayerNotFound(String),
    #[error("プレイヤーは既に死亡しています: {0}")]
    PlayerDead(String),
    #[error("このフェーズでは既に行動済みです: {0}")]
    AlreadyActed(String),
    #[error("対象プレイヤーが見つかりません: {0}")]
    TargetNotFound(String),
    #[error("対象プレイヤーは既に死亡しています: {0}")]
    TargetDead(String),
    #[error("現在のフェーズでは実行できません（必要: {expected}、現在: {actual}）")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("ゲームは既に終了しています")]
    GameFinished,
    #[error("メッセージが空です")]
    EmptyMessage,
}

/// 1試合分の状態とフェーズ遷移
///
/// 時間の経過は`tick`の呼び出しでのみ進む。タイマーの管理は呼び出し側（レジストリ）の責務。
#[derive(Debug)]
pub struct Game {
    pub room_id: String,
    players: Vec<GamePlayer>,
    state: GameState,
    actions: HashMap<String, String>, // 行動者ID -> 対象ID（現在の夜のみ有効）
    config: GameConfig,
    public_chat: ChatLog,
    faction_chat: ChatLog,
}

impl Game {
    pub fn new<R: Rng + ?Sized>(
        room_id: String,
        players: Vec<Player>,
        config: &GameConfig,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        if players.len() < config.min_players {
            return Err(GameError::NotEnoughPlayers {
                min: config.min_players,
                actual: players.len(),
            });
        }
        if players.len() > config.max_players {
            return Err(GameError::TooManyPlayers {
                max: config.max_players,
                actual: players.len(),
            });
        }
        let mut seen = HashSet::new();
        for player in &players {
            if !seen.insert(player.id.as_str()) {
                return Err(GameError::DuplicatePlayer(player.id.clone()));
            }
        }

        let players = role_service::assign_roles(players, rng);
        let state = GameState {
            room_id: room_id.clone(),
            phase: GamePhase::Night,
            round: 1,
            time_left: config.night_duration,
            votes: HashMap::new(),
            last_killed: None,
            last_voted: None,
            result: GameResult::InProgress,
        };

        Ok(Game {
            public_chat: ChatLog::new(room_id.clone()),
            faction_chat: ChatLog::new(room_id.clone()),
            room_id,
            players,
            state,
            actions: HashMap::new(),
            config: config.clone(),
        })
    }

    /// 開始時の配信内容: 状態、名簿、各プレイヤーへの役職通知、夜の開始
    pub fn opening(&mut self) -> Vec<Envelope> {
        let mut out = vec![
            Envelope::everyone(Payload::State(self.state.clone())),
            Envelope::everyone(Payload::Players(self.public_players())),
        ];
        for player in &self.players {
            out.push(Envelope::player(&player.id, Payload::Role(player.clone())));
        }
        self.announce(GameEvent::NightStart { round: 1 }, &mut out);
        out
    }

    /// 途中から接続したプレイヤー向けに、現在の状態・名簿・本人の役職を返す
    pub fn greeting(&self, player_id: &str) -> Result<Vec<Envelope>, GameError> {
        let player = self
            .player(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        Ok(vec![
            Envelope::player(player_id, Payload::State(self.state.clone())),
            Envelope::player(player_id, Payload::Players(self.public_players())),
            Envelope::player(player_id, Payload::Role(player.clone())),
        ])
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == GamePhase::Results
    }

    pub fn players(&self) -> &[GamePlayer] {
        &self.players
    }

    pub fn player(&self, player_id: &str) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn public_players(&self) -> Vec<PublicPlayer> {
        self.players.iter().map(GamePlayer::to_public).collect()
    }

    pub fn pending_actions(&self) -> &HashMap<String, String> {
        &self.actions
    }

    pub fn public_chat(&self) -> &ChatLog {
        &self.public_chat
    }

    pub fn faction_chat(&self) -> &ChatLog {
        &self.faction_chat
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::GameFinished);
        }
        if self.state.phase != expected {
            return Err(GameError::WrongPhase {
                expected,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    fn living_player(&self, player_id: &str) -> Result<&GamePlayer, GameError> {
        let player = self
            .player(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        if !player.is_alive {
            return Err(GameError::PlayerDead(player_id.to_string()));
        }
        Ok(player)
    }

    fn living_target(&self, target_id: &str) -> Result<(), GameError> {
        let target = self
            .player(target_id)
            .ok_or_else(|| GameError::TargetNotFound(target_id.to_string()))?;
        if !target.is_alive {
            return Err(GameError::TargetDead(target_id.to_string()));
        }
        Ok(())
    }

    /// 夜の行動を登録する。行動できるのは各夜に1回のみ
    pub fn submit_action(&mut self, actor_id: &str, target_id: &str) -> Result<(), GameError> {
        self.require_phase(GamePhase::Night)?;
        if !self.living_player(actor_id)?.can_act {
            return Err(GameError::AlreadyActed(actor_id.to_string()));
        }
        self.living_target(target_id)?;

        self.actions
            .insert(actor_id.to_string(), target_id.to_string());
        if let Some(actor) = self.players.iter_mut().find(|p| p.id == actor_id) {
            actor.can_act = false;
        }
        Ok(())
    }

    /// 投票を登録する。同じ投票者の再投票は上書きされる
    pub fn submit_vote(&mut self, voter_id: &str, target_id: &str) -> Result<(), GameError> {
        self.require_phase(GamePhase::Voting)?;
        self.living_player(voter_id)?;
        self.living_target(target_id)?;

        self.state
            .votes
            .insert(voter_id.to_string(), target_id.to_string());
        Ok(())
    }

    /// 生存者のチャットを公開範囲とともに返す
    pub fn submit_chat(
        &mut self,
        sender_id: &str,
        content: &str,
    ) -> Result<(ChatMessage, Audience), GameError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(GameError::EmptyMessage);
        }
        let sender = self.living_player(sender_id)?;
        let (message_type, audience) =
            channel_router::route_chat(&self.state.phase, sender, &self.players);
        let message = ChatMessage::new(
            sender.id.clone(),
            sender.name.clone(),
            content.to_string(),
            message_type,
        );

        match message_type {
            ChatMessageType::Faction => self.faction_chat.add_message(message.clone()),
            _ => self.public_chat.add_message(message.clone()),
        }
        Ok((message, audience))
    }

    /// 残り時間を1減らし、0になったらフェーズを遷移させる。終了後は何もしない
    pub fn tick(&mut self) -> Vec<Envelope> {
        if self.is_finished() {
            return Vec::new();
        }

        let mut out = Vec::new();
        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.time_left == 0 {
            self.next_phase(&mut out);
        }

        out.push(Envelope::everyone(Payload::State(self.state.clone())));
        out.push(Envelope::everyone(Payload::Players(self.public_players())));
        out
    }

    /// タイマーを待たずに次のフェーズへ進める（デバッグ用）
    pub fn advance_phase(&mut self) -> Result<Vec<Envelope>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameFinished);
        }
        self.state.time_left = 1;
        Ok(self.tick())
    }

    fn next_phase(&mut self, out: &mut Vec<Envelope>) {
        let from = self.state.phase;
        match from {
            GamePhase::Night => self.end_night(out),
            GamePhase::Day => {
                self.state.votes.clear();
                self.state.phase = GamePhase::Voting;
                self.state.time_left = self.config.voting_duration;
                self.announce(GameEvent::VotingStart, out);
            }
            GamePhase::Voting => self.end_voting(out),
            GamePhase::Results => return,
        }
        log::debug!(
            "room {}: {} -> {} (round {})",
            self.room_id,
            from,
            self.state.phase,
            self.state.round
        );
    }

    fn end_night(&mut self, out: &mut Vec<Envelope>) {
        let outcome = resolution::resolve_night(&self.actions, &self.players);
        let victim = outcome.victim.and_then(|id| self.eliminate(&id));

        self.state.last_killed = victim.as_ref().map(|(_, name)| name.clone());
        self.reset_actions();
        self.state.phase = GamePhase::Day;
        self.state.time_left = self.config.day_duration;

        self.announce(GameEvent::DayStart, out);
        match victim {
            Some((player_id, name)) => {
                self.announce(GameEvent::PlayerDied { player_id, name }, out)
            }
            None => self.announce(GameEvent::NoDeath, out),
        }
        for investigation in outcome.investigations {
            out.push(Envelope::player(
                &investigation.detective_id,
                Payload::Event(GameEvent::InvestigationResult {
                    target_id: investigation.target_id,
                    target_name: investigation.target_name,
                    is_mafia: investigation.is_mafia,
                }),
            ));
        }
    }

    fn end_voting(&mut self, out: &mut Vec<Envelope>) {
        let voted = resolution::resolve_votes(&self.state.votes, &self.players)
            .and_then(|id| self.eliminate(&id));

        self.state.last_voted = voted.as_ref().map(|(_, name)| name.clone());
        match voted {
            Some((player_id, name)) => {
                self.announce(GameEvent::PlayerVotedOut { player_id, name }, out)
            }
            None => self.announce(GameEvent::NoVoteElimination, out),
        }

        let result = resolution::check_winner(&self.players);
        if result != GameResult::InProgress {
            self.actions.clear();
            self.state.phase = GamePhase::Results;
            self.state.time_left = 0;
            self.state.result = result;
            log::info!("room {}: game over, {:?}", self.room_id, result);
            self.announce(GameEvent::GameOver { winner: result }, out);
            return;
        }

        self.state.round += 1;
        self.reset_actions();
        self.state.phase = GamePhase::Night;
        self.state.time_left = self.config.night_duration;
        self.announce(
            GameEvent::NightStart {
                round: self.state.round,
            },
            out,
        );
    }

    /// 犠牲者を死亡させ、(ID, 名前)を返す。名簿にいない場合は何もしない
    fn eliminate(&mut self, player_id: &str) -> Option<(String, String)> {
        match self
            .players
            .iter_mut()
            .find(|p| p.id == player_id && p.is_alive)
        {
            Some(player) => {
                player.is_alive = false;
                player.can_act = false;
                Some((player.id.clone(), player.name.clone()))
            }
            None => {
                log::warn!(
                    "room {}: elimination target {} is not a living player, skipping",
                    self.room_id,
                    player_id
                );
                None
            }
        }
    }

    fn reset_actions(&mut self) {
        self.actions.clear();
        for player in self.players.iter_mut().filter(|p| p.is_alive) {
            player.can_act = true;
        }
    }

    fn announce(&mut self, event: GameEvent, out: &mut Vec<Envelope>) {
        let narrative = self.public_chat.add_narrative_message(event.narrative());
        out.push(Envelope::everyone(Payload::Event(event)));
        out.push(Envelope::everyone(Payload::Chat(narrative)));
    }
}
