use serde::{Deserialize, Serialize};

use super::role::Role;

/// セッション層から渡される参加者
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// 試合中のプレイヤー。役職は割り当て後に変わらない
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub is_alive: bool,
    pub can_act: bool,
}

impl GamePlayer {
    pub fn new(player: Player, role: Role) -> Self {
        Self {
            id: player.id,
            name: player.name,
            role,
            is_alive: true,
            can_act: true,
        }
    }

    pub fn to_public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            is_alive: self.is_alive,
        }
    }
}

/// 全員に公開される情報（役職は含まない）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: String,
    pub name: String,
    pub is_alive: bool,
}
