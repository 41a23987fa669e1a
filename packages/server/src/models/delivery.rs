use serde::{Deserialize, Serialize};

use super::{
    chat::ChatMessage,
    game::{GameEvent, GameState},
    player::{GamePlayer, PublicPlayer},
};

/// 配信先。トランスポート層がこの情報をもとにファンアウトする
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Player { player_id: String },
    Group { name: String, members: Vec<String> },
}

impl Audience {
    pub fn includes(&self, player_id: &str) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Player { player_id: id } => id == player_id,
            Audience::Group { members, .. } => members.iter().any(|m| m == player_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    State(GameState),
    Players(Vec<PublicPlayer>),
    Role(GamePlayer),
    Event(GameEvent),
    Chat(ChatMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub audience: Audience,
    pub payload: Payload,
}

impl Envelope {
    pub fn everyone(payload: Payload) -> Self {
        Self {
            audience: Audience::Everyone,
            payload,
        }
    }

    pub fn player(player_id: &str, payload: Payload) -> Self {
        Self {
            audience: Audience::Player {
                player_id: player_id.to_string(),
            },
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audience_includes() {
        let group = Audience::Group {
            name: "mafia".to_string(),
            members: vec!["1".to_string(), "3".to_string()],
        };
        assert!(group.includes("1"));
        assert!(!group.includes("2"));
        assert!(Audience::Everyone.includes("2"));

        let single = Audience::Player {
            player_id: "2".to_string(),
        };
        assert!(single.includes("2"));
        assert!(!single.includes("1"));
    }
}
