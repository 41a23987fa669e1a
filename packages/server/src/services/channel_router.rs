use crate::models::{
    chat::ChatMessageType, delivery::Audience, game::GamePhase, player::GamePlayer, role::Role,
};

pub const FACTION_GROUP: &str = "mafia";

/// チャットの公開範囲を決める
///
/// 夜にマフィアが発言した場合はマフィア全員（生死を問わない）のみに届ける。それ以外は全体公開。
pub fn route_chat(
    phase: &GamePhase,
    sender: &GamePlayer,
    players: &[GamePlayer],
) -> (ChatMessageType, Audience) {
    if *phase == GamePhase::Night && sender.role == Role::Mafia {
        (ChatMessageType::Faction, faction_audience(players))
    } else {
        (ChatMessageType::Public, Audience::Everyone)
    }
}

pub fn faction_audience(players: &[GamePlayer]) -> Audience {
    Audience::Group {
        name: FACTION_GROUP.to_string(),
        members: players
            .iter()
            .filter(|p| p.role.is_mafia())
            .map(|p| p.id.clone())
            .collect(),
    }
}
