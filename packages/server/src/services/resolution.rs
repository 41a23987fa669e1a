use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{game::GameResult, player::GamePlayer, role::Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    pub detective_id: String,
    pub target_id: String,
    pub target_name: String,
    pub is_mafia: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NightOutcome {
    pub victim: Option<String>,
    pub protected: Option<String>,
    pub investigations: Vec<Investigation>,
}

/// 最多得票の対象を返す。同数の場合はidが最も小さいものを選ぶ
pub fn plurality<'a, I>(targets: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for target in targets {
        *counts.entry(target).or_insert(0) += 1;
    }

    let mut winner: Option<(&str, usize)> = None;
    for (target, count) in counts {
        match winner {
            Some((_, best)) if count <= best => {}
            _ => winner = Some((target, count)),
        }
    }

    winner.map(|(target, _)| target.to_string())
}

fn living<'a>(players: &'a [GamePlayer], id: &str) -> Option<&'a GamePlayer> {
    players.iter().find(|p| p.id == id && p.is_alive)
}

/// 夜のアクションを解決する
///
/// マフィアの対象の最多得票者が犠牲者になる。ただし護衛役の対象と一致した場合は誰も死なない。
/// 生存していない行動者のアクションは無視する。
pub fn resolve_night(actions: &HashMap<String, String>, players: &[GamePlayer]) -> NightOutcome {
    let mut mafia_targets = Vec::new();
    let mut doctor_targets = Vec::new();
    let mut investigations = Vec::new();

    for (actor_id, target_id) in actions {
        let Some(actor) = living(players, actor_id) else {
            continue;
        };

        match actor.role {
            Role::Mafia => mafia_targets.push(target_id.as_str()),
            Role::Doctor => doctor_targets.push(target_id.as_str()),
            Role::Detective => {
                if let Some(target) = players.iter().find(|p| &p.id == target_id) {
                    investigations.push(Investigation {
                        detective_id: actor.id.clone(),
                        target_id: target.id.clone(),
                        target_name: target.name.clone(),
                        is_mafia: target.role.is_mafia(),
                    });
                }
            }
            Role::Citizen | Role::SerialKiller => {}
        }
    }
    investigations.sort_by(|a, b| a.detective_id.cmp(&b.detective_id));

    let protected = plurality(doctor_targets);
    let victim = plurality(mafia_targets)
        .filter(|target| protected.as_deref() != Some(target.as_str()))
        .filter(|target| living(players, target).is_some());

    NightOutcome {
        victim,
        protected,
        investigations,
    }
}

/// 投票を解決する。票がなければ誰も処刑されない
pub fn resolve_votes(votes: &HashMap<String, String>, players: &[GamePlayer]) -> Option<String> {
    plurality(
        votes
            .values()
            .map(String::as_str)
            .filter(|target| living(players, target).is_some()),
    )
}

/// 生存者のみで勝敗を判定する
pub fn check_winner(players: &[GamePlayer]) -> GameResult {
    let (mafia, others) = players
        .iter()
        .filter(|p| p.is_alive)
        .fold((0usize, 0usize), |(mafia, others), p| {
            if p.role.is_mafia() {
                (mafia + 1, others)
            } else {
                (mafia, others + 1)
            }
        });

    if mafia >= others {
        GameResult::MafiaWin
    } else if mafia == 0 {
        GameResult::InnocentsWin
    } else {
        GameResult::InProgress
    }
}
