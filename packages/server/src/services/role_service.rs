use rand::{seq::SliceRandom, Rng};

use crate::models::{
    player::{GamePlayer, Player},
    role::Role,
};

/// 人数に応じた役職テンプレート
///
/// - 5人以上: マフィア2, 調査役1, 護衛役1, 残りは市民
/// - 5人未満: マフィア1, 調査役1, 残りは市民
pub fn role_template(player_count: usize) -> Vec<Role> {
    let mut roles = Vec::with_capacity(player_count);

    if player_count >= 5 {
        roles.extend([Role::Mafia, Role::Mafia, Role::Detective, Role::Doctor]);
    } else {
        roles.extend([Role::Mafia, Role::Detective]);
    }
    while roles.len() < player_count {
        roles.push(Role::Citizen);
    }
    roles.truncate(player_count);

    roles
}

/// テンプレートをシャッフルして入力順のプレイヤーに割り当てる
pub fn assign_roles<R: Rng + ?Sized>(players: Vec<Player>, rng: &mut R) -> Vec<GamePlayer> {
    let mut roles = role_template(players.len());
    roles.shuffle(rng);

    players
        .into_iter()
        .zip(roles)
        .map(|(player, role)| GamePlayer::new(player, role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn roster(n: usize) -> Vec<Player> {
        (1..=n)
            .map(|i| Player::new(i.to_string(), format!("Player{}", i)))
            .collect()
    }

    fn count(roles: &[Role], role: Role) -> usize {
        roles.iter().filter(|r| **r == role).count()
    }

    #[test]
    fn test_template_counts_for_all_sizes() {
        for n in 3..=12 {
            let roles = role_template(n);
            assert_eq!(roles.len(), n);
            if n >= 5 {
                assert_eq!(count(&roles, Role::Mafia), 2);
                assert_eq!(count(&roles, Role::Doctor), 1);
                assert_eq!(count(&roles, Role::Citizen), n - 4);
            } else {
                assert_eq!(count(&roles, Role::Mafia), 1);
                assert_eq!(count(&roles, Role::Doctor), 0);
                assert_eq!(count(&roles, Role::Citizen), n - 2);
            }
            assert_eq!(count(&roles, Role::Detective), 1);
            assert_eq!(count(&roles, Role::SerialKiller), 0);
        }
    }

    #[test]
    fn test_assignment_matches_template() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 3..=12 {
            let players = assign_roles(roster(n), &mut rng);
            assert_eq!(players.len(), n);

            let mut assigned: Vec<Role> = players.iter().map(|p| p.role).collect();
            let mut expected = role_template(n);
            assigned.sort();
            expected.sort();
            assert_eq!(assigned, expected);

            // 入力順は保たれる
            for (i, p) in players.iter().enumerate() {
                assert_eq!(p.id, (i + 1).to_string());
                assert!(p.is_alive);
                assert!(p.can_act);
            }
        }
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let a = assign_roles(roster(8), &mut StdRng::seed_from_u64(42));
        let b = assign_roles(roster(8), &mut StdRng::seed_from_u64(42));
        let roles_a: Vec<Role> = a.iter().map(|p| p.role).collect();
        let roles_b: Vec<Role> = b.iter().map(|p| p.role).collect();
        assert_eq!(roles_a, roles_b);
    }

    #[test]
    fn test_assignment_varies_between_runs() {
        let mut rng = StdRng::seed_from_u64(1);
        let first: Vec<Role> = assign_roles(roster(8), &mut rng)
            .iter()
            .map(|p| p.role)
            .collect();
        let differs = (0..50).any(|_| {
            let next: Vec<Role> = assign_roles(roster(8), &mut rng)
                .iter()
                .map(|p| p.role)
                .collect();
            next != first
        });
        assert!(differs);
    }

    #[test]
    fn test_mafia_distribution_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(2024);
        let n = 5;
        let trials = 5000;
        let mut mafia_hits = vec![0usize; n];

        for _ in 0..trials {
            for (i, p) in assign_roles(roster(n), &mut rng).iter().enumerate() {
                if p.role == Role::Mafia {
                    mafia_hits[i] += 1;
                }
            }
        }

        // 期待値は 2/5 * trials = 2000
        for hits in mafia_hits {
            assert!((1700..=2300).contains(&hits), "hits = {}", hits);
        }
    }
}
